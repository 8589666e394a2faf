//! Error types for fuda.

use thiserror::Error;

/// Invalid [`PlacementConfig`](crate::config::PlacementConfig) values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("fade time must be finite and non-negative, got {0}")]
    FadeTime(f64),

    #[error("{name} must be finite and non-negative, got {value}")]
    NegativeBudget { name: &'static str, value: f64 },

    #[error("overload label threshold must be greater than zero")]
    OverloadThreshold,

    #[error("overload update cap must be greater than zero")]
    OverloadUpdateCap,
}
