use std::time::Duration;

use crate::error::ConfigError;

/// Default duration of a fade transition, in milliseconds.
pub const DEFAULT_FADE_TIME: f64 = 800.0;

/// Default cap on labels placed in one frame.
pub const DEFAULT_MAX_NUM_VISIBLE_LABELS: usize = 500;

/// Total label count across the rendered tiles above which the scheduler
/// enters overload mode.
pub const OVERLOAD_LABEL_THRESHOLD: usize = 20_000;

/// Squared world distance under which two point labels with the same text
/// count as duplicates.
///
/// The value is a single constant for all zoom levels.
pub const DEFAULT_DEDUP_DISTANCE_SQ: f64 = 100.0 * 100.0;

/// Configuration knobs of the [`PlacementScheduler`](crate::placement::PlacementScheduler).
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementConfig {
    /// Duration of one fade-in or fade-out, in milliseconds.
    pub fade_time: f64,
    /// Snap opacity to 0 or 1 instead of animating.
    pub disable_fading: bool,
    /// Suppress nearby point labels sharing the same text.
    pub deduplicate: bool,
    pub dedup_distance_sq: f64,
    pub max_num_visible_labels: usize,

    pub overload_label_threshold: usize,
    /// Wall-clock budget of the element update phase while overloaded.
    pub overload_update_time_budget: Duration,
    /// Number of groups added to the cache per frame while overloaded.
    pub overload_max_updated_groups: usize,
    /// Wall-clock budget for placing new labels while overloaded and the camera moves.
    pub overload_placement_time_budget: Duration,
    /// Cap on new-pass placement attempts per frame while overloaded.
    pub overload_max_new_labels: usize,

    /// Minimum screen distance between placed markers of one shield group.
    pub min_shield_distance: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            fade_time: DEFAULT_FADE_TIME,
            disable_fading: false,
            deduplicate: true,
            dedup_distance_sq: DEFAULT_DEDUP_DISTANCE_SQ,
            max_num_visible_labels: DEFAULT_MAX_NUM_VISIBLE_LABELS,
            overload_label_threshold: OVERLOAD_LABEL_THRESHOLD,
            overload_update_time_budget: Duration::from_millis(5),
            overload_max_updated_groups: 400,
            overload_placement_time_budget: Duration::from_millis(10),
            overload_max_new_labels: 100,
            min_shield_distance: 60.0,
        }
    }
}

impl PlacementConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fade_time.is_finite() || self.fade_time < 0.0 {
            return Err(ConfigError::FadeTime(self.fade_time));
        }
        if !self.dedup_distance_sq.is_finite() || self.dedup_distance_sq < 0.0 {
            return Err(ConfigError::NegativeBudget {
                name: "dedup_distance_sq",
                value: self.dedup_distance_sq,
            });
        }
        if !self.min_shield_distance.is_finite() || self.min_shield_distance < 0.0 {
            return Err(ConfigError::NegativeBudget {
                name: "min_shield_distance",
                value: self.min_shield_distance as f64,
            });
        }
        if self.overload_label_threshold == 0 {
            return Err(ConfigError::OverloadThreshold);
        }
        if self.overload_max_updated_groups == 0 {
            return Err(ConfigError::OverloadUpdateCap);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(PlacementConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_values() {
        let config = PlacementConfig {
            fade_time: -1.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::FadeTime(-1.0)));

        let config = PlacementConfig {
            overload_label_threshold: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::OverloadThreshold));

        let config = PlacementConfig {
            dedup_distance_sq: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativeBudget {
                name: "dedup_distance_sq",
                ..
            })
        ));
    }
}
