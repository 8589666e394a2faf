//! Frame-by-frame label placement.
//!
//! Every frame the [`PlacementScheduler`]:
//!
//! 1. notices tile changes and lazily initializes the glyph service,
//! 2. re-derives cached groups of the rendered tiles when something changed
//!    (zoom range, frustum, distance and duplicate filtering),
//! 3. ages fades and evicts groups that are gone and invisible,
//! 4. resets the collision index and reserves blocking geometry,
//! 5. places groups by descending priority, already visible elements of a
//!    priority before new ones,
//! 6. draws overlay labels on top.
//!
//! When the rendered tiles carry more labels than
//! [`overload_label_threshold`](crate::config::PlacementConfig::overload_label_threshold)
//! the scheduler is *overloaded*: the update pass is time and count boxed,
//! new labels are only tried when something changed, and their placement is
//! count boxed and, while the camera moves, time boxed.

mod place;
mod scheduler;
mod stats;

use std::sync::Arc;

pub use scheduler::PlacementScheduler;
pub use stats::PlacementStats;

/// Callback asking the host for another frame.
pub type UpdateRequester = Arc<dyn Fn() + Send + Sync>;
