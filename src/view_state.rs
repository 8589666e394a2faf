use crate::geometry::{ScreenSize, WorldPoint};

/// Per-frame camera facts the scheduler needs.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    pub zoom_level: f64,
    pub camera_position: WorldPoint,
    /// Labels farther than this from the camera are not placed.
    pub max_visibility_distance: f64,
    pub screen_size: ScreenSize,
    /// The set of rendered tiles differs from the previous frame.
    pub rendered_tiles_changed: bool,
    pub camera_is_moving: bool,
}

impl ViewState {
    pub fn new(zoom_level: f64, camera_position: WorldPoint, screen_size: ScreenSize) -> Self {
        Self {
            zoom_level,
            camera_position,
            max_visibility_distance: f64::INFINITY,
            screen_size,
            rendered_tiles_changed: false,
            camera_is_moving: false,
        }
    }
}
