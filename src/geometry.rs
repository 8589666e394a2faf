//! Coordinate spaces used by the placement engine.
//!
//! Screen space has its origin at the top-left corner of the viewport with the
//! **Y-axis going down**, matching the glyph positions produced by the text
//! layout. World space is whatever the caller's projector understands; the
//! engine only measures distances in it.

use euclid::{Box2D, Point2D, Point3D, Size2D, Vector2D};

/// Unit tag for screen-space (pixel) coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScreenSpace;

/// Unit tag for world-space coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldSpace;

pub type ScreenPoint = Point2D<f32, ScreenSpace>;
pub type ScreenVector = Vector2D<f32, ScreenSpace>;
pub type ScreenSize = Size2D<f32, ScreenSpace>;
pub type ScreenBox = Box2D<f32, ScreenSpace>;

pub type WorldPoint = Point3D<f64, WorldSpace>;

/// Builds a box of `size` centered on `center`.
pub fn centered_box(center: ScreenPoint, size: ScreenSize) -> ScreenBox {
    let half = ScreenVector::new(size.width * 0.5, size.height * 0.5);
    ScreenBox::new(center - half, center + half)
}

/// Squared distance between two world points.
pub fn world_distance_sq(a: &WorldPoint, b: &WorldPoint) -> f64 {
    (*a - *b).square_length()
}

/// Hermite interpolation between `edge0` and `edge1`, clamped to `[0, 1]`.
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    if edge0 >= edge1 {
        return if x >= edge1 { 1.0 } else { 0.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
