use crate::geometry::{ScreenPoint, ScreenSize, WorldPoint};

/// Maps world positions to screen pixels.
///
/// `None` means the point is outside the view frustum.
pub trait Projector {
    fn project(&self, point: &WorldPoint) -> Option<ScreenPoint>;
}

impl<F> Projector for F
where
    F: Fn(&WorldPoint) -> Option<ScreenPoint>,
{
    fn project(&self, point: &WorldPoint) -> Option<ScreenPoint> {
        self(point)
    }
}

/// Top-down orthographic projector: world x/y map linearly to screen pixels,
/// world y pointing up. `z` is ignored.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanarProjector {
    /// World position at the screen center.
    pub center: WorldPoint,
    pub units_per_pixel: f64,
    pub screen_size: ScreenSize,
    /// Extra pixels around the screen still treated as inside the frustum.
    pub margin: f32,
}

impl PlanarProjector {
    pub fn new(center: WorldPoint, units_per_pixel: f64, screen_size: ScreenSize) -> Self {
        Self {
            center,
            units_per_pixel,
            screen_size,
            margin: 0.0,
        }
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }
}

impl Projector for PlanarProjector {
    fn project(&self, point: &WorldPoint) -> Option<ScreenPoint> {
        if self.units_per_pixel <= 0.0 {
            return None;
        }

        let x = (point.x - self.center.x) / self.units_per_pixel + self.screen_size.width as f64 / 2.0;
        let y = (self.center.y - point.y) / self.units_per_pixel + self.screen_size.height as f64 / 2.0;
        let screen = ScreenPoint::new(x as f32, y as f32);

        let margin = self.margin;
        let inside = screen.x >= -margin
            && screen.y >= -margin
            && screen.x <= self.screen_size.width + margin
            && screen.y <= self.screen_size.height + margin;
        inside.then_some(screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_maps_to_screen_center() {
        let projector = PlanarProjector::new(WorldPoint::new(100.0, 50.0, 0.0), 2.0, ScreenSize::new(800.0, 600.0));
        assert_eq!(projector.project(&WorldPoint::new(100.0, 50.0, 7.0)), Some(ScreenPoint::new(400.0, 300.0)));
        // world y up, screen y down
        assert_eq!(projector.project(&WorldPoint::new(120.0, 70.0, 0.0)), Some(ScreenPoint::new(410.0, 290.0)));
    }

    #[test]
    fn outside_points_are_rejected() {
        let projector = PlanarProjector::new(WorldPoint::origin(), 1.0, ScreenSize::new(100.0, 100.0));
        assert_eq!(projector.project(&WorldPoint::new(60.0, 0.0, 0.0)), None);
        let projector = projector.with_margin(20.0);
        assert_eq!(projector.project(&WorldPoint::new(60.0, 0.0, 0.0)), Some(ScreenPoint::new(110.0, 50.0)));
    }

    #[test]
    fn closures_are_projectors() {
        let projector = |p: &WorldPoint| Some(ScreenPoint::new(p.x as f32, p.y as f32));
        assert_eq!(projector.project(&WorldPoint::new(3.0, 4.0, 0.0)), Some(ScreenPoint::new(3.0, 4.0)));
    }
}
