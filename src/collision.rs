//! Screen-space collision index used during placement.

use crate::geometry::{ScreenBox, ScreenPoint, ScreenSize};

/// Screen-space occupancy consulted by the placement scheduler.
///
/// The index is reset at the start of every frame. Boxes are in screen
/// pixels; touching edges do not count as overlap.
pub trait ScreenCollisions {
    fn reset(&mut self, screen_size: ScreenSize);

    fn screen_bounds(&self) -> ScreenBox;

    /// Marks `bounds` as taken.
    fn allocate(&mut self, bounds: ScreenBox);

    /// Reserves space for geometry that always wins over labels.
    fn allocate_blocking(&mut self, boxes: &[ScreenBox]);

    /// Whether `bounds` overlaps anything allocated so far.
    fn is_allocated(&self, bounds: &ScreenBox) -> bool;

    /// Whether any part of `bounds` is on screen.
    fn is_visible(&self, bounds: &ScreenBox) -> bool {
        self.screen_bounds().intersects(bounds)
    }

    /// Whether `bounds` lies entirely on screen.
    fn is_fully_visible(&self, bounds: &ScreenBox) -> bool {
        self.screen_bounds().contains_box(bounds)
    }
}

pub const DEFAULT_CELL_SIZE: f32 = 64.0;

/// Uniform bucket grid over the screen.
///
/// Each allocated box is registered in every cell it touches; queries only
/// test the boxes of the cells they touch. Boxes reaching past the screen edge
/// are clamped into the border cells.
pub struct ScreenCollisionGrid {
    cell_size: f32,
    columns: usize,
    rows: usize,
    cells: Vec<Vec<usize>>,
    boxes: Vec<ScreenBox>,
    screen: ScreenBox,
}

impl Default for ScreenCollisionGrid {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl ScreenCollisionGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(1.0),
            columns: 0,
            rows: 0,
            cells: Vec::new(),
            boxes: Vec::new(),
            screen: ScreenBox::zero(),
        }
    }

    /// Number of boxes allocated since the last reset, blocking ones included.
    pub fn allocated_count(&self) -> usize {
        self.boxes.len()
    }

    fn cell_range(&self, bounds: &ScreenBox) -> Option<(std::ops::RangeInclusive<usize>, std::ops::RangeInclusive<usize>)> {
        if self.cells.is_empty() || bounds.is_empty() {
            return None;
        }

        let column = |x: f32| ((x / self.cell_size).floor().max(0.0) as usize).min(self.columns - 1);
        let row = |y: f32| ((y / self.cell_size).floor().max(0.0) as usize).min(self.rows - 1);

        Some((
            column(bounds.min.x)..=column(bounds.max.x),
            row(bounds.min.y)..=row(bounds.max.y),
        ))
    }
}

impl ScreenCollisions for ScreenCollisionGrid {
    fn reset(&mut self, screen_size: ScreenSize) {
        self.screen = ScreenBox::from_size(screen_size);
        self.columns = ((screen_size.width / self.cell_size).ceil() as usize).max(1);
        self.rows = ((screen_size.height / self.cell_size).ceil() as usize).max(1);

        let cell_count = self.columns * self.rows;
        self.cells.truncate(cell_count);
        for cell in &mut self.cells {
            cell.clear();
        }
        self.cells.resize_with(cell_count, Vec::new);
        self.boxes.clear();
    }

    fn screen_bounds(&self) -> ScreenBox {
        self.screen
    }

    fn allocate(&mut self, bounds: ScreenBox) {
        let Some((columns, rows)) = self.cell_range(&bounds) else {
            return;
        };

        let index = self.boxes.len();
        self.boxes.push(bounds);
        for row in rows {
            for column in columns.clone() {
                self.cells[row * self.columns + column].push(index);
            }
        }
    }

    fn allocate_blocking(&mut self, boxes: &[ScreenBox]) {
        for bounds in boxes {
            self.allocate(*bounds);
        }
    }

    fn is_allocated(&self, bounds: &ScreenBox) -> bool {
        let Some((columns, rows)) = self.cell_range(bounds) else {
            return false;
        };

        rows.into_iter().any(|row| {
            columns.clone().any(|column| {
                self.cells[row * self.columns + column]
                    .iter()
                    .any(|&index| self.boxes[index].intersects(bounds))
            })
        })
    }
}

/// Boxes of `size` sampled along a screen polyline, one every `size.width`
/// pixels, centered on the line. Used to reserve blocking geometry.
pub fn polyline_boxes(points: &[ScreenPoint], size: ScreenSize, out: &mut Vec<ScreenBox>) {
    let step = size.width.max(1.0);
    for segment in points.windows(2) {
        let (start, end) = (segment[0], segment[1]);
        let length = (end - start).length();
        let samples = (length / step).ceil().max(1.0) as usize;
        for i in 0..=samples {
            let t = i as f32 / samples as f32;
            out.push(crate::geometry::centered_box(start.lerp(end, t), size));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> ScreenBox {
        ScreenBox::new(ScreenPoint::new(x0, y0), ScreenPoint::new(x1, y1))
    }

    fn grid() -> ScreenCollisionGrid {
        let mut grid = ScreenCollisionGrid::new(32.0);
        grid.reset(ScreenSize::new(200.0, 100.0));
        grid
    }

    #[test]
    fn detects_overlap_across_cells() {
        let mut grid = grid();
        grid.allocate(rect(20.0, 20.0, 80.0, 40.0));
        assert!(grid.is_allocated(&rect(70.0, 30.0, 90.0, 50.0)));
        assert!(!grid.is_allocated(&rect(100.0, 20.0, 120.0, 40.0)));
        // touching edges are not an overlap
        assert!(!grid.is_allocated(&rect(80.0, 20.0, 100.0, 40.0)));
    }

    #[test]
    fn reset_forgets_allocations() {
        let mut grid = grid();
        grid.allocate(rect(0.0, 0.0, 10.0, 10.0));
        grid.reset(ScreenSize::new(200.0, 100.0));
        assert_eq!(grid.allocated_count(), 0);
        assert!(!grid.is_allocated(&rect(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn boxes_past_the_edge_still_collide() {
        let mut grid = grid();
        grid.allocate(rect(190.0, -20.0, 260.0, 10.0));
        assert!(grid.is_allocated(&rect(195.0, 0.0, 199.0, 5.0)));
        assert!(grid.is_allocated(&rect(250.0, -10.0, 255.0, -5.0)));
    }

    #[test]
    fn visibility_against_screen() {
        let grid = grid();
        assert!(grid.is_visible(&rect(-10.0, -10.0, 5.0, 5.0)));
        assert!(!grid.is_fully_visible(&rect(-10.0, -10.0, 5.0, 5.0)));
        assert!(!grid.is_visible(&rect(-20.0, 0.0, -10.0, 5.0)));
        assert!(grid.is_fully_visible(&rect(10.0, 10.0, 20.0, 20.0)));
    }

    #[test]
    fn blocking_boxes_follow_the_polyline() {
        let mut boxes = Vec::new();
        let line = [ScreenPoint::new(0.0, 50.0), ScreenPoint::new(100.0, 50.0)];
        polyline_boxes(&line, ScreenSize::new(10.0, 4.0), &mut boxes);
        assert_eq!(boxes.len(), 11);

        let mut grid = grid();
        grid.allocate_blocking(&boxes);
        assert!(grid.is_allocated(&rect(40.0, 45.0, 60.0, 55.0)));
        assert!(!grid.is_allocated(&rect(40.0, 60.0, 60.0, 70.0)));
    }
}
