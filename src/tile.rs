//! Label sources: tiles carrying element groups and blocking geometry.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{geometry::WorldPoint, text_element::TextElementGroup};

/// Address of a tile in a quadtree tiling scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub row: u32,
    pub column: u32,
    pub level: u32,
}

impl TileKey {
    pub fn new(row: u32, column: u32, level: u32) -> Self {
        Self { row, column, level }
    }

    /// Morton code of the tile: a leading level bit followed by the
    /// interleaved row/column bits. Gives a stable spatial order within a
    /// level and keeps levels apart.
    pub fn morton_code(&self) -> u64 {
        let level = self.level.min(31);
        let mut code = 0u64;
        for bit in 0..level {
            code |= (((self.column >> bit) & 1) as u64) << (2 * bit);
            code |= (((self.row >> bit) & 1) as u64) << (2 * bit + 1);
        }
        code | (1u64 << (2 * level))
    }
}

/// A line that reserves screen space ahead of every label, e.g. a road
/// outline that labels must not cover.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockingElement {
    pub points: Vec<WorldPoint>,
    /// Width of the reserved band, in pixels.
    pub width: f32,
}

/// A decoded tile as seen by the placement engine.
///
/// Groups are added while the tile is decoded; the scheduler observes the
/// change through [`take_text_elements_changed`](Self::take_text_elements_changed).
#[derive(Debug)]
pub struct LabelTile {
    key: TileKey,
    groups: Vec<Arc<TextElementGroup>>,
    blocking: Vec<BlockingElement>,
    changed: AtomicBool,
}

impl LabelTile {
    pub fn new(key: TileKey) -> Self {
        Self {
            key,
            groups: Vec::new(),
            blocking: Vec::new(),
            changed: AtomicBool::new(true),
        }
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn add_group(&mut self, group: TextElementGroup) -> Arc<TextElementGroup> {
        let group = Arc::new(group);
        self.groups.push(Arc::clone(&group));
        self.changed.store(true, Ordering::Release);
        group
    }

    pub fn add_blocking_element(&mut self, element: BlockingElement) {
        self.blocking.push(element);
    }

    pub fn groups(&self) -> &[Arc<TextElementGroup>] {
        &self.groups
    }

    pub fn blocking_elements(&self) -> &[BlockingElement] {
        &self.blocking
    }

    /// Number of elements over all groups.
    pub fn label_count(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }

    /// Returns whether the element set changed since the last call.
    pub fn take_text_elements_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }

    /// Flags the tile as changed, e.g. after its groups were replaced elsewhere.
    pub fn mark_changed(&self) {
        self.changed.store(true, Ordering::Release);
    }
}

/// Tiles of one data source that are rendered this frame.
#[derive(Clone, Debug, Default)]
pub struct DataSourceTileList {
    pub data_source: String,
    pub rendered_tiles: Vec<Arc<LabelTile>>,
}

impl DataSourceTileList {
    pub fn new(data_source: impl Into<String>, rendered_tiles: Vec<Arc<LabelTile>>) -> Self {
        Self {
            data_source: data_source.into(),
            rendered_tiles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_element::TextElement;

    #[test]
    fn morton_code_interleaves_bits() {
        assert_eq!(TileKey::new(0, 0, 0).morton_code(), 1);
        assert_eq!(TileKey::new(0, 1, 1).morton_code(), 0b101);
        assert_eq!(TileKey::new(1, 0, 1).morton_code(), 0b110);
        assert_eq!(TileKey::new(1, 1, 1).morton_code(), 0b111);
        assert!(TileKey::new(3, 3, 2).morton_code() > TileKey::new(0, 0, 2).morton_code());
        // levels do not collide
        assert_ne!(TileKey::new(0, 0, 1).morton_code(), TileKey::new(0, 0, 2).morton_code());
    }

    #[test]
    fn change_flag_is_consumed() {
        let mut tile = LabelTile::new(TileKey::new(0, 0, 0));
        assert!(tile.take_text_elements_changed());
        assert!(!tile.take_text_elements_changed());

        tile.add_group(TextElementGroup::new(
            1.0,
            vec![
                TextElement::point("A", WorldPoint::origin()),
                TextElement::point("B", WorldPoint::origin()),
            ],
        ));
        assert!(tile.take_text_elements_changed());
        assert_eq!(tile.label_count(), 2);
    }
}
