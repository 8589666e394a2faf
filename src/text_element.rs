use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::geometry::{ScreenSize, ScreenVector, WorldPoint};

/// Anchor geometry of a label.
#[derive(Clone, Debug, PartialEq)]
pub enum LabelGeometry {
    /// A single anchor, e.g. a place name or POI.
    Point(WorldPoint),
    /// Text laid out along a polyline, e.g. a street name.
    Path(Vec<WorldPoint>),
    /// The same marker repeated at every point, e.g. road shields.
    LineMarker(Vec<WorldPoint>),
}

impl LabelGeometry {
    pub fn points(&self) -> &[WorldPoint] {
        match self {
            LabelGeometry::Point(point) => std::slice::from_ref(point),
            LabelGeometry::Path(points) | LabelGeometry::LineMarker(points) => points,
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, LabelGeometry::Point(_))
    }
}

/// Icon drawn next to (or instead of) the text.
#[derive(Clone, Debug, PartialEq)]
pub struct IconDescriptor {
    /// Image name resolved by the canvas.
    pub image: String,
    pub size: ScreenSize,
    /// Offset of the icon center from the anchor.
    pub offset: ScreenVector,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextRenderStyle {
    pub font_family: String,
    /// Font size in pixels.
    pub font_size: f32,
    /// Linear RGBA.
    pub color: [f32; 4],
}

impl Default for TextRenderStyle {
    fn default() -> Self {
        Self {
            font_family: "sans-serif".to_string(),
            font_size: 16.0,
            color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Horizontal position of the text relative to its anchor, applied per line.
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Vertical position of the whole text block relative to its anchor.
pub enum VerticalAlign {
    Top,
    Middle,
    Bottom,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextLayoutStyle {
    pub horizontal_align: HorizontalAlign,
    pub vertical_align: VerticalAlign,
    /// Multiplier applied to the font size to get the line advance.
    pub line_height: f32,
    /// Wrap at word boundaries once a line grows past this width.
    pub max_line_width: Option<f32>,
}

impl Default for TextLayoutStyle {
    fn default() -> Self {
        Self {
            horizontal_align: HorizontalAlign::Center,
            vertical_align: VerticalAlign::Middle,
            line_height: 1.2,
            max_line_width: None,
        }
    }
}

/// One label: text and/or icon anchored in the world.
///
/// Elements are immutable once built and shared between the tile that
/// produced them and the placement cache. Everything that changes from frame
/// to frame lives in [`TextElementState`](crate::element_state::TextElementState).
#[derive(Clone, Debug, PartialEq)]
pub struct TextElement {
    pub text: String,
    pub geometry: LabelGeometry,
    pub icon: Option<IconDescriptor>,
    pub render_style: TextRenderStyle,
    pub layout_style: TextLayoutStyle,
    /// Offset of the text block from the anchor.
    pub offset: ScreenVector,

    /// Distance fade start, as a fraction of the maximum view distance.
    pub fade_near: Option<f64>,
    /// Distance fade end; the element is not placed beyond it.
    pub fade_far: Option<f64>,
    pub min_zoom_level: Option<f64>,
    pub max_zoom_level: Option<f64>,

    /// Skip the collision test.
    pub may_overlap: bool,
    /// Allocate screen space once placed.
    pub reserve_space: bool,
    /// The icon may be shown when the text does not fit.
    pub text_is_optional: bool,
    /// The text may be shown when the icon does not fit.
    pub icon_is_optional: bool,

    /// Canvas layer.
    pub render_order: i32,
    pub shield_group: Option<u32>,
}

impl TextElement {
    fn with_geometry(text: impl Into<String>, geometry: LabelGeometry) -> Self {
        Self {
            text: text.into(),
            geometry,
            icon: None,
            render_style: TextRenderStyle::default(),
            layout_style: TextLayoutStyle::default(),
            offset: ScreenVector::zero(),
            fade_near: None,
            fade_far: None,
            min_zoom_level: None,
            max_zoom_level: None,
            may_overlap: false,
            reserve_space: true,
            text_is_optional: false,
            icon_is_optional: false,
            render_order: 0,
            shield_group: None,
        }
    }

    pub fn point(text: impl Into<String>, position: WorldPoint) -> Self {
        Self::with_geometry(text, LabelGeometry::Point(position))
    }

    pub fn path(text: impl Into<String>, points: Vec<WorldPoint>) -> Self {
        Self::with_geometry(text, LabelGeometry::Path(points))
    }

    pub fn line_marker(text: impl Into<String>, points: Vec<WorldPoint>) -> Self {
        Self::with_geometry(text, LabelGeometry::LineMarker(points))
    }

    pub fn with_icon(mut self, icon: IconDescriptor) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }

    /// Number of icon render states the element needs.
    pub fn icon_instance_count(&self) -> usize {
        match (&self.geometry, &self.icon) {
            (_, None) => 0,
            (LabelGeometry::LineMarker(points), Some(_)) => points.len(),
            (LabelGeometry::Path(_), Some(_)) => 0,
            (LabelGeometry::Point(_), Some(_)) => 1,
        }
    }

    /// Whether `zoom_level` lies inside the element's zoom range.
    pub fn is_in_zoom_range(&self, zoom_level: f64) -> bool {
        self.min_zoom_level.is_none_or(|min| zoom_level >= min)
            && self.max_zoom_level.is_none_or(|max| zoom_level < max)
    }
}

/// Identity of a [`TextElementGroup`].
///
/// Two groups with equal content still have different ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u64);

impl GroupId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Ordered batch of elements sharing one priority, usually one tile layer.
#[derive(Debug)]
pub struct TextElementGroup {
    id: GroupId,
    priority: f32,
    elements: Vec<Arc<TextElement>>,
}

impl TextElementGroup {
    pub fn new(priority: f32, elements: Vec<TextElement>) -> Self {
        Self {
            id: GroupId::next(),
            priority,
            elements: elements.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn priority(&self) -> f32 {
        self.priority
    }

    pub fn elements(&self) -> &[Arc<TextElement>] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
