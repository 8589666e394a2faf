//! Draw-buffer seam: the placement engine submits placed labels here.

use std::collections::HashMap;

use crate::{
    geometry::{ScreenBox, ScreenPoint},
    glyphs::GlyphInfo,
    text_element::IconDescriptor,
    text_layout::TextBufferObject,
};

/// Fill level of one canvas layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerInfo {
    pub draw_count: usize,
    pub capacity: usize,
}

impl LayerInfo {
    /// Whether `glyph_count` more glyphs fit into the layer.
    pub fn fits(&self, glyph_count: usize) -> bool {
        self.draw_count + glyph_count <= self.capacity
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextRenderParams {
    /// Fade opacity times distance fade, `[0, 1]`.
    pub opacity: f32,
    pub color: [f32; 4],
    pub font_size: f32,
    /// Rotation around `position`, in radians. Used by path labels.
    pub rotation: f32,
    pub layer: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IconRenderParams {
    pub opacity: f32,
    pub layer: i32,
}

/// Receives the labels placed in a frame.
///
/// The scheduler calls [`clear`](TextCanvas::clear) at the start of every
/// frame and checks [`layer`](TextCanvas::layer) capacity before adding.
pub trait TextCanvas {
    fn layer(&self, render_order: i32) -> LayerInfo;

    /// Adds a single-line glyph run whose baseline starts at `position`.
    fn add_text(&mut self, glyphs: &[GlyphInfo], position: ScreenPoint, params: &TextRenderParams) -> bool;

    /// Adds pre-measured text with its anchor at `position`.
    fn add_text_buffer_object(
        &mut self,
        text: &TextBufferObject,
        position: ScreenPoint,
        params: &TextRenderParams,
    ) -> bool;

    fn add_icon(&mut self, icon: &IconDescriptor, bounds: ScreenBox, params: &IconRenderParams) -> bool;

    fn clear(&mut self);
}

/// One recorded submission of a [`RecordingCanvas`].
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Text {
        text: String,
        position: ScreenPoint,
        params: TextRenderParams,
    },
    Icon {
        image: String,
        bounds: ScreenBox,
        params: IconRenderParams,
    },
}

/// [`TextCanvas`] that records submissions instead of drawing them.
///
/// Useful for hosts that build their own draw calls from the command list,
/// and for tests. Every layer holds at most `capacity` glyphs (icons count as
/// one) until [`clear`](TextCanvas::clear).
pub struct RecordingCanvas {
    default_capacity: usize,
    capacities: HashMap<i32, usize, fxhash::FxBuildHasher>,
    draw_counts: HashMap<i32, usize, fxhash::FxBuildHasher>,
    commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    pub fn new(capacity_per_layer: usize) -> Self {
        Self {
            default_capacity: capacity_per_layer,
            capacities: HashMap::default(),
            draw_counts: HashMap::default(),
            commands: Vec::new(),
        }
    }

    pub fn set_layer_capacity(&mut self, render_order: i32, capacity: usize) {
        self.capacities.insert(render_order, capacity);
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Text of every recorded text command, in submission order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                DrawCommand::Icon { .. } => None,
            })
            .collect()
    }

    fn reserve(&mut self, render_order: i32, count: usize) -> bool {
        if !self.layer(render_order).fits(count) {
            log::warn!("Canvas layer {render_order} is full, dropping {count} glyphs");
            return false;
        }
        *self.draw_counts.entry(render_order).or_insert(0) += count;
        true
    }
}

impl TextCanvas for RecordingCanvas {
    fn layer(&self, render_order: i32) -> LayerInfo {
        LayerInfo {
            draw_count: self.draw_counts.get(&render_order).copied().unwrap_or(0),
            capacity: self
                .capacities
                .get(&render_order)
                .copied()
                .unwrap_or(self.default_capacity),
        }
    }

    fn add_text(&mut self, glyphs: &[GlyphInfo], position: ScreenPoint, params: &TextRenderParams) -> bool {
        if !self.reserve(params.layer, glyphs.len()) {
            return false;
        }
        self.commands.push(DrawCommand::Text {
            text: glyphs.iter().map(|g| g.character).collect(),
            position,
            params: params.clone(),
        });
        true
    }

    fn add_text_buffer_object(
        &mut self,
        text: &TextBufferObject,
        position: ScreenPoint,
        params: &TextRenderParams,
    ) -> bool {
        if !self.reserve(params.layer, text.glyph_count()) {
            return false;
        }
        self.commands.push(DrawCommand::Text {
            text: text.text(),
            position,
            params: params.clone(),
        });
        true
    }

    fn add_icon(&mut self, icon: &IconDescriptor, bounds: ScreenBox, params: &IconRenderParams) -> bool {
        if !self.reserve(params.layer, 1) {
            return false;
        }
        self.commands.push(DrawCommand::Icon {
            image: icon.image.clone(),
            bounds,
            params: params.clone(),
        });
        true
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.draw_counts.clear();
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(ch: char) -> GlyphInfo {
        GlyphInfo {
            character: ch,
            glyph_index: 0,
            advance: 8.0,
            x_min: 0.0,
            y_min: 0.0,
            width: 8.0,
            height: 8.0,
        }
    }

    fn params(layer: i32) -> TextRenderParams {
        TextRenderParams {
            opacity: 1.0,
            color: [0.0; 4],
            font_size: 12.0,
            rotation: 0.0,
            layer,
        }
    }

    #[test]
    fn records_text_and_counts_glyphs() {
        let mut canvas = RecordingCanvas::new(10);
        let run = [glyph('h'), glyph('i')];
        assert!(canvas.add_text(&run, ScreenPoint::new(1.0, 2.0), &params(0)));
        assert_eq!(canvas.layer(0), LayerInfo { draw_count: 2, capacity: 10 });
        assert_eq!(canvas.texts(), vec!["hi"]);
    }

    #[test]
    fn refuses_beyond_capacity() {
        let mut canvas = RecordingCanvas::new(10);
        canvas.set_layer_capacity(3, 3);
        let run = [glyph('a'), glyph('b')];
        assert!(canvas.add_text(&run, ScreenPoint::origin(), &params(3)));
        assert!(!canvas.layer(3).fits(2));
        assert!(!canvas.add_text(&run, ScreenPoint::origin(), &params(3)));
        // other layers are unaffected
        assert!(canvas.add_text(&run, ScreenPoint::origin(), &params(0)));
        assert_eq!(canvas.commands().len(), 2);
    }

    #[test]
    fn clear_resets_counts() {
        let mut canvas = RecordingCanvas::new(1);
        let icon = IconDescriptor {
            image: "dot".into(),
            size: crate::geometry::ScreenSize::new(4.0, 4.0),
            offset: crate::geometry::ScreenVector::zero(),
        };
        let icon_params = IconRenderParams { opacity: 1.0, layer: 0 };
        assert!(canvas.add_icon(&icon, ScreenBox::zero(), &icon_params));
        assert!(!canvas.add_icon(&icon, ScreenBox::zero(), &icon_params));
        canvas.clear();
        assert!(canvas.commands().is_empty());
        assert!(canvas.add_icon(&icon, ScreenBox::zero(), &icon_params));
    }
}
