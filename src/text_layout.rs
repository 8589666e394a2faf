//! Multi-line layout of point labels.
//!
//! Layout runs in two stages: glyphs are first buffered into lines (explicit
//! `\n` breaks, optional word wrap), then each line is aligned and turned into
//! positioned glyphs. Positions are relative to the label anchor with the
//! **Y-axis going down**.

use crate::{
    geometry::{ScreenBox, ScreenPoint},
    glyphs::GlyphInfo,
    text_element::{HorizontalAlign, TextLayoutStyle, TextRenderStyle, VerticalAlign},
};

/// Baseline position inside a line, as a fraction of the font size.
const ASCENT_RATIO: f32 = 0.8;

/// A glyph with the top-left corner of its bitmap box relative to the anchor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionedGlyph {
    pub glyph: GlyphInfo,
    pub position: ScreenPoint,
}

/// Measured, positioned text of one label, computed once and reused every
/// frame the label stays loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBufferObject {
    pub glyphs: Vec<PositionedGlyph>,
    /// Union of the line boxes, relative to the anchor.
    pub bounds: ScreenBox,
}

impl TextBufferObject {
    /// Number of glyphs the canvas has to draw, whitespace included.
    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// The text as laid out, line breaks excluded.
    pub fn text(&self) -> String {
        self.glyphs.iter().map(|g| g.glyph.character).collect()
    }
}

/// Total advance of a single-line glyph run.
pub fn run_width(glyphs: &[GlyphInfo]) -> f32 {
    glyphs.iter().map(|g| g.advance).sum()
}

/// Glyphs of one line before alignment, origin on the line start.
#[derive(Default)]
struct LineBuffer {
    glyphs: Vec<GlyphInfo>,
}

impl LineBuffer {
    fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Width without trailing whitespace.
    fn width(&self) -> f32 {
        let end = self
            .glyphs
            .iter()
            .rposition(|g| !g.character.is_whitespace())
            .map_or(0, |i| i + 1);
        run_width(&self.glyphs[..end])
    }

    fn projected_width(&self, word: &[GlyphInfo]) -> f32 {
        run_width(&self.glyphs) + run_width(word)
    }
}

/// Lays out `glyphs` (one per character of the label text, `\n` included).
pub fn layout_label(
    glyphs: &[GlyphInfo],
    render_style: &TextRenderStyle,
    layout_style: &TextLayoutStyle,
) -> TextBufferObject {
    // Stage 1: split into lines.
    let mut lines: Vec<LineBuffer> = Vec::new();
    let mut line = LineBuffer::default();
    let mut word: Vec<GlyphInfo> = Vec::new();

    let max_width = layout_style.max_line_width;

    for glyph in glyphs {
        match glyph.character {
            '\n' => {
                append_word(&mut line, &mut lines, &mut word, max_width);
                lines.push(std::mem::take(&mut line));
            }
            ch if ch.is_whitespace() => {
                append_word(&mut line, &mut lines, &mut word, max_width);
                // leading spaces are dropped
                if !line.is_empty() {
                    line.glyphs.push(*glyph);
                }
            }
            _ => word.push(*glyph),
        }
    }
    append_word(&mut line, &mut lines, &mut word, max_width);
    lines.push(line);

    // Stage 2: align lines and position glyphs.
    let line_height = render_style.font_size * layout_style.line_height;
    let total_height = line_height * lines.len() as f32;
    let block_top = match layout_style.vertical_align {
        VerticalAlign::Top => 0.0,
        VerticalAlign::Middle => -total_height / 2.0,
        VerticalAlign::Bottom => -total_height,
    };

    let mut positioned = Vec::with_capacity(glyphs.len());
    let mut bounds: Option<ScreenBox> = None;

    for (index, line) in lines.iter().enumerate() {
        let width = line.width();
        let line_left = match layout_style.horizontal_align {
            HorizontalAlign::Left => 0.0,
            HorizontalAlign::Center => -width / 2.0,
            HorizontalAlign::Right => -width,
        };
        let line_top = block_top + line_height * index as f32;
        let baseline = line_top + render_style.font_size * ASCENT_RATIO;

        let line_box = ScreenBox::new(
            ScreenPoint::new(line_left, line_top),
            ScreenPoint::new(line_left + width, line_top + line_height),
        );
        bounds = Some(bounds.map_or(line_box, |b| b.union(&line_box)));

        let mut pen_x = line_left;
        for glyph in &line.glyphs {
            positioned.push(PositionedGlyph {
                glyph: *glyph,
                position: ScreenPoint::new(pen_x + glyph.x_min, baseline - (glyph.y_min + glyph.height)),
            });
            pen_x += glyph.advance;
        }
    }

    TextBufferObject {
        glyphs: positioned,
        bounds: bounds.unwrap_or_else(ScreenBox::zero),
    }
}

/// Moves the buffered word onto the current line, wrapping first if the line
/// would grow past `max_width`. A word wider than `max_width` gets a line of
/// its own.
fn append_word(
    line: &mut LineBuffer,
    lines: &mut Vec<LineBuffer>,
    word: &mut Vec<GlyphInfo>,
    max_width: Option<f32>,
) {
    if word.is_empty() {
        return;
    }

    if let Some(limit) = max_width
        && !line.is_empty()
        && line.projected_width(word) > limit
    {
        lines.push(std::mem::take(line));
    }
    line.glyphs.append(word);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyphs(text: &str) -> Vec<GlyphInfo> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| GlyphInfo {
                character: ch,
                glyph_index: i as u16,
                advance: 10.0,
                x_min: 1.0,
                y_min: 0.0,
                width: 8.0,
                height: 10.0,
            })
            .collect()
    }

    fn style() -> TextRenderStyle {
        TextRenderStyle {
            font_size: 10.0,
            ..Default::default()
        }
    }

    #[test]
    fn centered_single_line() {
        let layout = layout_label(&glyphs("abcd"), &style(), &TextLayoutStyle::default());
        assert_eq!(layout.glyph_count(), 4);
        assert_eq!(layout.bounds.min.x, -20.0);
        assert_eq!(layout.bounds.max.x, 20.0);
        assert!((layout.bounds.min.y + 6.0).abs() < 1e-5);
        assert!((layout.bounds.height() - 12.0).abs() < 1e-5);
        assert_eq!(layout.glyphs[0].position.x, -19.0);
    }

    #[test]
    fn explicit_breaks_and_alignment() {
        let layout_style = TextLayoutStyle {
            horizontal_align: HorizontalAlign::Left,
            vertical_align: VerticalAlign::Top,
            line_height: 1.0,
            max_line_width: None,
        };
        let layout = layout_label(&glyphs("ab\nc"), &style(), &layout_style);
        assert_eq!(layout.text(), "abc");
        assert_eq!(layout.bounds, ScreenBox::new(ScreenPoint::new(0.0, 0.0), ScreenPoint::new(20.0, 20.0)));
        // second line starts at the left edge again
        assert_eq!(layout.glyphs[2].position.x, 1.0);
    }

    #[test]
    fn wraps_at_word_boundaries() {
        let layout_style = TextLayoutStyle {
            horizontal_align: HorizontalAlign::Right,
            max_line_width: Some(50.0),
            ..Default::default()
        };
        let layout = layout_label(&glyphs("ab cd efgh"), &style(), &layout_style);
        assert!((layout.bounds.height() - 24.0).abs() < 1e-5);
        // the space after "cd" is dropped from the measured width
        assert_eq!(layout.bounds.min.x, -50.0);
        assert_eq!(layout.bounds.max.x, 0.0);
        assert_eq!(layout.text(), "ab cd efgh");
    }

    #[test]
    fn overlong_word_gets_its_own_line() {
        let layout_style = TextLayoutStyle {
            max_line_width: Some(20.0),
            ..Default::default()
        };
        let layout = layout_label(&glyphs("a bcdef"), &style(), &layout_style);
        assert!((layout.bounds.height() - 24.0).abs() < 1e-5);
        assert_eq!(layout.bounds.width(), 50.0);
    }

    #[test]
    fn run_width_sums_advances() {
        assert_eq!(run_width(&glyphs("abc")), 30.0);
        assert_eq!(run_width(&[]), 0.0);
    }
}
