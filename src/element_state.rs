use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    geometry::WorldPoint,
    glyphs::{GlyphInfo, GlyphLoad},
    render_state::RenderState,
    text_element::TextElement,
    text_layout::TextBufferObject,
};

slotmap::new_key_type! {
    /// Handle of a [`TextElementState`] inside the state cache.
    pub struct ElementKey;
}

/// Glyph loading phase of an element.
#[derive(Clone, Debug, Default)]
pub enum LoadingState {
    /// Nothing requested yet, or the last request failed.
    #[default]
    Unloaded,
    Requested(GlyphLoad),
    /// Glyphs are available but not yet measured.
    Loaded,
    /// Glyph run and text buffer object are ready.
    Initialized,
}

/// Per-frame placement data of one [`TextElement`].
#[derive(Debug)]
pub struct TextElementState {
    element: Arc<TextElement>,
    text_render_state: RenderState,
    /// One per icon instance; line markers have one per anchor point.
    icon_render_states: SmallVec<[RenderState; 1]>,
    /// `None` while the element is not placeable.
    view_distance: Option<f64>,
    initialized: bool,

    loading: LoadingState,
    glyphs: Option<Arc<[GlyphInfo]>>,
    text_buffer_object: Option<Arc<TextBufferObject>>,
}

impl TextElementState {
    pub fn new(element: Arc<TextElement>, fade_time: f64) -> Self {
        let icon_render_states = (0..element.icon_instance_count())
            .map(|_| RenderState::new(fade_time))
            .collect();

        Self {
            element,
            text_render_state: RenderState::new(fade_time),
            icon_render_states,
            view_distance: None,
            initialized: false,
            loading: LoadingState::Unloaded,
            glyphs: None,
            text_buffer_object: None,
        }
    }

    pub fn element(&self) -> &Arc<TextElement> {
        &self.element
    }

    /// First anchor point, used for distance and duplicate checks.
    pub fn position(&self) -> WorldPoint {
        self.element
            .geometry
            .points()
            .first()
            .copied()
            .unwrap_or_else(WorldPoint::origin)
    }

    /// Records the outcome of the pre-placement filter.
    pub fn update(&mut self, view_distance: Option<f64>) {
        self.view_distance = view_distance;
        self.initialized = view_distance.is_some();
    }

    pub fn view_distance(&self) -> Option<f64> {
        self.view_distance
    }

    /// Passed the pre-placement filter in the latest update pass.
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub fn text_render_state(&self) -> &RenderState {
        &self.text_render_state
    }

    pub fn text_render_state_mut(&mut self) -> &mut RenderState {
        &mut self.text_render_state
    }

    pub fn icon_render_states(&self) -> &[RenderState] {
        &self.icon_render_states
    }

    pub fn icon_render_state_mut(&mut self, index: usize) -> Option<&mut RenderState> {
        self.icon_render_states.get_mut(index)
    }

    pub fn icon_render_state(&self, index: usize) -> Option<&RenderState> {
        self.icon_render_states.get(index)
    }

    /// Whether text or any icon instance is drawn, fading ones included.
    pub fn visible(&self) -> bool {
        self.text_render_state.is_visible() || self.icon_render_states.iter().any(RenderState::is_visible)
    }

    pub fn is_fading(&self) -> bool {
        self.text_render_state.is_fading() || self.icon_render_states.iter().any(RenderState::is_fading)
    }

    /// Advances every fade. Returns [`visible`](Self::visible) afterwards.
    pub fn update_fading(&mut self, time: f64, disable_fading: bool) -> bool {
        self.text_render_state.update_fading(time, disable_fading);
        for state in &mut self.icon_render_states {
            state.update_fading(time, disable_fading);
        }
        self.visible()
    }

    pub fn reset_render_states(&mut self) {
        self.text_render_state.reset();
        for state in &mut self.icon_render_states {
            state.reset();
        }
    }

    /// Back to the freshly created state, loaded glyphs excepted.
    pub fn reset(&mut self) {
        self.reset_render_states();
        self.update(None);
    }

    /// Takes over the fades of `predecessor`, a duplicate of this element
    /// that is going away, and resets it.
    pub fn replace(&mut self, predecessor: &mut TextElementState) {
        std::mem::swap(&mut self.text_render_state, &mut predecessor.text_render_state);
        if self.icon_render_states.len() == predecessor.icon_render_states.len() {
            std::mem::swap(&mut self.icon_render_states, &mut predecessor.icon_render_states);
        }
        predecessor.reset_render_states();
    }

    pub fn loading(&self) -> &LoadingState {
        &self.loading
    }

    pub fn set_loading(&mut self, loading: LoadingState) {
        self.loading = loading;
    }

    pub fn glyphs(&self) -> Option<&Arc<[GlyphInfo]>> {
        self.glyphs.as_ref()
    }

    pub fn text_buffer_object(&self) -> Option<&Arc<TextBufferObject>> {
        self.text_buffer_object.as_ref()
    }

    /// Stores the measured text and moves to [`LoadingState::Initialized`].
    pub fn set_text(&mut self, glyphs: Arc<[GlyphInfo]>, text_buffer_object: Option<Arc<TextBufferObject>>) {
        self.glyphs = Some(glyphs);
        self.text_buffer_object = text_buffer_object;
        self.loading = LoadingState::Initialized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{geometry::ScreenSize, geometry::ScreenVector, text_element::IconDescriptor};

    fn marker(points: usize) -> Arc<TextElement> {
        let icon = IconDescriptor {
            image: "shield".into(),
            size: ScreenSize::new(10.0, 10.0),
            offset: ScreenVector::zero(),
        };
        let points = (0..points).map(|i| WorldPoint::new(i as f64, 0.0, 0.0)).collect();
        Arc::new(TextElement::line_marker("A7", points).with_icon(icon))
    }

    #[test]
    fn icon_states_match_instances() {
        let state = TextElementState::new(marker(3), 100.0);
        assert_eq!(state.icon_render_states().len(), 3);
        assert!(!state.visible());
        assert!(!state.initialized());
    }

    #[test]
    fn update_tracks_filter_outcome() {
        let mut state = TextElementState::new(marker(1), 100.0);
        state.update(Some(42.0));
        assert!(state.initialized());
        assert_eq!(state.view_distance(), Some(42.0));
        state.update(None);
        assert!(!state.initialized());
    }

    #[test]
    fn visible_if_any_instance_is() {
        let mut state = TextElementState::new(marker(2), 100.0);
        if let Some(icon) = state.icon_render_state_mut(1) {
            icon.start_fade_in(1, 0.0, false);
        }
        assert!(state.visible());
        assert!(state.is_fading());
        assert!(state.update_fading(100.0, false));
        assert!(!state.is_fading());
    }

    #[test]
    fn replace_inherits_fade() {
        let element = Arc::new(TextElement::point("Berlin", WorldPoint::origin()));
        let mut old = TextElementState::new(Arc::clone(&element), 100.0);
        let mut new = TextElementState::new(element, 100.0);

        old.text_render_state_mut().start_fade_in(1, 0.0, false);
        old.update_fading(50.0, false);
        let opacity = old.text_render_state().opacity();

        new.replace(&mut old);
        assert!(new.text_render_state().is_fading_in());
        assert_eq!(new.text_render_state().opacity(), opacity);
        assert!(old.text_render_state().is_undefined());
        assert!(!old.visible());
    }
}
