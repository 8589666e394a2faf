//! Placement of single elements against the collision index.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use fxhash::FxBuildHasher;

use super::UpdateRequester;
use crate::{
    canvas::{IconRenderParams, TextCanvas, TextRenderParams},
    collision::ScreenCollisions,
    config::PlacementConfig,
    element_state::{LoadingState, TextElementState},
    geometry::{ScreenBox, ScreenPoint, ScreenSize, ScreenVector, centered_box, smoothstep, world_distance_sq},
    glyphs::{GlyphInfo, GlyphService, LoadStatus},
    projection::Projector,
    render_state::RenderState,
    text_element::{LabelGeometry, TextElement},
    text_layout::{layout_label, run_width},
    view_state::ViewState,
};

/// Result of one placement attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum PlacementOutcome {
    Placed,
    Rejected,
    /// Glyphs are still loading.
    Pending,
    /// Not placed, but still drawn while fading out.
    FadingOut,
}

/// Buffers reused across frames.
#[derive(Default)]
pub(super) struct PlacementScratch {
    pub path_points: Vec<ScreenPoint>,
    /// Box, baseline origin and rotation of each path glyph.
    pub path_glyphs: Vec<(ScreenBox, ScreenPoint, f32)>,
    pub shield_positions: HashMap<u32, Vec<ScreenPoint>, FxBuildHasher>,
}

impl PlacementScratch {
    pub fn begin_frame(&mut self) {
        for positions in self.shield_positions.values_mut() {
            positions.clear();
        }
    }
}

/// Everything an element placement touches besides the state cache.
pub(super) struct PlacementContext<'a> {
    pub config: &'a PlacementConfig,
    pub view: &'a ViewState,
    pub projector: &'a dyn Projector,
    pub glyph_service: &'a mut dyn GlyphService,
    pub canvas: &'a mut dyn TextCanvas,
    pub collisions: &'a mut dyn ScreenCollisions,
    pub scratch: &'a mut PlacementScratch,
    pub force_new_pass: &'a Arc<AtomicBool>,
    pub update_requester: Option<&'a UpdateRequester>,
    pub frame_number: u64,
    pub time: f64,
}

/// Pre-placement filter run by the update pass.
///
/// Returns the distance of the nearest anchor to the camera, or `None` when
/// the element cannot be placed in the current view.
pub(super) fn pre_placement_filter(state: &TextElementState, view: &ViewState, projector: &dyn Projector) -> Option<f64> {
    let element = state.element();
    if !element.is_in_zoom_range(view.zoom_level) {
        return None;
    }

    let points = element.geometry.points();
    let first = points.first()?;
    // paths and markers are projected point by point during placement
    if element.geometry.is_point() && projector.project(first).is_none() {
        return None;
    }

    let view_distance = points
        .iter()
        .map(|point| world_distance_sq(point, &view.camera_position))
        .fold(f64::INFINITY, f64::min)
        .sqrt();
    if view_distance > view.max_visibility_distance {
        return None;
    }
    if let Some(fade_far) = element.fade_far
        && view.max_visibility_distance.is_finite()
        && view_distance > fade_far * view.max_visibility_distance
    {
        return None;
    }

    Some(view_distance)
}

/// Opacity factor of the distance fade between `fade_near` and `fade_far`.
pub(super) fn distance_fade_factor(element: &TextElement, view_distance: Option<f64>, view: &ViewState) -> f32 {
    let (Some(near), Some(far), Some(distance)) = (element.fade_near, element.fade_far, view_distance) else {
        return 1.0;
    };
    let max = view.max_visibility_distance;
    if !max.is_finite() {
        return 1.0;
    }
    (1.0 - smoothstep(near * max, far * max, distance)) as f32
}

impl PlacementContext<'_> {
    /// Places one cached element. `visited` tells whether its group is still
    /// referenced by a rendered tile.
    pub fn place_element(&mut self, state: &mut TextElementState, visited: bool) -> PlacementOutcome {
        if !state.initialized() || !visited {
            return self.fade_out(state);
        }

        if !self.ensure_glyphs(state) {
            log::trace!("Glyphs of {:?} not ready", state.element().text);
            return PlacementOutcome::Pending;
        }

        match state.element().geometry {
            LabelGeometry::Point(_) => self.place_point_label(state),
            LabelGeometry::Path(_) => self.place_path_label(state),
            LabelGeometry::LineMarker(_) => self.place_line_marker(state),
        }
    }

    /// Drives the glyph loading of `state`. Returns `true` once the element is
    /// ready to be placed.
    pub fn ensure_glyphs(&mut self, state: &mut TextElementState) -> bool {
        if matches!(state.loading(), LoadingState::Initialized) {
            return true;
        }

        let element = Arc::clone(state.element());
        if !element.has_text() {
            state.set_text(Arc::from(Vec::<GlyphInfo>::new()), None);
            return true;
        }

        if matches!(state.loading(), LoadingState::Unloaded) {
            let load = self.glyph_service.load_charset(&element.text, &element.render_style);
            if load.is_pending() {
                let force_new_pass = Arc::clone(self.force_new_pass);
                let requester = self.update_requester.cloned();
                load.on_complete(move |_| {
                    force_new_pass.store(true, Ordering::Release);
                    if let Some(request_update) = requester {
                        request_update();
                    }
                });
            }
            state.set_loading(LoadingState::Requested(load));
        }

        let status = match state.loading() {
            LoadingState::Requested(load) => Some(load.status()),
            _ => None,
        };
        match status {
            Some(LoadStatus::Pending) => return false,
            Some(LoadStatus::Ready) => state.set_loading(LoadingState::Loaded),
            Some(LoadStatus::Failed) => {
                log::debug!("Glyph load for {:?} failed, retrying later", element.text);
                state.set_loading(LoadingState::Unloaded);
                return false;
            }
            None => {}
        }

        let Some(glyphs) = self.glyph_service.glyphs(&element.text, &element.render_style) else {
            state.set_loading(LoadingState::Unloaded);
            return false;
        };
        let text_buffer_object = (!matches!(element.geometry, LabelGeometry::Path(_)))
            .then(|| Arc::new(layout_label(&glyphs, &element.render_style, &element.layout_style)));
        state.set_text(glyphs, text_buffer_object);
        true
    }

    /// Starts fading out everything and keeps drawing point labels until they
    /// are gone.
    pub fn fade_out(&mut self, state: &mut TextElementState) -> PlacementOutcome {
        let (frame, time, disable) = (self.frame_number, self.time, self.config.disable_fading);
        state.text_render_state_mut().check_start_fade_out(frame, time, disable);
        for index in 0..state.icon_render_states().len() {
            if let Some(icon_state) = state.icon_render_state_mut(index) {
                icon_state.check_start_fade_out(frame, time, disable);
            }
        }

        if !state.visible() {
            return PlacementOutcome::Rejected;
        }

        let element = Arc::clone(state.element());
        if let LabelGeometry::Point(anchor) = &element.geometry
            && let Some(screen) = self.projector.project(anchor)
        {
            let factor = distance_fade_factor(&element, state.view_distance(), self.view);
            self.draw_point(state, &element, screen, factor);
        }
        PlacementOutcome::FadingOut
    }

    /// Whether `bounds` is on screen and, unless overlap is allowed, free.
    fn fits(&self, element: &TextElement, bounds: &ScreenBox) -> bool {
        self.collisions.is_visible(bounds) && (element.may_overlap || !self.collisions.is_allocated(bounds))
    }

    /// Applies the text/icon policy to candidate boxes. Returns which of the
    /// two may be shown.
    fn decide(
        &self,
        element: &TextElement,
        text_bounds: Option<&ScreenBox>,
        icon_bounds: Option<&ScreenBox>,
        glyph_count: usize,
    ) -> (bool, bool) {
        let layer = self.canvas.layer(element.render_order);

        let text_fits = text_bounds.is_some_and(|bounds| self.fits(element, bounds) && layer.fits(glyph_count));
        let icon_fits = icon_bounds.is_some_and(|bounds| self.fits(element, bounds) && layer.fits(1));

        let mut show_text = text_fits;
        let mut show_icon = icon_fits;
        if show_text && show_icon && !layer.fits(glyph_count + 1) {
            // both fit on screen but not together into the layer
            if element.text_is_optional {
                show_text = false;
            } else if element.icon_is_optional {
                show_icon = false;
            } else {
                show_text = false;
                show_icon = false;
            }
        }
        if icon_bounds.is_some() && !show_icon && !element.icon_is_optional {
            show_text = false;
        }
        if text_bounds.is_some() && !show_text && !element.text_is_optional {
            show_icon = false;
        }
        (show_text, show_icon)
    }

    fn reserve(&mut self, element: &TextElement, bounds: ScreenBox) {
        if element.reserve_space {
            self.collisions.allocate(bounds);
        }
    }

    fn transition(&self, render_state: &mut RenderState, show: bool) {
        let (frame, time, disable) = (self.frame_number, self.time, self.config.disable_fading);
        if show {
            render_state.check_start_fade_in(frame, time, disable);
        } else {
            render_state.check_start_fade_out(frame, time, disable);
        }
    }

    fn text_params(&self, element: &TextElement, opacity: f32, rotation: f32) -> TextRenderParams {
        TextRenderParams {
            opacity,
            color: element.render_style.color,
            font_size: element.render_style.font_size,
            rotation,
            layer: element.render_order,
        }
    }

    fn place_point_label(&mut self, state: &mut TextElementState) -> PlacementOutcome {
        let element = Arc::clone(state.element());
        let LabelGeometry::Point(anchor) = &element.geometry else {
            return PlacementOutcome::Rejected;
        };
        let Some(screen) = self.projector.project(anchor) else {
            return self.fade_out(state);
        };

        let position = screen + element.offset;
        let text_buffer_object = state.text_buffer_object().cloned();
        let glyph_count = text_buffer_object.as_ref().map_or(0, |text| text.glyph_count());
        let text_bounds = text_buffer_object
            .as_ref()
            .filter(|text| text.glyph_count() > 0)
            .map(|text| text.bounds.translate(position.to_vector()));
        let icon_bounds = element
            .icon
            .as_ref()
            .map(|icon| centered_box(screen + icon.offset, icon.size));

        let (show_text, show_icon) = self.decide(&element, text_bounds.as_ref(), icon_bounds.as_ref(), glyph_count);

        if let Some(bounds) = text_bounds {
            if show_text {
                self.reserve(&element, bounds);
            }
            self.transition(state.text_render_state_mut(), show_text);
        }
        if let Some(bounds) = icon_bounds {
            if show_icon {
                self.reserve(&element, bounds);
            }
            if let Some(icon_state) = state.icon_render_state_mut(0) {
                self.transition(icon_state, show_icon);
            }
        }

        let factor = distance_fade_factor(&element, state.view_distance(), self.view);
        self.draw_point(state, &element, screen, factor);

        if show_text || show_icon {
            log::trace!("Placed {:?}", element.text);
            PlacementOutcome::Placed
        } else if state.visible() {
            PlacementOutcome::FadingOut
        } else {
            PlacementOutcome::Rejected
        }
    }

    /// Draws whatever part of a point label is visible.
    pub fn draw_point(&mut self, state: &TextElementState, element: &TextElement, screen: ScreenPoint, factor: f32) {
        let text_state = state.text_render_state();
        if text_state.is_visible()
            && let Some(text) = state.text_buffer_object()
            && text.glyph_count() > 0
        {
            let params = self.text_params(element, text_state.opacity() * factor, 0.0);
            self.canvas
                .add_text_buffer_object(text, screen + element.offset, &params);
        }

        if let (Some(icon), Some(icon_state)) = (&element.icon, state.icon_render_state(0))
            && icon_state.is_visible()
        {
            let params = IconRenderParams {
                opacity: icon_state.opacity() * factor,
                layer: element.render_order,
            };
            self.canvas
                .add_icon(icon, centered_box(screen + icon.offset, icon.size), &params);
        }
    }

    fn place_path_label(&mut self, state: &mut TextElementState) -> PlacementOutcome {
        let element = Arc::clone(state.element());

        self.scratch.path_points.clear();
        for point in element.geometry.points() {
            let Some(screen) = self.projector.project(point) else {
                // the label must follow the projected curve, never a chord across a gap
                state.reset_render_states();
                return PlacementOutcome::Rejected;
            };
            self.scratch.path_points.push(screen);
        }
        if self.scratch.path_points.len() < 2 {
            state.reset_render_states();
            return PlacementOutcome::Rejected;
        }

        let points = &mut self.scratch.path_points;
        if let (Some(first), Some(last)) = (points.first(), points.last())
            && first.x > last.x
        {
            points.reverse();
        }

        let Some(glyphs) = state.glyphs().cloned() else {
            return PlacementOutcome::Pending;
        };
        let text_width = run_width(&glyphs);
        let path_length: f32 = points.windows(2).map(|s| (s[1] - s[0]).length()).sum();

        let layer = self.canvas.layer(element.render_order);
        let fits_path = text_width <= path_length && layer.fits(glyphs.len());

        self.scratch.path_glyphs.clear();
        let mut all_fit = fits_path;
        if fits_path {
            let mut distance = (path_length - text_width) / 2.0;
            for glyph in glyphs.iter() {
                let (origin, angle) = point_along(&self.scratch.path_points, distance);
                let (center, _) = point_along(&self.scratch.path_points, distance + glyph.advance / 2.0);
                let size = ScreenSize::new(glyph.advance.max(1.0), element.render_style.font_size);
                let bounds = centered_box(center, size);
                let free = element.may_overlap || !self.collisions.is_allocated(&bounds);
                if !self.collisions.is_fully_visible(&bounds) || !free {
                    all_fit = false;
                    break;
                }
                self.scratch.path_glyphs.push((bounds, origin, angle));
                distance += glyph.advance;
            }
        }

        if !all_fit {
            self.transition(state.text_render_state_mut(), false);
            return PlacementOutcome::Rejected;
        }

        for index in 0..self.scratch.path_glyphs.len() {
            let bounds = self.scratch.path_glyphs[index].0;
            self.reserve(&element, bounds);
        }
        self.transition(state.text_render_state_mut(), true);

        let opacity = state.text_render_state().opacity()
            * distance_fade_factor(&element, state.view_distance(), self.view);
        for (glyph, &(_, origin, angle)) in glyphs.iter().zip(self.scratch.path_glyphs.iter()) {
            let params = TextRenderParams {
                opacity,
                color: element.render_style.color,
                font_size: element.render_style.font_size,
                rotation: angle,
                layer: element.render_order,
            };
            self.canvas.add_text(std::slice::from_ref(glyph), origin, &params);
        }
        PlacementOutcome::Placed
    }

    fn place_line_marker(&mut self, state: &mut TextElementState) -> PlacementOutcome {
        let element = Arc::clone(state.element());
        let text_buffer_object = state.text_buffer_object().cloned();
        let glyph_count = text_buffer_object.as_ref().map_or(0, |text| text.glyph_count());
        let factor = distance_fade_factor(&element, state.view_distance(), self.view);
        let min_distance_sq = self.config.min_shield_distance * self.config.min_shield_distance;

        let mut any_text = false;
        let mut placed = 0usize;

        for (index, point) in element.geometry.points().iter().enumerate() {
            let Some(screen) = self.projector.project(point) else {
                if let Some(icon_state) = state.icon_render_state_mut(index) {
                    self.transition(icon_state, false);
                }
                continue;
            };

            let too_close = element.shield_group.is_some_and(|group| {
                self.scratch
                    .shield_positions
                    .get(&group)
                    .is_some_and(|positions| {
                        positions
                            .iter()
                            .any(|p| (*p - screen).square_length() < min_distance_sq)
                    })
            });

            let position = screen + element.offset;
            let text_bounds = text_buffer_object
                .as_ref()
                .filter(|text| text.glyph_count() > 0)
                .map(|text| text.bounds.translate(position.to_vector()));
            let icon_bounds = element
                .icon
                .as_ref()
                .map(|icon| centered_box(screen + icon.offset, icon.size));

            let (show_text, show_icon) = if too_close {
                (false, false)
            } else {
                self.decide(&element, text_bounds.as_ref(), icon_bounds.as_ref(), glyph_count)
            };

            if let Some(bounds) = text_bounds.filter(|_| show_text) {
                self.reserve(&element, bounds);
            }
            if let Some(bounds) = icon_bounds.filter(|_| show_icon) {
                self.reserve(&element, bounds);
            }
            if let Some(icon_state) = state.icon_render_state_mut(index) {
                self.transition(icon_state, show_icon);
            }

            if show_text || show_icon {
                placed += 1;
                any_text |= show_text;
                if let Some(group) = element.shield_group {
                    self.scratch.shield_positions.entry(group).or_default().push(screen);
                }
                self.draw_marker(state, &element, index, screen, show_text, factor);
            } else if let Some(icon_state) = state.icon_render_state(index)
                && icon_state.is_visible()
            {
                self.draw_marker(state, &element, index, screen, false, factor);
            }
        }

        self.transition(state.text_render_state_mut(), any_text);

        if placed > 0 {
            PlacementOutcome::Placed
        } else if state.visible() {
            PlacementOutcome::FadingOut
        } else {
            PlacementOutcome::Rejected
        }
    }

    fn draw_marker(
        &mut self,
        state: &TextElementState,
        element: &TextElement,
        index: usize,
        screen: ScreenPoint,
        with_text: bool,
        factor: f32,
    ) {
        let icon_state = state.icon_render_state(index);
        let opacity = icon_state.map_or(state.text_render_state().opacity(), RenderState::opacity) * factor;

        if let (Some(icon), Some(_)) = (&element.icon, icon_state) {
            let params = IconRenderParams {
                opacity,
                layer: element.render_order,
            };
            self.canvas
                .add_icon(icon, centered_box(screen + icon.offset, icon.size), &params);
        }
        if with_text && let Some(text) = state.text_buffer_object() {
            let params = self.text_params(element, opacity, 0.0);
            self.canvas
                .add_text_buffer_object(text, screen + element.offset, &params);
        }
    }
}

/// Point at `distance` along the polyline and the direction angle there.
fn point_along(points: &[ScreenPoint], distance: f32) -> (ScreenPoint, f32) {
    let mut remaining = distance.max(0.0);
    for segment in points.windows(2) {
        let delta: ScreenVector = segment[1] - segment[0];
        let length = delta.length();
        if remaining <= length {
            let t = if length > 0.0 { remaining / length } else { 0.0 };
            return (segment[0].lerp(segment[1], t), delta.angle_from_x_axis().radians);
        }
        remaining -= length;
    }

    match points {
        [.., before, last] => (*last, (*last - *before).angle_from_x_axis().radians),
        [only] => (*only, 0.0),
        [] => (ScreenPoint::origin(), 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::WorldPoint;

    #[test]
    fn point_along_walks_segments() {
        let path = [
            ScreenPoint::new(0.0, 0.0),
            ScreenPoint::new(10.0, 0.0),
            ScreenPoint::new(10.0, 10.0),
        ];
        let (p, angle) = point_along(&path, 5.0);
        assert_eq!(p, ScreenPoint::new(5.0, 0.0));
        assert_eq!(angle, 0.0);

        let (p, angle) = point_along(&path, 15.0);
        assert_eq!(p, ScreenPoint::new(10.0, 5.0));
        assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 1e-6);

        let (p, _) = point_along(&path, 100.0);
        assert_eq!(p, ScreenPoint::new(10.0, 10.0));
    }

    fn view() -> ViewState {
        let mut view = ViewState::new(10.0, WorldPoint::origin(), ScreenSize::new(100.0, 100.0));
        view.max_visibility_distance = 1000.0;
        view
    }

    #[test]
    fn filter_checks_zoom_frustum_and_distance() {
        let projector = |p: &WorldPoint| (p.x.abs() < 50.0).then(|| ScreenPoint::new(p.x as f32 + 50.0, 50.0));
        let view = view();

        let state = |element: TextElement| TextElementState::new(Arc::new(element), 100.0);

        let near = state(TextElement::point("A", WorldPoint::new(30.0, 40.0, 0.0)));
        assert_eq!(pre_placement_filter(&near, &view, &projector), Some(50.0));

        let outside = state(TextElement::point("A", WorldPoint::new(60.0, 0.0, 0.0)));
        assert_eq!(pre_placement_filter(&outside, &view, &projector), None);

        // paths are not frustum tested here
        let path = state(TextElement::path(
            "Main St",
            vec![WorldPoint::new(60.0, 0.0, 0.0), WorldPoint::new(90.0, 0.0, 0.0)],
        ));
        assert_eq!(pre_placement_filter(&path, &view, &projector), Some(60.0));

        let mut zoomed = TextElement::point("A", WorldPoint::origin());
        zoomed.min_zoom_level = Some(12.0);
        assert_eq!(pre_placement_filter(&state(zoomed), &view, &projector), None);

        let mut faded = TextElement::point("A", WorldPoint::new(30.0, 40.0, 0.0));
        faded.fade_far = Some(0.01);
        assert_eq!(pre_placement_filter(&state(faded), &view, &projector), None);
    }

    #[test]
    fn distance_fade_is_one_without_parameters() {
        let view = view();
        let mut element = TextElement::point("A", WorldPoint::origin());
        assert_eq!(distance_fade_factor(&element, Some(500.0), &view), 1.0);

        element.fade_near = Some(0.4);
        element.fade_far = Some(0.6);
        assert_eq!(distance_fade_factor(&element, Some(300.0), &view), 1.0);
        assert!((distance_fade_factor(&element, Some(500.0), &view) - 0.5).abs() < 1e-6);
        assert_eq!(distance_fade_factor(&element, Some(700.0), &view), 0.0);
    }
}
