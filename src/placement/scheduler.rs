use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use super::{
    PlacementStats, UpdateRequester,
    place::{PlacementContext, PlacementOutcome, PlacementScratch, pre_placement_filter},
};
use crate::{
    canvas::TextCanvas,
    collision::{ScreenCollisions, polyline_boxes},
    config::PlacementConfig,
    element_state::{ElementKey, TextElementState},
    error::ConfigError,
    geometry::{ScreenBox, ScreenPoint, ScreenSize},
    glyphs::{GlyphLoad, GlyphService, LoadStatus},
    projection::Projector,
    state_cache::TextElementStateCache,
    text_element::{GroupId, LabelGeometry, TextElement},
    tile::DataSourceTileList,
    view_state::ViewState,
};

enum Initialization {
    NotStarted,
    Pending(GlyphLoad),
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pass {
    /// Elements already visible.
    Persistent,
    /// Elements not yet visible.
    New,
}

/// Per-frame label placement.
///
/// Owns the state cache, the glyph service, the collision index and the
/// canvas. Call [`place_text`](Self::place_text) once per rendered frame.
pub struct PlacementScheduler<G, S, C> {
    config: PlacementConfig,
    cache: TextElementStateCache,
    glyph_service: G,
    collisions: S,
    canvas: C,

    overlay: Vec<TextElementState>,
    initialization: Initialization,
    force_new_pass: Arc<AtomicBool>,
    update_requester: Option<UpdateRequester>,
    cache_invalidated: bool,
    update_pending: bool,
    overloaded: bool,
    frame_number: u64,

    sorted_groups: Vec<GroupId>,
    element_keys: Vec<ElementKey>,
    tile_order: Vec<usize>,
    screen_points: Vec<ScreenPoint>,
    blocking_boxes: Vec<ScreenBox>,
    scratch: PlacementScratch,
}

impl<G, S, C> PlacementScheduler<G, S, C>
where
    G: GlyphService,
    S: ScreenCollisions,
    C: TextCanvas,
{
    pub fn new(config: PlacementConfig, glyph_service: G, collisions: S, canvas: C) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            cache: TextElementStateCache::new(&config),
            config,
            glyph_service,
            collisions,
            canvas,
            overlay: Vec::new(),
            initialization: Initialization::NotStarted,
            force_new_pass: Arc::new(AtomicBool::new(false)),
            update_requester: None,
            cache_invalidated: false,
            update_pending: false,
            overloaded: false,
            frame_number: 0,
            sorted_groups: Vec::new(),
            element_keys: Vec::new(),
            tile_order: Vec::new(),
            screen_points: Vec::new(),
            blocking_boxes: Vec::new(),
            scratch: PlacementScratch::default(),
        })
    }

    /// Called when a glyph load completes, possibly from another thread.
    /// Hosts typically use it to schedule another frame.
    pub fn set_update_requester(&mut self, request_update: impl Fn() + Send + Sync + 'static) {
        self.update_requester = Some(Arc::new(request_update));
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    pub fn cache(&self) -> &TextElementStateCache {
        &self.cache
    }

    pub fn glyph_service(&self) -> &G {
        &self.glyph_service
    }

    pub fn glyph_service_mut(&mut self) -> &mut G {
        &mut self.glyph_service
    }

    pub fn collisions(&self) -> &S {
        &self.collisions
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn is_overloaded(&self) -> bool {
        self.overloaded
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Drops all cached state; the next frame re-derives every group.
    pub fn invalidate_cache(&mut self) {
        self.cache.clear();
        self.cache_invalidated = true;
    }

    /// Adds a label anchored in normalized device coordinates: the `x`/`y` of
    /// its point geometry lie in `[-1, 1]`, `y` up. Overlay labels are drawn
    /// after all others and never collide.
    pub fn add_overlay_text(&mut self, element: TextElement) {
        let mut state = TextElementState::new(Arc::new(element), self.config.fade_time);
        state.update(Some(0.0));
        self.overlay.push(state);
    }

    pub fn clear_overlay_text(&mut self) {
        self.overlay.clear();
    }

    /// Runs one frame of placement.
    ///
    /// `time` is in milliseconds and drives the fades.
    pub fn place_text(
        &mut self,
        tiles: &[DataSourceTileList],
        view: &ViewState,
        projector: &impl Projector,
        time: f64,
    ) -> PlacementStats {
        self.frame_number += 1;
        let mut stats = PlacementStats {
            frame_number: self.frame_number,
            ..Default::default()
        };

        let mut tiles_changed = false;
        let mut label_count = 0usize;
        for tile in tiles.iter().flat_map(|list| list.rendered_tiles.iter()) {
            tiles_changed |= tile.take_text_elements_changed();
            label_count += tile.label_count();
        }

        if !self.ensure_initialized(label_count > 0 || !self.overlay.is_empty()) {
            return stats;
        }
        stats.initialized = true;

        let overloaded = label_count > self.config.overload_label_threshold;
        if overloaded != self.overloaded {
            if overloaded {
                log::warn!("Entering overload mode: {label_count} labels in rendered tiles");
            } else {
                log::warn!("Leaving overload mode: {label_count} labels in rendered tiles");
            }
            self.overloaded = overloaded;
        }
        stats.overloaded = overloaded;

        let disable_fading = self.config.disable_fading;
        let update_text_elements =
            self.cache_invalidated || tiles_changed || view.rendered_tiles_changed || self.update_pending;
        self.cache_invalidated = false;

        stats.evicted = if update_text_elements {
            self.cache.clear_visited();
            self.update_text_elements(tiles, view, projector, &mut stats);
            self.cache.update(time, false, disable_fading, true)
        } else {
            self.cache.update(time, false, disable_fading, false)
        };
        stats.updated = update_text_elements;

        let force_new_pass = self.force_new_pass.swap(false, Ordering::AcqRel);

        self.collisions.reset(view.screen_size);
        self.canvas.clear();
        self.allocate_blocking(tiles, projector, &mut stats);

        let place_new = !overloaded || update_text_elements || stats.evicted || force_new_pass;
        stats.new_pass = place_new;
        self.place_groups(view, projector, time, place_new, &mut stats);
        self.place_overlay(view, projector, time, &mut stats);

        stats.animating = self.cache.is_animating() || self.overlay.iter().any(TextElementState::is_fading);

        log::debug!(
            "Frame {}: placed {}, rejected {}, pending {}, fading out {}, overlay {}{}{}",
            stats.frame_number,
            stats.placed,
            stats.rejected,
            stats.pending,
            stats.fading_out,
            stats.overlay_placed,
            if stats.updated { ", updated" } else { "" },
            if stats.overloaded { ", overloaded" } else { "" },
        );
        stats
    }

    /// Requests glyph service initialization once there is something to show.
    /// Returns whether it has completed.
    fn ensure_initialized(&mut self, has_elements: bool) -> bool {
        if let Initialization::NotStarted = self.initialization {
            if !has_elements {
                return false;
            }
            let load = self.glyph_service.initialize();
            let force_new_pass = Arc::clone(&self.force_new_pass);
            let requester = self.update_requester.clone();
            load.on_complete(move |_| {
                force_new_pass.store(true, Ordering::Release);
                if let Some(request_update) = requester {
                    request_update();
                }
            });
            self.initialization = Initialization::Pending(load);
        }

        let Initialization::Pending(load) = &self.initialization else {
            return true;
        };
        match load.status() {
            LoadStatus::Pending => false,
            LoadStatus::Ready => {
                log::debug!("Glyph service initialized");
                self.initialization = Initialization::Done;
                self.cache_invalidated = true;
                true
            }
            LoadStatus::Failed => {
                log::error!("Glyph service initialization failed, retrying");
                self.initialization = Initialization::NotStarted;
                false
            }
        }
    }

    /// Re-derives the cached groups of every rendered tile.
    fn update_text_elements(
        &mut self,
        tiles: &[DataSourceTileList],
        view: &ViewState,
        projector: &dyn Projector,
        stats: &mut PlacementStats,
    ) {
        let start = Instant::now();
        let budgeted = self.overloaded;
        let mut interrupted = false;
        let mut groups_updated = 0usize;
        let mut groups_created = 0usize;

        self.cache.clear_text_cache();
        self.update_pending = false;

        let mut tile_order = std::mem::take(&mut self.tile_order);
        for list in tiles {
            tile_order.clear();
            tile_order.extend(0..list.rendered_tiles.len());
            tile_order.sort_by_key(|&index| list.rendered_tiles[index].key().morton_code());

            for &index in &tile_order {
                for group in list.rendered_tiles[index].groups() {
                    // cached groups are cheap to refresh and only count against the time budget
                    let cached = self.cache.group_state(group.id()).is_some();
                    if !interrupted
                        && budgeted
                        && ((!cached && groups_created >= self.config.overload_max_updated_groups)
                            || start.elapsed() > self.config.overload_update_time_budget)
                    {
                        log::debug!(
                            "Update pass interrupted after {groups_updated} groups ({:?})",
                            start.elapsed()
                        );
                        interrupted = true;
                        self.update_pending = true;
                    }

                    if interrupted {
                        // keep it alive until a later frame gets to it
                        self.cache.mark_visited(group.id());
                        continue;
                    }

                    let (_, hit) = self
                        .cache
                        .get_or_set(group, |state| pre_placement_filter(state, view, projector));
                    groups_updated += 1;
                    if !hit {
                        groups_created += 1;
                    }
                }
            }
        }
        self.tile_order = tile_order;

        stats.groups_updated = groups_updated;
        stats.update_interrupted = interrupted;
        stats.suppressed_duplicates = self.cache.suppressed_duplicates();
    }

    /// Reserves screen space for the blocking lines of every rendered tile.
    fn allocate_blocking(&mut self, tiles: &[DataSourceTileList], projector: &dyn Projector, stats: &mut PlacementStats) {
        self.blocking_boxes.clear();
        for tile in tiles.iter().flat_map(|list| list.rendered_tiles.iter()) {
            for blocking in tile.blocking_elements() {
                self.screen_points.clear();
                self.screen_points
                    .extend(blocking.points.iter().filter_map(|point| projector.project(point)));
                let size = ScreenSize::new(blocking.width, blocking.width);
                polyline_boxes(&self.screen_points, size, &mut self.blocking_boxes);
            }
        }

        self.collisions.allocate_blocking(&self.blocking_boxes);
        stats.blocking_boxes = self.blocking_boxes.len();
    }

    /// Places cached groups bucket by bucket, persistent elements first.
    ///
    /// Budgets only limit new labels: visible labels are always placed again,
    /// or faded out once `max_num_visible_labels` is reached.
    fn place_groups(
        &mut self,
        view: &ViewState,
        projector: &dyn Projector,
        time: f64,
        place_new: bool,
        stats: &mut PlacementStats,
    ) {
        let start = Instant::now();
        let time_boxed = self.overloaded && view.camera_is_moving;
        let max_labels = self.config.max_num_visible_labels;
        let time_budget = self.config.overload_placement_time_budget;
        let max_new = if self.overloaded {
            self.config.overload_max_new_labels
        } else {
            usize::MAX
        };
        let mut new_attempts = 0usize;

        let mut sorted_groups = std::mem::take(&mut self.sorted_groups);
        sorted_groups.clear();
        sorted_groups.extend_from_slice(self.cache.sorted_group_states());
        let mut element_keys = std::mem::take(&mut self.element_keys);
        self.scratch.begin_frame();

        let mut context = PlacementContext {
            config: &self.config,
            view,
            projector,
            glyph_service: &mut self.glyph_service,
            canvas: &mut self.canvas,
            collisions: &mut self.collisions,
            scratch: &mut self.scratch,
            force_new_pass: &self.force_new_pass,
            update_requester: self.update_requester.as_ref(),
            frame_number: self.frame_number,
            time,
        };
        let cache = &mut self.cache;

        let mut label_budget_reached = false;
        let mut new_pass_closed = false;

        let mut bucket_start = 0;
        while bucket_start < sorted_groups.len() {
            let priority = cache
                .group_state(sorted_groups[bucket_start])
                .map_or(f32::NEG_INFINITY, |group_state| group_state.priority());
            let bucket_len = sorted_groups[bucket_start..]
                .iter()
                .take_while(|&&id| cache.group_state(id).is_some_and(|g| g.priority() == priority))
                .count()
                .max(1);
            let bucket = &sorted_groups[bucket_start..bucket_start + bucket_len];
            bucket_start += bucket_len;

            for pass in [Pass::Persistent, Pass::New] {
                if pass == Pass::New && (!place_new || label_budget_reached || new_pass_closed) {
                    continue;
                }

                'groups: for &group_id in bucket {
                    let Some(group_state) = cache.group_state(group_id) else {
                        continue;
                    };
                    let visited = group_state.visited();
                    element_keys.clear();
                    element_keys.extend_from_slice(group_state.element_keys());

                    for &key in element_keys.iter() {
                        let Some(state) = cache.element_state_mut(key) else {
                            continue;
                        };

                        match pass {
                            Pass::Persistent if !state.visible() => continue,
                            Pass::New if state.visible() => continue,
                            // nothing to place or fade
                            Pass::New if !state.initialized() || !visited => continue,
                            _ => {}
                        }

                        if !label_budget_reached && stats.placed >= max_labels {
                            log::debug!("Label budget of {max_labels} reached");
                            stats.label_budget_exceeded = true;
                            label_budget_reached = true;
                        }
                        if label_budget_reached {
                            if pass == Pass::New {
                                break 'groups;
                            }
                            // visible labels past the budget keep drawing while they fade out
                            record(stats, context.fade_out(state));
                            continue;
                        }

                        if pass == Pass::New {
                            if time_boxed && start.elapsed() >= time_budget {
                                log::debug!("Placement time budget exceeded after {} labels", stats.placed);
                                stats.time_budget_exceeded = true;
                                new_pass_closed = true;
                                break 'groups;
                            }
                            if new_attempts >= max_new {
                                new_pass_closed = true;
                                break 'groups;
                            }
                            new_attempts += 1;
                        }

                        record(stats, context.place_element(state, visited));
                    }
                }
            }
        }

        self.sorted_groups = sorted_groups;
        self.element_keys = element_keys;
    }

    /// Draws overlay labels at their normalized device coordinates.
    fn place_overlay(&mut self, view: &ViewState, projector: &dyn Projector, time: f64, stats: &mut PlacementStats) {
        if self.overlay.is_empty() {
            return;
        }

        let disable_fading = self.config.disable_fading;
        let mut context = PlacementContext {
            config: &self.config,
            view,
            projector,
            glyph_service: &mut self.glyph_service,
            canvas: &mut self.canvas,
            collisions: &mut self.collisions,
            scratch: &mut self.scratch,
            force_new_pass: &self.force_new_pass,
            update_requester: self.update_requester.as_ref(),
            frame_number: self.frame_number,
            time,
        };

        for state in &mut self.overlay {
            state.update_fading(time, disable_fading);
            if !context.ensure_glyphs(state) {
                stats.pending += 1;
                continue;
            }

            let element = Arc::clone(state.element());
            let LabelGeometry::Point(ndc) = &element.geometry else {
                continue;
            };
            let screen = ScreenPoint::new(
                ((ndc.x as f32 + 1.0) * 0.5) * view.screen_size.width,
                ((1.0 - ndc.y as f32) * 0.5) * view.screen_size.height,
            );

            state
                .text_render_state_mut()
                .check_start_fade_in(context.frame_number, time, disable_fading);
            if let Some(icon_state) = state.icon_render_state_mut(0) {
                icon_state.check_start_fade_in(context.frame_number, time, disable_fading);
            }
            context.draw_point(state, &element, screen, 1.0);
            stats.overlay_placed += 1;
        }
    }
}

fn record(stats: &mut PlacementStats, outcome: PlacementOutcome) {
    match outcome {
        PlacementOutcome::Placed => stats.placed += 1,
        PlacementOutcome::Rejected => stats.rejected += 1,
        PlacementOutcome::Pending => stats.pending += 1,
        PlacementOutcome::FadingOut => stats.fading_out += 1,
    }
}
