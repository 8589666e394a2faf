//! Retained placement state of every group seen in recent frames.

use std::{collections::HashMap, sync::Arc};

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use slotmap::SlotMap;

use crate::{
    config::PlacementConfig,
    element_state::{ElementKey, TextElementState},
    geometry::world_distance_sq,
    group_state::TextElementGroupState,
    text_element::{GroupId, TextElementGroup},
};

/// Element states plus the duplicate index over them.
struct ElementStore {
    elements: SlotMap<ElementKey, TextElementState>,
    /// Label text to the point-label survivors of the current update pass.
    text_map: HashMap<String, Vec<ElementKey>, FxBuildHasher>,
    deduplicate: bool,
    dedup_distance_sq: f64,
    suppressed: usize,
}

impl ElementStore {
    fn apply_filter<F>(&mut self, key: ElementKey, filter: &mut F)
    where
        F: FnMut(&TextElementState) -> Option<f64>,
    {
        let Some(state) = self.elements.get(key) else {
            return;
        };
        let mut view_distance = filter(state);
        let needs_dedup = self.deduplicate && state.element().geometry.is_point() && state.element().has_text();

        if view_distance.is_some() && needs_dedup && !self.deduplicate_element(key) {
            log::trace!("Suppressing duplicate label {:?}", state_text(&self.elements, key));
            self.suppressed += 1;
            view_distance = None;
        }

        if let Some(state) = self.elements.get_mut(key) {
            state.update(view_distance);
        }
    }

    /// Enters an element that passed an earlier filter into the duplicate
    /// index, suppressing it if a twin already survives.
    fn register_survivor(&mut self, key: ElementKey) {
        let Some(state) = self.elements.get(key) else {
            return;
        };
        let element = state.element();
        if !self.deduplicate || !state.initialized() || !element.geometry.is_point() || !element.has_text() {
            return;
        }
        if !self.deduplicate_element(key) {
            log::trace!("Suppressing duplicate label {:?}", state_text(&self.elements, key));
            self.suppressed += 1;
            if let Some(state) = self.elements.get_mut(key) {
                state.update(None);
            }
        }
    }

    fn deduplicate_element(&mut self, key: ElementKey) -> bool {
        let Some(state) = self.elements.get(key) else {
            return false;
        };
        if !state.element().geometry.is_point() {
            return true;
        }

        let element = Arc::clone(state.element());
        let position = state.position();
        let visible = state.visible();

        let Some(candidates) = self.text_map.get_mut(element.text.as_str()) else {
            self.text_map.insert(element.text.clone(), vec![key]);
            return true;
        };

        // evicted states leave stale keys behind
        let elements = &mut self.elements;
        candidates.retain(|candidate| elements.contains_key(*candidate));

        if candidates.contains(&key) {
            return true;
        }

        for slot in candidates.iter_mut() {
            let Some(candidate) = elements.get_mut(*slot) else {
                continue;
            };
            if world_distance_sq(&candidate.position(), &position) > self.dedup_distance_sq {
                continue;
            }

            if !candidate.visible() && visible {
                // the new element takes over, the old one appears anew later
                candidate.reset();
                *slot = key;
                self.suppressed += 1;
                return true;
            }
            return false;
        }

        candidates.push(key);
        true
    }

    fn replace_element(&mut self, key: ElementKey) -> bool {
        let Some(state) = self.elements.get(key) else {
            return false;
        };
        if !state.element().geometry.is_point() || !state.visible() {
            return false;
        }

        let position = state.position();
        let Some(candidates) = self.text_map.get(state.element().text.as_str()) else {
            return false;
        };

        let replacement = candidates.iter().copied().find(|&candidate| {
            candidate != key
                && self.elements.get(candidate).is_some_and(|other| {
                    !other.visible() && world_distance_sq(&other.position(), &position) <= self.dedup_distance_sq
                })
        });

        let Some(replacement) = replacement else {
            return false;
        };
        let Some([successor, predecessor]) = self.elements.get_disjoint_mut([replacement, key]) else {
            return false;
        };
        successor.replace(predecessor);
        true
    }
}

fn state_text(elements: &SlotMap<ElementKey, TextElementState>, key: ElementKey) -> &str {
    elements.get(key).map_or("", |state| state.element().text.as_str())
}

/// Store of [`TextElementGroupState`]s keyed by group identity.
///
/// Groups stay cached while visited by the update pass or while any of their
/// elements is still visible. Element states live in an arena addressed by
/// [`ElementKey`].
pub struct TextElementStateCache {
    store: ElementStore,
    groups: IndexMap<GroupId, TextElementGroupState, FxBuildHasher>,
    sorted_groups: Vec<GroupId>,
    sorted_valid: bool,
    fade_time: f64,
}

impl TextElementStateCache {
    pub fn new(config: &PlacementConfig) -> Self {
        Self {
            store: ElementStore {
                elements: SlotMap::with_key(),
                text_map: HashMap::default(),
                deduplicate: config.deduplicate,
                dedup_distance_sq: config.dedup_distance_sq,
                suppressed: 0,
            },
            groups: IndexMap::default(),
            sorted_groups: Vec::new(),
            sorted_valid: true,
            fade_time: config.fade_time,
        }
    }

    /// Returns the cached state of `group`, creating it on a miss.
    ///
    /// `filter` yields the view distance of a placeable element or `None`.
    /// It runs for every element on both hit and miss, followed by duplicate
    /// suppression for point labels. The second value is `true` on a hit.
    pub fn get_or_set<F>(
        &mut self,
        group: &Arc<TextElementGroup>,
        mut filter: F,
    ) -> (&mut TextElementGroupState, bool)
    where
        F: FnMut(&TextElementState) -> Option<f64>,
    {
        if let Some(index) = self.groups.get_index_of(&group.id()) {
            let group_state = &mut self.groups[index];
            assert_eq!(
                group_state.len(),
                group.len(),
                "group state out of sync with its group"
            );

            for &key in group_state.element_keys() {
                self.store.apply_filter(key, &mut filter);
            }
            group_state.visited = true;
            return (group_state, true);
        }

        let mut keys = Vec::with_capacity(group.len());
        for element in group.elements() {
            let key = self
                .store
                .elements
                .insert(TextElementState::new(Arc::clone(element), self.fade_time));
            self.store.apply_filter(key, &mut filter);
            keys.push(key);
        }

        let (index, _) = self
            .groups
            .insert_full(group.id(), TextElementGroupState::new(Arc::clone(group), keys));
        self.sorted_valid = false;
        (&mut self.groups[index], false)
    }

    /// Ages every fade and evicts groups that are neither visited nor visible.
    ///
    /// With `find_replacements`, visible point labels of unvisited groups first
    /// hand their fade to an invisible twin registered in this update pass.
    /// Returns whether any group was evicted.
    pub fn update(&mut self, time: f64, clear_visited: bool, disable_fading: bool, find_replacements: bool) -> bool {
        let store = &mut self.store;
        let mut evicted = 0usize;

        self.groups.retain(|_, group_state| {
            let replace = find_replacements && !group_state.visited;
            let mut visible = false;

            for &key in group_state.element_keys() {
                if replace && store.replace_element(key) {
                    log::trace!("Label {:?} handed over its fade", state_text(&store.elements, key));
                }
                if let Some(state) = store.elements.get_mut(key) {
                    visible |= state.update_fading(time, disable_fading);
                }
            }

            if !group_state.visited && !visible {
                for &key in group_state.element_keys() {
                    store.elements.remove(key);
                }
                evicted += 1;
                return false;
            }

            if clear_visited {
                group_state.visited = false;
            }
            true
        });

        if evicted > 0 {
            log::debug!("Evicted {evicted} label groups, {} cached", self.groups.len());
            self.sorted_valid = false;
        }
        evicted > 0
    }

    /// Runs duplicate suppression for `key`. Returns whether it survives.
    pub fn deduplicate_element(&mut self, key: ElementKey) -> bool {
        self.store.deduplicate_element(key)
    }

    /// Hands the fade of the visible `key` to an invisible twin.
    pub fn replace_element(&mut self, key: ElementKey) -> bool {
        self.store.replace_element(key)
    }

    pub fn clear(&mut self) {
        self.store.elements.clear();
        self.store.text_map.clear();
        self.groups.clear();
        self.sorted_groups.clear();
        self.sorted_valid = true;
    }

    pub fn clear_visited(&mut self) {
        for group_state in self.groups.values_mut() {
            group_state.visited = false;
        }
    }

    /// Forgets the duplicate candidates; called before every update pass.
    pub fn clear_text_cache(&mut self) {
        self.store.text_map.clear();
        self.store.suppressed = 0;
    }

    /// Keeps `group_id` alive through the next eviction without re-running
    /// the filter. Elements that passed the last filter still take part in
    /// duplicate suppression of the current pass.
    pub fn mark_visited(&mut self, group_id: GroupId) -> bool {
        let Some(group_state) = self.groups.get_mut(&group_id) else {
            return false;
        };
        group_state.visited = true;
        for &key in group_state.element_keys() {
            self.store.register_survivor(key);
        }
        true
    }

    /// Group ids by descending priority; equal priorities keep insertion order.
    pub fn sorted_group_states(&mut self) -> &[GroupId] {
        if !self.sorted_valid {
            self.sorted_groups.clear();
            self.sorted_groups.extend(self.groups.keys().copied());
            let groups = &self.groups;
            self.sorted_groups
                .sort_by(|a, b| groups[b].priority().total_cmp(&groups[a].priority()));
            self.sorted_valid = true;
        }
        &self.sorted_groups
    }

    pub fn group_state(&self, group_id: GroupId) -> Option<&TextElementGroupState> {
        self.groups.get(&group_id)
    }

    pub fn group_states(&self) -> impl Iterator<Item = &TextElementGroupState> {
        self.groups.values()
    }

    pub fn element_state(&self, key: ElementKey) -> Option<&TextElementState> {
        self.store.elements.get(key)
    }

    pub fn element_state_mut(&mut self, key: ElementKey) -> Option<&mut TextElementState> {
        self.store.elements.get_mut(key)
    }

    /// Number of cached groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn element_count(&self) -> usize {
        self.store.elements.len()
    }

    /// Point labels suppressed as duplicates in the current update pass.
    pub fn suppressed_duplicates(&self) -> usize {
        self.store.suppressed
    }

    /// Whether any cached element is mid-fade.
    pub fn is_animating(&self) -> bool {
        self.store.elements.values().any(TextElementState::is_fading)
    }
}
