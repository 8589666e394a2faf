use std::sync::Arc;

use crate::{
    element_state::ElementKey,
    text_element::{GroupId, TextElementGroup},
};

/// Cached placement state of one [`TextElementGroup`].
///
/// Holds one [`ElementKey`] per group element, in group order.
#[derive(Debug)]
pub struct TextElementGroupState {
    group: Arc<TextElementGroup>,
    element_keys: Vec<ElementKey>,
    /// Still referenced by a rendered tile in the current update cycle.
    pub(crate) visited: bool,
}

impl TextElementGroupState {
    pub(crate) fn new(group: Arc<TextElementGroup>, element_keys: Vec<ElementKey>) -> Self {
        debug_assert_eq!(group.len(), element_keys.len());
        Self {
            group,
            element_keys,
            visited: true,
        }
    }

    pub fn group(&self) -> &Arc<TextElementGroup> {
        &self.group
    }

    pub fn group_id(&self) -> GroupId {
        self.group.id()
    }

    pub fn priority(&self) -> f32 {
        self.group.priority()
    }

    pub fn element_keys(&self) -> &[ElementKey] {
        &self.element_keys
    }

    pub fn len(&self) -> usize {
        self.element_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.element_keys.is_empty()
    }

    pub fn visited(&self) -> bool {
        self.visited
    }
}
