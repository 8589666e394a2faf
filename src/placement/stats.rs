/// What happened during one [`place_text`](super::PlacementScheduler::place_text) call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlacementStats {
    pub frame_number: u64,
    /// The glyph service finished initializing; `false` means the frame was a no-op.
    pub initialized: bool,

    /// The update pass ran this frame.
    pub updated: bool,
    pub groups_updated: usize,
    /// The update pass stopped early under overload.
    pub update_interrupted: bool,
    pub suppressed_duplicates: usize,
    pub evicted: bool,
    pub overloaded: bool,

    /// The new-label pass ran this frame.
    pub new_pass: bool,
    /// Elements whose text or icon got (or kept) screen space.
    pub placed: usize,
    pub rejected: usize,
    /// Elements skipped while their glyphs load.
    pub pending: usize,
    /// Elements still drawn while fading out.
    pub fading_out: usize,
    pub overlay_placed: usize,
    pub blocking_boxes: usize,

    /// Placement stopped at `max_num_visible_labels`.
    pub label_budget_exceeded: bool,
    /// Placement stopped at the overload time budget.
    pub time_budget_exceeded: bool,
    /// Some fade is still running; the caller must keep rendering frames.
    pub animating: bool,
}
