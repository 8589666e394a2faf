use crate::{config::DEFAULT_FADE_TIME, geometry::smoothstep};

/// Fade phase of one visual element.
///
/// Phases are cyclic: `Invisible → FadingIn → Visible → FadingOut → Invisible`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FadeState {
    #[default]
    Invisible,
    FadingIn,
    Visible,
    FadingOut,
}

/// Fade timer and opacity of one text or icon instance.
///
/// Opacity is a function of the time elapsed since the current transition
/// began. A transition that is reversed midway keeps its current opacity: the
/// new transition gets a virtual start time in the past.
///
/// Times are in milliseconds.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderState {
    state: FadeState,
    fade_time: f64,
    start_time: f64,
    /// Linear progress of the current transition, `[0, 1]`.
    progress: f64,
    opacity: f32,
    last_frame_number: u64,
    started: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self::new(DEFAULT_FADE_TIME)
    }
}

impl RenderState {
    pub fn new(fade_time: f64) -> Self {
        Self {
            state: FadeState::Invisible,
            fade_time: fade_time.max(0.0),
            start_time: 0.0,
            progress: 0.0,
            opacity: 0.0,
            last_frame_number: 0,
            started: false,
        }
    }

    /// Returns to the initial, never-faded state.
    pub fn reset(&mut self) {
        *self = Self::new(self.fade_time);
    }

    pub fn state(&self) -> FadeState {
        self.state
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn fade_time(&self) -> f64 {
        self.fade_time
    }

    /// Frame number of the last transition start.
    pub fn last_frame_number(&self) -> u64 {
        self.last_frame_number
    }

    /// `true` until the first transition after creation or [`reset`](Self::reset).
    pub fn is_undefined(&self) -> bool {
        !self.started && self.state == FadeState::Invisible
    }

    pub fn is_fading_in(&self) -> bool {
        self.state == FadeState::FadingIn
    }

    pub fn is_fading_out(&self) -> bool {
        self.state == FadeState::FadingOut
    }

    pub fn is_fading(&self) -> bool {
        self.is_fading_in() || self.is_fading_out()
    }

    /// `true` once a fade-out has completed.
    pub fn is_faded_out(&self) -> bool {
        self.started && self.state == FadeState::Invisible
    }

    /// Anything but `Invisible`; a fading-out element is still drawn.
    pub fn is_visible(&self) -> bool {
        self.state != FadeState::Invisible
    }

    /// How far towards fully visible the element is, as linear progress.
    fn visibility_level(&self) -> f64 {
        match self.state {
            FadeState::Invisible => 0.0,
            FadeState::FadingIn => self.progress,
            FadeState::Visible => 1.0,
            FadeState::FadingOut => 1.0 - self.progress,
        }
    }

    /// Enters `FadingIn` unconditionally.
    pub fn start_fade_in(&mut self, frame_number: u64, time: f64, disable_fading: bool) {
        let level = self.visibility_level();
        self.start_time = time - level * self.fade_time;
        self.begin(FadeState::FadingIn, frame_number, time, disable_fading);
    }

    /// Enters `FadingOut` unconditionally.
    pub fn start_fade_out(&mut self, frame_number: u64, time: f64, disable_fading: bool) {
        let level = self.visibility_level();
        self.start_time = time - (1.0 - level) * self.fade_time;
        self.begin(FadeState::FadingOut, frame_number, time, disable_fading);
    }

    /// Starts a fade-in unless already fading in or visible.
    ///
    /// Returns whether a new transition began.
    pub fn check_start_fade_in(&mut self, frame_number: u64, time: f64, disable_fading: bool) -> bool {
        if matches!(self.state, FadeState::FadingIn | FadeState::Visible) {
            return false;
        }
        self.start_fade_in(frame_number, time, disable_fading);
        true
    }

    /// Starts a fade-out unless already fading out or invisible.
    ///
    /// Returns whether a new transition began.
    pub fn check_start_fade_out(&mut self, frame_number: u64, time: f64, disable_fading: bool) -> bool {
        if matches!(self.state, FadeState::FadingOut | FadeState::Invisible) {
            return false;
        }
        self.start_fade_out(frame_number, time, disable_fading);
        true
    }

    /// Advances a running transition to `time`. Returns [`is_visible`](Self::is_visible).
    pub fn update_fading(&mut self, time: f64, disable_fading: bool) -> bool {
        if !self.is_fading() {
            return self.is_visible();
        }

        let elapsed = time - self.start_time;
        if disable_fading || self.fade_time <= 0.0 || elapsed >= self.fade_time {
            self.finish();
        } else {
            self.progress = (elapsed / self.fade_time).clamp(0.0, 1.0);
            let eased = smoothstep(0.0, 1.0, self.progress);
            let value = if self.is_fading_in() { eased } else { 1.0 - eased };
            self.opacity = value.clamp(0.0, 1.0) as f32;
        }

        self.is_visible()
    }

    fn begin(&mut self, state: FadeState, frame_number: u64, time: f64, disable_fading: bool) {
        self.state = state;
        self.started = true;
        self.last_frame_number = self.last_frame_number.max(frame_number);
        self.update_fading(time, disable_fading);
    }

    fn finish(&mut self) {
        self.progress = 0.0;
        match self.state {
            FadeState::FadingIn => {
                self.state = FadeState::Visible;
                self.opacity = 1.0;
            }
            FadeState::FadingOut => {
                self.state = FadeState::Invisible;
                self.opacity = 0.0;
            }
            FadeState::Invisible | FadeState::Visible => {}
        }
    }
}
