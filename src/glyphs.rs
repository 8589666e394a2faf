//! Glyph loading seam between the placement engine and a font backend.
//!
//! Loading is asynchronous from the scheduler's point of view: a request
//! returns a [`GlyphLoad`] handle that is polled at the start of later frames.
//! Completion may happen on any thread; callbacks registered on the handle
//! must only set flags.

mod font_service;
mod font_storage;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::text_element::TextRenderStyle;

pub use font_service::FontGlyphService;
pub use font_storage::FontStorage;

/// Metrics of one character, in pixels at the requested font size.
///
/// `y_min` is measured from the baseline upwards, like `fontdue` reports it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphInfo {
    pub character: char,
    pub glyph_index: u16,
    /// Horizontal advance, kerning with the next glyph included.
    pub advance: f32,
    pub x_min: f32,
    pub y_min: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadStatus {
    Pending,
    Ready,
    Failed,
}

type CompletionCallback = Box<dyn FnOnce(LoadStatus) + Send>;

struct LoadInner {
    status: LoadStatus,
    callbacks: Vec<CompletionCallback>,
}

/// Shared completion handle of a glyph load request.
#[derive(Clone)]
pub struct GlyphLoad {
    inner: Arc<Mutex<LoadInner>>,
}

impl std::fmt::Debug for GlyphLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphLoad")
            .field("status", &self.status())
            .finish()
    }
}

impl GlyphLoad {
    fn with_status(status: LoadStatus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LoadInner {
                status,
                callbacks: Vec::new(),
            })),
        }
    }

    pub fn pending() -> Self {
        Self::with_status(LoadStatus::Pending)
    }

    /// A load that has already completed.
    pub fn ready() -> Self {
        Self::with_status(LoadStatus::Ready)
    }

    pub fn failed() -> Self {
        Self::with_status(LoadStatus::Failed)
    }

    pub fn status(&self) -> LoadStatus {
        self.inner.lock().status
    }

    pub fn is_pending(&self) -> bool {
        self.status() == LoadStatus::Pending
    }

    pub fn is_ready(&self) -> bool {
        self.status() == LoadStatus::Ready
    }

    /// Resolves the load and runs the registered callbacks.
    ///
    /// Completing an already resolved load does nothing.
    pub fn complete(&self, success: bool) {
        let status = if success {
            LoadStatus::Ready
        } else {
            LoadStatus::Failed
        };

        let callbacks = {
            let mut inner = self.inner.lock();
            if inner.status != LoadStatus::Pending {
                return;
            }
            inner.status = status;
            std::mem::take(&mut inner.callbacks)
        };

        // callbacks run without the lock held
        for callback in callbacks {
            callback(status);
        }
    }

    /// Registers `f` to run on completion, or runs it now if already resolved.
    pub fn on_complete(&self, f: impl FnOnce(LoadStatus) + Send + 'static) {
        let status = {
            let mut inner = self.inner.lock();
            if inner.status == LoadStatus::Pending {
                inner.callbacks.push(Box::new(f));
                return;
            }
            inner.status
        };
        f(status);
    }
}

/// Font catalog and glyph metrics provider.
pub trait GlyphService {
    /// One-time setup (font catalog). Requested lazily by the scheduler.
    fn initialize(&mut self) -> GlyphLoad;

    /// Requests the glyphs needed to render `text` with `style`.
    fn load_charset(&mut self, text: &str, style: &TextRenderStyle) -> GlyphLoad;

    /// Glyph run for `text`, or `None` if some glyph is not loaded.
    fn glyphs(&mut self, text: &str, style: &TextRenderStyle) -> Option<Arc<[GlyphInfo]>>;

    /// Whether any request is still outstanding.
    fn is_loading(&self) -> bool;
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn callbacks_run_once_on_completion() {
        let load = GlyphLoad::pending();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        load.on_complete(move |status| {
            assert_eq!(status, LoadStatus::Ready);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        load.complete(true);
        load.complete(false);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(load.is_ready());
    }

    #[test]
    fn late_callback_runs_immediately() {
        let load = GlyphLoad::failed();
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        load.on_complete(move |status| *slot.lock() = Some(status));
        assert_eq!(*seen.lock(), Some(LoadStatus::Failed));
    }

    #[test]
    fn clones_share_completion() {
        let load = GlyphLoad::pending();
        let other = load.clone();
        other.complete(true);
        assert!(load.is_ready());
        assert!(!load.is_pending());
    }
}
