use std::{collections::HashMap, path::PathBuf, sync::Arc};

use parking_lot::Mutex;

use super::{FontStorage, GlyphInfo, GlyphLoad, GlyphService};
use crate::text_element::TextRenderStyle;

/// Font sizes are quantized so near-equal sizes share metrics.
const SIZE_QUANTIZE: f32 = 64.0;

/// Key of a cached glyph metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct GlyphKey {
    font_id: fontdb::ID,
    character: char,
    font_size: u32,
}

impl GlyphKey {
    fn new(font_id: fontdb::ID, character: char, font_size: f32) -> Self {
        Self {
            font_id,
            character,
            font_size: (font_size * SIZE_QUANTIZE).round() as u32,
        }
    }
}

enum PendingRequest {
    Initialize,
    Charset {
        text: String,
        style: TextRenderStyle,
    },
}

struct PendingLoad {
    request: PendingRequest,
    handle: GlyphLoad,
}

/// [`GlyphService`] backed by `fontdb` and `fontdue`.
///
/// Requests are queued and resolved by [`process_pending`](Self::process_pending),
/// which the host calls off the frame's critical path (idle callback, worker
/// thread holding an `Arc<FontGlyphService>`, ...). Internal state sits behind
/// `Mutex`es so a shared service can be driven from another thread.
pub struct FontGlyphService {
    font_storage: Mutex<FontStorage>,
    metrics: Mutex<HashMap<GlyphKey, GlyphInfo, fxhash::FxBuildHasher>>,
    queue: Mutex<Vec<PendingLoad>>,
    load_system_fonts: bool,
}

impl Default for FontGlyphService {
    fn default() -> Self {
        Self::new()
    }
}

impl FontGlyphService {
    /// Creates a service that only knows fonts added explicitly.
    pub fn new() -> Self {
        Self {
            font_storage: Mutex::new(FontStorage::new()),
            metrics: Mutex::new(HashMap::with_hasher(fxhash::FxBuildHasher::default())),
            queue: Mutex::new(Vec::new()),
            load_system_fonts: false,
        }
    }

    /// Creates a service whose initialization loads the system fonts.
    pub fn with_system_fonts() -> Self {
        Self {
            load_system_fonts: true,
            ..Self::new()
        }
    }

    pub fn load_font_binary(&self, data: impl Into<Vec<u8>>) {
        self.font_storage.lock().load_font_binary(data);
    }

    pub fn load_font_file(&self, path: PathBuf) -> Result<(), std::io::Error> {
        self.font_storage.lock().load_font_file(path)
    }

    pub fn load_fonts_dir(&self, dir: PathBuf) {
        self.font_storage.lock().load_fonts_dir(dir)
    }

    /// Number of requests waiting for [`process_pending`](Self::process_pending).
    pub fn pending_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn cached_glyph_count(&self) -> usize {
        self.metrics.lock().len()
    }

    /// Resolves every queued request. Returns how many were processed.
    pub fn process_pending(&self) -> usize {
        // take the queue first so new requests are not blocked meanwhile
        let pending = std::mem::take(&mut *self.queue.lock());
        let count = pending.len();

        for PendingLoad { request, handle } in pending {
            let success = match request {
                PendingRequest::Initialize => {
                    if self.load_system_fonts {
                        self.font_storage.lock().load_system_fonts();
                    }
                    log::debug!(
                        "Font catalog initialized with {} faces",
                        self.font_storage.lock().len()
                    );
                    true
                }
                PendingRequest::Charset { text, style } => self.load_charset_now(&text, &style),
            };
            handle.complete(success);
        }

        count
    }

    fn enqueue(&self, request: PendingRequest) -> GlyphLoad {
        let handle = GlyphLoad::pending();
        self.queue.lock().push(PendingLoad {
            request,
            handle: handle.clone(),
        });
        handle
    }

    fn is_charset_cached(&self, text: &str, style: &TextRenderStyle) -> bool {
        let Some(font_id) = self.font_storage.lock().resolve_family(&style.font_family) else {
            return false;
        };
        let metrics = self.metrics.lock();
        text.chars()
            .all(|ch| metrics.contains_key(&GlyphKey::new(font_id, ch, style.font_size)))
    }

    fn load_charset_now(&self, text: &str, style: &TextRenderStyle) -> bool {
        let Some((font_id, font)) = self.font_storage.lock().resolve(&style.font_family) else {
            log::debug!(
                "Glyph load for {text:?} failed: font family {:?} not available",
                style.font_family
            );
            return false;
        };

        let mut metrics = self.metrics.lock();
        for ch in text.chars() {
            let key = GlyphKey::new(font_id, ch, style.font_size);
            if metrics.contains_key(&key) {
                continue;
            }

            let glyph_index = font.lookup_glyph_index(ch);
            let glyph_metrics = font.metrics_indexed(glyph_index, style.font_size);
            metrics.insert(
                key,
                GlyphInfo {
                    character: ch,
                    glyph_index,
                    advance: glyph_metrics.advance_width,
                    x_min: glyph_metrics.xmin as f32,
                    y_min: glyph_metrics.ymin as f32,
                    width: glyph_metrics.width as f32,
                    height: glyph_metrics.height as f32,
                },
            );
        }
        true
    }
}

impl FontGlyphService {
    fn request_charset(&self, text: &str, style: &TextRenderStyle) -> GlyphLoad {
        if self.is_charset_cached(text, style) {
            return GlyphLoad::ready();
        }
        self.enqueue(PendingRequest::Charset {
            text: text.to_string(),
            style: style.clone(),
        })
    }

    /// Glyph run with kerning folded into the advances.
    fn glyph_run(&self, text: &str, style: &TextRenderStyle) -> Option<Arc<[GlyphInfo]>> {
        let (font_id, font) = self.font_storage.lock().resolve(&style.font_family)?;
        let metrics = self.metrics.lock();

        let mut glyphs: Vec<GlyphInfo> = Vec::with_capacity(text.len());
        for ch in text.chars() {
            let glyph = *metrics.get(&GlyphKey::new(font_id, ch, style.font_size))?;
            if let Some(previous) = glyphs.last_mut() {
                previous.advance += font
                    .horizontal_kern_indexed(previous.glyph_index, glyph.glyph_index, style.font_size)
                    .unwrap_or(0.0);
            }
            glyphs.push(glyph);
        }

        Some(glyphs.into())
    }
}

impl GlyphService for FontGlyphService {
    fn initialize(&mut self) -> GlyphLoad {
        self.enqueue(PendingRequest::Initialize)
    }

    fn load_charset(&mut self, text: &str, style: &TextRenderStyle) -> GlyphLoad {
        self.request_charset(text, style)
    }

    fn glyphs(&mut self, text: &str, style: &TextRenderStyle) -> Option<Arc<[GlyphInfo]>> {
        self.glyph_run(text, style)
    }

    fn is_loading(&self) -> bool {
        self.pending_len() > 0
    }
}

/// Lets the host keep a handle for [`FontGlyphService::process_pending`].
impl GlyphService for Arc<FontGlyphService> {
    fn initialize(&mut self) -> GlyphLoad {
        self.enqueue(PendingRequest::Initialize)
    }

    fn load_charset(&mut self, text: &str, style: &TextRenderStyle) -> GlyphLoad {
        self.request_charset(text, style)
    }

    fn glyphs(&mut self, text: &str, style: &TextRenderStyle) -> Option<Arc<[GlyphInfo]>> {
        self.glyph_run(text, style)
    }

    fn is_loading(&self) -> bool {
        self.pending_len() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyphs::LoadStatus;

    #[test]
    fn requests_wait_for_processing() {
        let mut service = FontGlyphService::new();
        let init = service.initialize();
        let charset = service.load_charset("Berlin", &TextRenderStyle::default());

        assert!(init.is_pending());
        assert!(service.is_loading());
        assert_eq!(service.pending_len(), 2);

        assert_eq!(service.process_pending(), 2);
        assert!(!service.is_loading());
        assert!(init.is_ready());
        // no faces in the catalog
        assert_eq!(charset.status(), LoadStatus::Failed);
        assert!(service.glyphs("Berlin", &TextRenderStyle::default()).is_none());
        assert_eq!(service.cached_glyph_count(), 0);
    }

    #[test]
    fn shared_handle_queues_on_the_same_service() {
        let service = Arc::new(FontGlyphService::new());
        let mut handle = Arc::clone(&service);
        let load = handle.load_charset("A", &TextRenderStyle::default());
        assert_eq!(service.pending_len(), 1);
        service.process_pending();
        assert!(!load.is_pending());
    }

    #[test]
    fn sizes_are_quantized() {
        let id = fontdb::ID::dummy();
        assert_eq!(GlyphKey::new(id, 'a', 16.0), GlyphKey::new(id, 'a', 16.001));
        assert_ne!(GlyphKey::new(id, 'a', 16.0), GlyphKey::new(id, 'a', 17.0));
    }
}
