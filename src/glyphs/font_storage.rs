use std::{collections::HashMap, path::PathBuf, sync::Arc};

/// Font catalog backing [`FontGlyphService`](super::FontGlyphService).
///
/// `fontdb` keeps the set of known faces; `fontdue` fonts are parsed lazily the
/// first time a face is resolved. Family lookups are memoized by name since
/// every label style carries its family as a string.
pub struct FontStorage {
    font_db: fontdb::Database,
    loaded_font: HashMap<fontdb::ID, Arc<fontdue::Font>, fxhash::FxBuildHasher>,
    /// `None` records a family that has no matching face.
    resolved_family: HashMap<String, Option<fontdb::ID>, fxhash::FxBuildHasher>,
}

impl Default for FontStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl FontStorage {
    pub fn new() -> Self {
        Self {
            font_db: fontdb::Database::new(),
            loaded_font: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
            resolved_family: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
        }
    }
}

/// Loading fonts. Every load invalidates the memoized family lookups.
impl FontStorage {
    pub fn load_font_binary(&mut self, data: impl Into<Vec<u8>>) {
        self.font_db.load_font_data(data.into());
        self.resolved_family.clear();
    }

    pub fn load_font_file(&mut self, path: PathBuf) -> Result<(), std::io::Error> {
        self.font_db.load_font_file(path)?;
        self.resolved_family.clear();
        Ok(())
    }

    pub fn load_fonts_dir(&mut self, dir: PathBuf) {
        self.font_db.load_fonts_dir(dir);
        self.resolved_family.clear();
    }

    pub fn load_system_fonts(&mut self) {
        self.font_db.load_system_fonts();
        self.resolved_family.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.font_db.is_empty()
    }

    pub fn len(&self) -> usize {
        self.font_db.len()
    }
}

/// Resolving styles to fonts.
impl FontStorage {
    /// Maps a CSS-like family name to a face, generic names included.
    pub fn resolve_family(&mut self, family: &str) -> Option<fontdb::ID> {
        if let Some(resolved) = self.resolved_family.get(family) {
            return *resolved;
        }

        let query_family = match family {
            "serif" => fontdb::Family::Serif,
            "sans-serif" => fontdb::Family::SansSerif,
            "monospace" => fontdb::Family::Monospace,
            "cursive" => fontdb::Family::Cursive,
            "fantasy" => fontdb::Family::Fantasy,
            name => fontdb::Family::Name(name),
        };
        let families = [query_family];
        let id = self.font_db.query(&fontdb::Query {
            families: &families,
            ..Default::default()
        });

        if id.is_none() {
            log::debug!("No face matches font family {family:?}");
        }
        self.resolved_family.insert(family.to_string(), id);
        id
    }

    /// Retrieves a parsed font by ID, parsing it on first use.
    pub fn font(&mut self, id: fontdb::ID) -> Option<Arc<fontdue::Font>> {
        use std::collections::hash_map::Entry;

        match self.loaded_font.entry(id) {
            Entry::Occupied(entry) => Some(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let font_result = self.font_db.with_face_data(id, |data, index| {
                    fontdue::Font::from_bytes(
                        data,
                        fontdue::FontSettings {
                            collection_index: index,
                            scale: 40.0,
                            load_substitutions: true,
                        },
                    )
                })?;

                match font_result {
                    Ok(font) => {
                        let r: &mut Arc<fontdue::Font> = entry.insert(Arc::new(font));
                        Some(Arc::clone(r))
                    }
                    Err(e) => {
                        log::error!("Failed to load font (id: {:?}): {}", id, e);
                        None
                    }
                }
            }
        }
    }

    /// Resolves `family` and parses its font in one step.
    pub fn resolve(&mut self, family: &str) -> Option<(fontdb::ID, Arc<fontdue::Font>)> {
        let id = self.resolve_family(family)?;
        self.font(id).map(|font| (id, font))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_storage_resolves_nothing() {
        let mut storage = FontStorage::new();
        assert!(storage.is_empty());
        assert_eq!(storage.resolve_family("sans-serif"), None);
        assert!(storage.resolve("Noto Sans").is_none());
        // memoized miss
        assert_eq!(storage.resolved_family.get("sans-serif"), Some(&None));
    }

    #[test]
    fn loading_fonts_forgets_memoized_lookups() {
        let mut storage = FontStorage::new();
        storage.resolve_family("serif");
        assert!(!storage.resolved_family.is_empty());
        // garbage data is ignored by fontdb but still clears the lookups
        storage.load_font_binary(vec![0u8; 4]);
        assert!(storage.resolved_family.is_empty());
    }
}
