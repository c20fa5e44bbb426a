//! Template asset store keyed by string identifiers

use crate::error::{NavError, NavResult};
use image::GrayImage;
use std::collections::HashMap;
use std::path::Path;

/// Named store of template images, resolved by string id (file stem),
/// e.g. `"plus"`, `"mm_tp_03"`.
#[derive(Debug, Default)]
pub struct TemplateStore {
    templates: HashMap<String, GrayImage>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every PNG in `directory`, keyed by file stem.
    ///
    /// An unreadable directory is fatal; an individual undecodable file is
    /// skipped with a warning.
    pub fn load_from_dir(directory: &Path) -> NavResult<Self> {
        let entries =
            std::fs::read_dir(directory).map_err(|e| NavError::TemplateStoreUnreadable {
                path: directory.to_path_buf(),
                description: e.to_string(),
            })?;

        let mut store = Self::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("png") || !path.is_file() {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
                continue;
            };
            match image::open(&path) {
                Ok(img) => {
                    store.insert(id, img.to_luma8());
                }
                Err(e) => {
                    log::warn!("Skipping undecodable template {}: {}", path.display(), e);
                }
            }
        }
        log::info!(
            "TemplateStore loaded {} templates from {}",
            store.len(),
            directory.display()
        );
        Ok(store)
    }

    pub fn insert(&mut self, id: String, template: GrayImage) {
        self.templates.insert(id, template);
    }

    /// A missing id is a fatal asset error, not a retryable miss.
    pub fn get(&self, id: &str) -> NavResult<&GrayImage> {
        self.templates
            .get(id)
            .ok_or_else(|| NavError::TemplateNotFound { id: id.to_string() })
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
