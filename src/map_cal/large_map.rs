//! Large reference map analysis and the per-region cache

use super::image_utils;
use crate::error::{NavError, NavResult};
use crate::world::{Region, RegionKey};
use image::{GrayImage, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Decoded reference map for one region+floor with precomputed masks.
/// Cached across many localization calls.
#[derive(Debug)]
pub struct LargeMapInfo {
    pub key: RegionKey,
    pub raw: RgbImage,
    pub gray: GrayImage,
    pub road_mask: GrayImage,
}

impl LargeMapInfo {
    pub fn analyse(key: RegionKey, raw: RgbImage) -> Self {
        let gray = image::DynamicImage::ImageRgb8(raw.clone()).to_luma8();
        let road_mask = image_utils::road_mask(&raw);
        Self {
            key,
            raw,
            gray,
            road_mask,
        }
    }
}

/// Process-wide cache of analysed large maps, keyed by region identity.
///
/// Explicit object passed by reference rather than ambient global state.
/// Writes happen once per key under the lock; recomputing a key is
/// idempotent, so lock-on-first-access is sufficient.
#[derive(Debug, Default)]
pub struct LargeMapCache {
    entries: Mutex<HashMap<RegionKey, Arc<LargeMapInfo>>>,
    builds: AtomicUsize,
}

impl LargeMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached analysis for `region`, computing it on first
    /// access from the image `load` supplies.
    pub fn get_or_analyse(
        &self,
        region: &Region,
        load: impl FnOnce() -> NavResult<RgbImage>,
    ) -> NavResult<Arc<LargeMapInfo>> {
        let key = region.key();
        let mut entries = self.entries.lock().expect("large map cache poisoned");
        if let Some(info) = entries.get(&key) {
            return Ok(Arc::clone(info));
        }
        log::info!("Analysing large map for region {key}");
        let info = Arc::new(LargeMapInfo::analyse(key.clone(), load()?));
        self.builds.fetch_add(1, Ordering::Relaxed);
        entries.insert(key, Arc::clone(&info));
        Ok(info)
    }

    /// Drop one cached entry, forcing a rebuild on next access. Used when
    /// the underlying map asset changes.
    pub fn invalidate(&self, key: &RegionKey) {
        let mut entries = self.entries.lock().expect("large map cache poisoned");
        if entries.remove(key).is_some() {
            log::info!("Invalidated cached large map for region {key}");
        }
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .expect("large map cache poisoned")
            .clear();
    }

    /// Number of analyses performed (not lookups).
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}

/// Resolves large-map image files on disk, addressed by the region's
/// stable asset id (`<planet>-<region>[-l<n>|-b<n>].png`).
#[derive(Debug, Clone)]
pub struct MapAssets {
    root: PathBuf,
}

impl MapAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn large_map_path(&self, region: &Region) -> PathBuf {
        self.root.join(format!("{}.png", region.asset_id()))
    }

    pub fn load_large_map(&self, region: &Region) -> NavResult<RgbImage> {
        let path = self.large_map_path(region);
        if !Path::new(&path).exists() {
            return Err(NavError::MapAssetMissing {
                key: region.key().to_string(),
                path,
            });
        }
        let img = image::open(&path).map_err(|source| NavError::ImageDecodeFailed {
            path: path.clone(),
            source,
        })?;
        Ok(img.to_rgb8())
    }
}
