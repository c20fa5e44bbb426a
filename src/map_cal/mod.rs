//! Map calculation: fusing minimap analysis against cached large maps
//! to recover the avatar's position.

pub mod image_utils;
pub mod large_map;
pub mod mini_map;

pub use large_map::{LargeMapCache, LargeMapInfo, MapAssets};
pub use mini_map::{Circle, MiniMapInfo};

use crate::error::NavResult;
use crate::match_image::{ImageMatcher, MatchResult, Rect};
use crate::world::Region;
use image::{GrayImage, RgbImage};
use serde::Serialize;
use std::sync::Arc;

/// Minimum refined correlation for a pose to count as found.
const CHAR_POS_THRESHOLD: f32 = 0.6;
/// Correlation floor for coarse full-map candidates.
const COARSE_THRESHOLD: f32 = 0.25;
/// Downscale factor of the coarse full-map pass.
const COARSE_SCALE: u32 = 8;
/// Full-resolution refinement window half-width around a coarse candidate.
const REFINE_MARGIN: u32 = 12;
/// Coarse candidates refined at full resolution.
const MAX_COARSE_CANDIDATES: usize = 4;
/// Search margin when the caller supplies a prior without a radius.
const DEFAULT_PRIOR_MARGIN: u32 = 25;
/// Indicator circles farther than this from the minimap center disagree
/// with the template match and degrade confidence.
const INDICATOR_TOLERANCE: u32 = 10;

/// Fused localization output for one frame.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PosEstimate {
    /// Avatar coordinate on the large map.
    pub x: u32,
    pub y: u32,
    pub confidence: f32,
    /// Heading in degrees, absent when no indicator was readable.
    pub angle: Option<f32>,
}

/// Analyses large maps (cached) and minimap captures, and fuses the two
/// into character pose estimates.
pub struct MapCalculator {
    im: ImageMatcher,
    cache: Arc<LargeMapCache>,
    assets: MapAssets,
}

impl MapCalculator {
    pub fn new(cache: Arc<LargeMapCache>, assets: MapAssets) -> Self {
        Self {
            im: ImageMatcher::new(),
            cache,
            assets,
        }
    }

    /// Crop the fixed minimap region out of a full screenshot.
    pub fn cut_mini_map(&self, screen: &RgbImage) -> NavResult<RgbImage> {
        mini_map::cut_mini_map(screen)
    }

    /// Analyse one minimap capture into masks and indicator detection.
    pub fn analyse_mini_map(&self, raw: RgbImage) -> MiniMapInfo {
        mini_map::analyse_mini_map(raw)
    }

    /// Cached analysis of the region's large reference map. Idempotent:
    /// repeated calls with the same region key hit the cache.
    pub fn analyse_large_map(&self, region: &Region) -> NavResult<Arc<LargeMapInfo>> {
        self.cache
            .get_or_analyse(region, || self.assets.load_large_map(region))
    }

    /// Locate the avatar on the large map for the current frame.
    ///
    /// With a prior (`possible_pos` as `(x, y, radius)`) the search is
    /// restricted to a neighborhood before falling back to the full map,
    /// which bounds cost and prefers spatial continuity over repeated
    /// visual motifs. Returns `None` when nothing clears the confidence
    /// threshold; localization absence is expected and retryable.
    pub fn cal_character_pos(
        &self,
        lm: &LargeMapInfo,
        mm: &MiniMapInfo,
        possible_pos: Option<(u32, u32, u32)>,
    ) -> NavResult<Option<PosEstimate>> {
        let (tw, th) = mm.road_mask.dimensions();
        if tw > lm.road_mask.width() || th > lm.road_mask.height() {
            return Ok(None);
        }

        let mut best: Option<MatchResult> = None;
        if let Some((px, py, pr)) = possible_pos {
            let margin = if pr == 0 { DEFAULT_PRIOR_MARGIN } else { pr };
            let origin_x = px as i64 - (tw / 2) as i64;
            let origin_y = py as i64 - (th / 2) as i64;
            let window = clamp_window(origin_x, origin_y, tw, th, margin, &lm.road_mask);
            best = self.match_in_window(lm, mm, &window)?;
            if best.is_none() {
                log::debug!(
                    "no match near prior ({px}, {py}), falling back to full-map search"
                );
            }
        }
        if best.is_none() {
            best = self.full_map_search(lm, mm)?;
        }

        let Some(best) = best else {
            log::debug!("cal_character_pos: no estimate this frame");
            return Ok(None);
        };

        let mut confidence = best.confidence.min(1.0);
        let (ax, ay) = (best.x + tw / 2, best.y + th / 2);

        // Fusion rule: the template match fixes the location; the indicator
        // circle only confirms it. A marker drifting off the minimap center
        // beyond tolerance is logged and degrades confidence, it never
        // overrides the match.
        if let Some(ind) = mm.indicator {
            let dx = ind.cx as i64 - (tw / 2) as i64;
            let dy = ind.cy as i64 - (th / 2) as i64;
            let deviation = ((dx * dx + dy * dy) as f64).sqrt();
            if deviation > INDICATOR_TOLERANCE as f64 {
                log::warn!(
                    "position indicator at ({}, {}) deviates {:.1}px from minimap center",
                    ind.cx,
                    ind.cy,
                    deviation
                );
                confidence *= 0.8;
            }
        }

        log::info!(
            "character at ({ax}, {ay}) on {} confidence {confidence:.3}",
            lm.key
        );
        Ok(Some(PosEstimate {
            x: ax,
            y: ay,
            confidence,
            angle: mm.indicator_angle,
        }))
    }

    /// Masked road-mask match restricted to a window of the large map.
    fn match_in_window(
        &self,
        lm: &LargeMapInfo,
        mm: &MiniMapInfo,
        window: &Rect,
    ) -> NavResult<Option<MatchResult>> {
        let source = image::imageops::crop_imm(
            &lm.road_mask,
            window.x,
            window.y,
            window.w,
            window.h,
        )
        .to_image();
        let results = self.im.match_template(
            &source,
            &mm.road_mask,
            CHAR_POS_THRESHOLD,
            Some(&mm.view_mask),
            true,
        )?;
        Ok(results.max().map(|r| {
            MatchResult::new(r.confidence, r.x + window.x, r.y + window.y, r.w, r.h)
        }))
    }

    /// Coarse-to-fine search over the whole map: match downscaled road
    /// masks, then refine the strongest well-separated candidates at full
    /// resolution and keep the best refined hit.
    fn full_map_search(
        &self,
        lm: &LargeMapInfo,
        mm: &MiniMapInfo,
    ) -> NavResult<Option<MatchResult>> {
        let (tw, th) = mm.road_mask.dimensions();
        let coarse_src = downscale(&lm.road_mask, COARSE_SCALE);
        let coarse_tpl = downscale(&mm.road_mask, COARSE_SCALE);
        if coarse_tpl.width() > coarse_src.width() || coarse_tpl.height() > coarse_src.height() {
            return Ok(None);
        }

        let coarse = self
            .im
            .match_template(&coarse_src, &coarse_tpl, COARSE_THRESHOLD, None, true)?;

        // Strongest candidates, separated by at least half a template.
        let mut hits: Vec<&MatchResult> = coarse.iter().collect();
        hits.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let min_sep = (coarse_tpl.width().max(coarse_tpl.height()) / 2).max(1) as i64;
        let mut candidates: Vec<(u32, u32)> = Vec::new();
        for hit in hits {
            if candidates.len() >= MAX_COARSE_CANDIDATES {
                break;
            }
            let separated = candidates.iter().all(|&(cx, cy)| {
                (hit.x as i64 - cx as i64).abs() >= min_sep
                    || (hit.y as i64 - cy as i64).abs() >= min_sep
            });
            if separated {
                candidates.push((hit.x, hit.y));
            }
        }
        log::debug!("full_map_search: refining {} coarse candidates", candidates.len());

        let mut best: Option<MatchResult> = None;
        for (cx, cy) in candidates {
            let origin_x = (cx * COARSE_SCALE) as i64;
            let origin_y = (cy * COARSE_SCALE) as i64;
            let window = clamp_window(origin_x, origin_y, tw, th, REFINE_MARGIN, &lm.road_mask);
            if let Some(refined) = self.match_in_window(lm, mm, &window)? {
                let better = best
                    .map(|b| refined.confidence > b.confidence)
                    .unwrap_or(true);
                if better {
                    best = Some(refined);
                }
            }
        }
        Ok(best)
    }
}

/// Window of `template + margin` around an (possibly out-of-bounds) origin,
/// clamped to the source image.
fn clamp_window(
    origin_x: i64,
    origin_y: i64,
    tw: u32,
    th: u32,
    margin: u32,
    source: &GrayImage,
) -> Rect {
    let (sw, sh) = source.dimensions();
    let x0 = (origin_x - margin as i64).clamp(0, sw as i64) as u32;
    let y0 = (origin_y - margin as i64).clamp(0, sh as i64) as u32;
    let x1 = (origin_x + (tw + margin) as i64).clamp(0, sw as i64) as u32;
    let y1 = (origin_y + (th + margin) as i64).clamp(0, sh as i64) as u32;
    Rect::new(x0, y0, x1 - x0, y1 - y0)
}

fn downscale(img: &GrayImage, factor: u32) -> GrayImage {
    image::imageops::resize(
        img,
        (img.width() / factor).max(1),
        (img.height() / factor).max(1),
        image::imageops::FilterType::Triangle,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::RegionKey;
    use image::{Luma, Rgb};

    const ROAD: Rgb<u8> = Rgb([60, 60, 60]);
    const GROUND: Rgb<u8> = Rgb([200, 200, 200]);

    /// Aperiodic corridor map: straight roads with distinct widths so every
    /// window is globally unique.
    fn corridor_map(width: u32, height: u32) -> RgbImage {
        let verticals: &[(u32, u32)] = &[(120, 8), (410, 16), (950, 12), (1480, 20), (1730, 10)];
        let horizontals: &[(u32, u32)] = &[(90, 14), (630, 12), (1060, 18), (1540, 8)];
        RgbImage::from_fn(width, height, |x, y| {
            let on_v = verticals.iter().any(|&(pos, w)| x >= pos && x < pos + w);
            let on_h = horizontals.iter().any(|&(pos, w)| y >= pos && y < pos + w);
            if on_v || on_h { ROAD } else { GROUND }
        })
    }

    fn lm_key() -> RegionKey {
        RegionKey {
            planet_id: "hs".to_string(),
            region_id: "srcd".to_string(),
            level: 0,
        }
    }

    fn calculator() -> MapCalculator {
        MapCalculator::new(Arc::new(LargeMapCache::new()), MapAssets::new("assets/maps"))
    }

    fn crop_rgb(img: &RgbImage, x: u32, y: u32, w: u32, h: u32) -> RgbImage {
        image::imageops::crop_imm(img, x, y, w, h).to_image()
    }

    #[test]
    fn exact_crop_with_prior_is_pixel_accurate() {
        let map = corridor_map(600, 600);
        let lm = LargeMapInfo::analyse(lm_key(), map.clone());
        let mc = calculator();

        // Minimap taken at crop origin (260, 20); avatar at crop center.
        let mm = mc.analyse_mini_map(crop_rgb(&map, 260, 20, 200, 200));
        let prior = (360, 120, 10);
        let est = mc
            .cal_character_pos(&lm, &mm, Some(prior))
            .unwrap()
            .expect("exact crop must localize");

        assert!(est.confidence >= 0.99, "confidence {}", est.confidence);
        assert!(est.x.abs_diff(360) <= 1, "x={}", est.x);
        assert!(est.y.abs_diff(120) <= 1, "y={}", est.y);
    }

    #[test]
    fn full_map_scenario_without_prior() {
        let map = corridor_map(2000, 2000);
        let lm = LargeMapInfo::analyse(lm_key(), map.clone());
        let mc = calculator();

        // 200x200 minimap taken at true offset (800, 600).
        let mm = mc.analyse_mini_map(crop_rgb(&map, 800, 600, 200, 200));
        let est = mc
            .cal_character_pos(&lm, &mm, None)
            .unwrap()
            .expect("full-map search must localize");

        assert!(est.confidence >= 0.9, "confidence {}", est.confidence);
        assert!(est.x.abs_diff(900) <= 3, "x={}", est.x);
        assert!(est.y.abs_diff(700) <= 3, "y={}", est.y);
    }

    #[test]
    fn unrelated_minimap_returns_no_estimate() {
        let map = corridor_map(600, 600);
        let lm = LargeMapInfo::analyse(lm_key(), map);
        let mc = calculator();

        // Random road-noise minimap resembling no region of the map.
        let road_mask = GrayImage::from_fn(200, 200, |x, y| {
            let h = x
                .wrapping_mul(2654435761)
                .wrapping_add(y.wrapping_mul(40503))
                .rotate_left(13);
            if h % 2 == 0 { Luma([255]) } else { Luma([0]) }
        });
        let view_mask = image_utils::mask_outside_circle(
            &GrayImage::from_pixel(200, 200, Luma([255])),
            100,
            100,
            100,
        );
        let mm = MiniMapInfo {
            raw: RgbImage::new(200, 200),
            gray: road_mask.clone(),
            view_mask: view_mask.clone(),
            edge_mask: view_mask,
            road_mask,
            indicator: None,
            indicator_angle: None,
        };

        let est = mc.cal_character_pos(&lm, &mm, None).unwrap();
        assert!(est.is_none());
    }

    #[test]
    fn disagreeing_indicator_degrades_confidence_only() {
        let map = corridor_map(600, 600);
        let lm = LargeMapInfo::analyse(lm_key(), map.clone());
        let mc = calculator();

        let mut mm = mc.analyse_mini_map(crop_rgb(&map, 260, 20, 200, 200));
        mm.indicator = Some(Circle {
            cx: 130,
            cy: 100,
            r: 8,
        });

        let est = mc
            .cal_character_pos(&lm, &mm, Some((360, 120, 10)))
            .unwrap()
            .expect("estimate must survive indicator disagreement");
        // Location stays on the template match; only confidence drops.
        assert!(est.x.abs_diff(360) <= 1);
        assert!(est.y.abs_diff(120) <= 1);
        assert!(est.confidence < 0.9, "confidence {}", est.confidence);
        assert!(est.confidence >= 0.7);
    }

    #[test]
    fn agreeing_indicator_keeps_confidence() {
        let map = corridor_map(600, 600);
        let lm = LargeMapInfo::analyse(lm_key(), map.clone());
        let mc = calculator();

        let mut mm = mc.analyse_mini_map(crop_rgb(&map, 260, 20, 200, 200));
        mm.indicator = Some(Circle {
            cx: 102,
            cy: 99,
            r: 8,
        });

        let est = mc
            .cal_character_pos(&lm, &mm, Some((360, 120, 10)))
            .unwrap()
            .unwrap();
        assert!(est.confidence >= 0.99);
    }

    #[test]
    fn oversized_minimap_yields_no_estimate() {
        let map = corridor_map(100, 100);
        let lm = LargeMapInfo::analyse(lm_key(), map);
        let mc = calculator();
        let mm = mc.analyse_mini_map(RgbImage::from_pixel(200, 200, GROUND));
        assert!(mc.cal_character_pos(&lm, &mm, None).unwrap().is_none());
    }
}
