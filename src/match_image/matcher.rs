//! Template matching wrapper producing confidence-ranked result sets

use super::types::{MatchResult, MatchResultList};
use crate::error::{NavError, NavResult};
use image::GrayImage;
use imageproc::template_matching::{MatchTemplateMethod, match_template};

const DENOM_EPS: f64 = 1e-10;

/// Wraps the normalized cross-correlation primitive into a result-set
/// contract: every pixel location clearing the threshold is returned, with
/// no non-maximum suppression.
#[derive(Debug, Default)]
pub struct ImageMatcher;

impl ImageMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Match `template` against `source`, retaining every location whose
    /// normalized correlation score is at least `threshold`.
    ///
    /// # Arguments
    /// * `threshold` - correlation cutoff, must be within [0, 1]
    /// * `mask` - optional template mask; only non-zero mask pixels
    ///   participate in scoring (same dimensions as the template)
    /// * `ignore_inf` - drop locations with non-finite scores, which arise
    ///   from degenerate all-uniform windows under a mask
    ///
    /// A template larger than the source yields an empty list, not an error.
    pub fn match_template(
        &self,
        source: &GrayImage,
        template: &GrayImage,
        threshold: f32,
        mask: Option<&GrayImage>,
        ignore_inf: bool,
    ) -> NavResult<MatchResultList> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(NavError::InvalidThreshold { value: threshold });
        }

        let (tw, th) = template.dimensions();
        if tw == 0 || th == 0 || tw > source.width() || th > source.height() {
            return Ok(MatchResultList::new());
        }

        let scores: Vec<(u32, u32, f32)> = match mask {
            Some(mask) => masked_ncc_scores(source, template, mask),
            None => {
                let score_map = match_template(
                    source,
                    template,
                    MatchTemplateMethod::CrossCorrelationNormalized,
                );
                score_map
                    .enumerate_pixels()
                    .map(|(x, y, p)| (x, y, p[0]))
                    .collect()
            }
        };

        let mut results = MatchResultList::new();
        for (x, y, score) in scores {
            if ignore_inf && !score.is_finite() {
                continue;
            }
            if score >= threshold {
                results.push(MatchResult::new(score, x, y, tw, th));
            }
        }

        log::debug!(
            "match_template: {} locations >= {:.2} ({}x{} template in {}x{} source)",
            results.len(),
            threshold,
            tw,
            th,
            source.width(),
            source.height()
        );
        Ok(results)
    }
}

/// Zero-mean normalized cross-correlation restricted to masked template
/// pixels, scanned over every valid position.
///
/// Degenerate windows (zero variance on either side) score infinite, so
/// callers can filter them with `ignore_inf`.
fn masked_ncc_scores(
    source: &GrayImage,
    template: &GrayImage,
    mask: &GrayImage,
) -> Vec<(u32, u32, f32)> {
    debug_assert_eq!(template.dimensions(), mask.dimensions());

    // Masked template pixels with precomputed statistics.
    let mut tpl: Vec<(u32, u32, f64)> = Vec::new();
    for (x, y, p) in template.enumerate_pixels() {
        if mask.get_pixel(x, y)[0] > 0 {
            tpl.push((x, y, p[0] as f64));
        }
    }

    let (sw, sh) = source.dimensions();
    let (tw, th) = template.dimensions();
    let x_max = sw - tw;
    let y_max = sh - th;

    let n = tpl.len() as f64;
    if tpl.is_empty() {
        return (0..=y_max)
            .flat_map(|y| (0..=x_max).map(move |x| (x, y, f32::INFINITY)))
            .collect();
    }
    let t_mean = tpl.iter().map(|&(_, _, v)| v).sum::<f64>() / n;
    let t_var = tpl.iter().map(|&(_, _, v)| (v - t_mean).powi(2)).sum::<f64>() / n;
    let t_std = t_var.sqrt();

    let mut scores = Vec::with_capacity(((x_max + 1) * (y_max + 1)) as usize);
    for y in 0..=y_max {
        for x in 0..=x_max {
            let mut sum_s = 0.0f64;
            let mut sum_s2 = 0.0f64;
            let mut sum_st = 0.0f64;
            for &(dx, dy, t) in &tpl {
                let s = source.get_pixel(x + dx, y + dy)[0] as f64;
                sum_s += s;
                sum_s2 += s * s;
                sum_st += s * t;
            }
            let s_mean = sum_s / n;
            let s_var = (sum_s2 / n - s_mean * s_mean).max(0.0);
            let denom = n * s_var.sqrt() * t_std;
            let score = if denom < DENOM_EPS {
                f32::INFINITY
            } else {
                ((sum_st - n * s_mean * t_mean) / denom) as f32
            };
            scores.push((x, y, score));
        }
    }
    scores
}
