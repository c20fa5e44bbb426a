//! Minimap capture analysis: masks and position-indicator detection

use super::image_utils;
use crate::error::{NavError, NavResult};
use crate::match_image::Rect;
use image::{GrayImage, Luma, RgbImage};
use imageproc::edges::canny;
use std::f32::consts::PI;

/// Game resolution this crate expects screenshots in.
pub const EXPECTED_SCREEN_WIDTH: u32 = 1920;
pub const EXPECTED_SCREEN_HEIGHT: u32 = 1080;

/// Fixed on-screen minimap viewport.
pub const MINI_MAP_RECT: Rect = Rect {
    x: 48,
    y: 58,
    w: 200,
    h: 200,
};

/// Luminance at which outer-ring pixels count as off-map border.
const EDGE_BRIGHTNESS: u8 = 225;

/// Plausible radius range of the on-screen player marker.
const INDICATOR_MIN_R: u32 = 5;
const INDICATOR_MAX_R: u32 = 40;

/// The marker is rendered at the viewport center; circles detected farther
/// out are map decorations, not the player.
const INDICATOR_SEARCH_RADIUS: u32 = 15;

/// Fraction of a circle's circumference that must collect votes before the
/// circle is accepted.
const CIRCLE_COVERAGE_MIN: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Circle {
    pub cx: u32,
    pub cy: u32,
    pub r: u32,
}

/// Per-screenshot minimap analysis. Pure transient value object.
#[derive(Debug, Clone)]
pub struct MiniMapInfo {
    pub raw: RgbImage,
    pub gray: GrayImage,
    /// 255 inside the circular viewport, 0 on corners and bright border.
    pub view_mask: GrayImage,
    /// 255 where pixels are off-map (complement of `view_mask`).
    pub edge_mask: GrayImage,
    /// 255 on walkable road pixels inside the viewport.
    pub road_mask: GrayImage,
    /// Detected player marker, if any this frame.
    pub indicator: Option<Circle>,
    /// Heading derived from the marker's bright arrow, degrees CCW from +x.
    pub indicator_angle: Option<f32>,
}

/// Crop the fixed minimap region out of a full game screenshot.
pub fn cut_mini_map(screen: &RgbImage) -> NavResult<RgbImage> {
    let (w, h) = screen.dimensions();
    if w != EXPECTED_SCREEN_WIDTH || h != EXPECTED_SCREEN_HEIGHT {
        return Err(NavError::InvalidScreenshot {
            width: w,
            height: h,
            expected_width: EXPECTED_SCREEN_WIDTH,
            expected_height: EXPECTED_SCREEN_HEIGHT,
        });
    }
    Ok(image::imageops::crop_imm(
        screen,
        MINI_MAP_RECT.x,
        MINI_MAP_RECT.y,
        MINI_MAP_RECT.w,
        MINI_MAP_RECT.h,
    )
    .to_image())
}

/// Analyse one minimap capture into masks and the position indicator.
pub fn analyse_mini_map(raw: RgbImage) -> MiniMapInfo {
    let gray = image::DynamicImage::ImageRgb8(raw.clone()).to_luma8();
    let (w, h) = gray.dimensions();
    let cx = w / 2;
    let cy = h / 2;
    let radius = w.min(h) / 2;

    // The minimap is a circular viewport over a square capture: corners are
    // off-map, and so is the bright border ring just inside the circle.
    let ring_inner = (radius as f32 * 0.85) as i64;
    let edge_mask = GrayImage::from_fn(w, h, |x, y| {
        let dx = x as i64 - cx as i64;
        let dy = y as i64 - cy as i64;
        let d2 = dx * dx + dy * dy;
        let outside = d2 > (radius as i64) * (radius as i64);
        let bright_ring =
            d2 >= ring_inner * ring_inner && gray.get_pixel(x, y)[0] >= EDGE_BRIGHTNESS;
        if outside || bright_ring { Luma([255]) } else { Luma([0]) }
    });
    let view_mask = GrayImage::from_fn(w, h, |x, y| {
        if edge_mask.get_pixel(x, y)[0] > 0 {
            Luma([0])
        } else {
            Luma([255])
        }
    });

    let mut road_mask = image_utils::road_mask(&raw);
    for (x, y, p) in road_mask.enumerate_pixels_mut() {
        if view_mask.get_pixel(x, y)[0] == 0 {
            *p = Luma([0]);
        }
    }

    // Restrict circle detection to the interior so the viewport rim does
    // not register as a marker.
    let interior = image_utils::mask_outside_circle(&gray, cx, cy, (radius as f32 * 0.8) as u32);
    let indicator = find_max_circle(&interior, INDICATOR_MIN_R, INDICATOR_MAX_R).filter(|c| {
        let dx = c.cx as i64 - cx as i64;
        let dy = c.cy as i64 - cy as i64;
        dx * dx + dy * dy <= (INDICATOR_SEARCH_RADIUS as i64).pow(2)
    });
    let indicator_angle = indicator.and_then(|c| indicator_angle(&gray, &c));

    match indicator {
        Some(c) => log::debug!("minimap indicator at ({}, {}) r={}", c.cx, c.cy, c.r),
        None => log::debug!("no minimap indicator this frame"),
    }

    MiniMapInfo {
        raw,
        gray,
        view_mask,
        edge_mask,
        road_mask,
        indicator,
        indicator_angle,
    }
}

/// Hough-style circle detection over a bounded radius range.
///
/// Each Canny edge pixel votes for candidate centers on a circle of the
/// probed radius around itself. Candidates clearing the coverage bar are
/// clustered by center; among distinct circles the largest radius wins (the
/// player marker is rendered larger than decorative elements).
pub fn find_max_circle(gray: &GrayImage, min_r: u32, max_r: u32) -> Option<Circle> {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 || min_r == 0 || min_r > max_r {
        return None;
    }

    let edges = canny(gray, 50.0, 100.0);
    let edge_points: Vec<(u32, u32)> = edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .map(|(x, y, _)| (x, y))
        .collect();
    if edge_points.is_empty() {
        log::debug!("find_max_circle: no edges");
        return None;
    }

    #[derive(Clone, Copy)]
    struct Candidate {
        cx: u32,
        cy: u32,
        r: u32,
        coverage: f32,
    }

    let mut candidates: Vec<Candidate> = Vec::new();
    for r in min_r..=max_r {
        // Sample densely enough that consecutive votes land in adjacent
        // pixel bins.
        let steps = ((4.0 * PI * r as f32) as usize).max(32);
        let mut acc = vec![0u32; (w * h) as usize];
        for &(x, y) in &edge_points {
            for k in 0..steps {
                let theta = 2.0 * PI * k as f32 / steps as f32;
                let vx = x as f32 - r as f32 * theta.cos();
                let vy = y as f32 - r as f32 * theta.sin();
                if vx >= 0.0 && vy >= 0.0 && vx < w as f32 && vy < h as f32 {
                    acc[(vy as u32 * w + vx as u32) as usize] += 1;
                }
            }
        }

        // 3x3 sum absorbs rounding smear around the true center.
        let mut best_votes = 0u32;
        let mut best = (0u32, 0u32);
        for y in 1..h.saturating_sub(1) {
            for x in 1..w.saturating_sub(1) {
                let mut votes = 0u32;
                for dy in 0..3 {
                    for dx in 0..3 {
                        votes += acc[((y + dy - 1) * w + x + dx - 1) as usize];
                    }
                }
                if votes > best_votes {
                    best_votes = votes;
                    best = (x, y);
                }
            }
        }

        // A full circle concentrates roughly two votes per circumference
        // pixel into the 3x3 window.
        let coverage = best_votes as f32 / (4.0 * PI * r as f32);
        if coverage >= CIRCLE_COVERAGE_MIN {
            candidates.push(Candidate {
                cx: best.0,
                cy: best.1,
                r,
                coverage,
            });
        }
    }

    // Collapse radius smear: candidates with nearby centers describe the
    // same circle; keep the best-covered radius per center.
    let mut clusters: Vec<Candidate> = Vec::new();
    for c in candidates {
        let near = clusters.iter_mut().find(|e| {
            let dx = e.cx as i64 - c.cx as i64;
            let dy = e.cy as i64 - c.cy as i64;
            dx * dx + dy * dy <= 25
        });
        match near {
            Some(e) => {
                if c.coverage > e.coverage {
                    *e = c;
                }
            }
            None => clusters.push(c),
        }
    }

    let result = clusters.into_iter().max_by_key(|c| c.r).map(|c| Circle {
        cx: c.cx,
        cy: c.cy,
        r: c.r,
    });
    log::debug!("find_max_circle: {:?}", result);
    result
}

/// Heading from the marker's bright arrow: the intensity centroid of the
/// marker interior is offset from its center in the facing direction.
fn indicator_angle(gray: &GrayImage, circle: &Circle) -> Option<f32> {
    let mut sum_x = 0.0f64;
    let mut sum_y = 0.0f64;
    let mut total = 0.0f64;
    let r = circle.r as i64;
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy > r * r {
                continue;
            }
            let x = circle.cx as i64 + dx;
            let y = circle.cy as i64 + dy;
            if x < 0 || y < 0 || x >= gray.width() as i64 || y >= gray.height() as i64 {
                continue;
            }
            let v = gray.get_pixel(x as u32, y as u32)[0] as f64;
            if v >= 200.0 {
                sum_x += dx as f64 * v;
                sum_y += dy as f64 * v;
                total += v;
            }
        }
    }
    if total <= 0.0 {
        return None;
    }
    let ox = sum_x / total;
    let oy = sum_y / total;
    if (ox * ox + oy * oy).sqrt() < 1.5 {
        // Centroid sits on the center: no discernible facing this frame.
        return None;
    }
    let mut angle = (-oy).atan2(ox).to_degrees() as f32;
    if angle < 0.0 {
        angle += 360.0;
    }
    Some(angle)
}
