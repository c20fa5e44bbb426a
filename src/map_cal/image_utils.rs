//! Auxiliary raster utilities shared by map analysis

use crate::error::{NavError, NavResult};
use crate::match_image::ImageMatcher;
use image::{GrayImage, Luma, RgbImage};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};

/// Channel band classifying a pixel as walkable road surface.
pub const ROAD_COLOR_MIN: u8 = 35;
pub const ROAD_COLOR_MAX: u8 = 75;

/// Binary mask of road-colored pixels: every channel inside the road band
/// and roughly gray (small channel spread).
pub fn road_mask(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b] = img.get_pixel(x, y).0;
        let lo = r.min(g).min(b);
        let hi = r.max(g).max(b);
        let in_band = lo >= ROAD_COLOR_MIN && hi <= ROAD_COLOR_MAX;
        let grayish = hi - lo <= 20;
        if in_band && grayish { Luma([255]) } else { Luma([0]) }
    })
}

/// Rotate counter-clockwise about the image center, degrees.
pub fn rotate_image(img: &GrayImage, angle_deg: f32) -> GrayImage {
    rotate_about_center(
        img,
        -angle_deg.to_radians(),
        Interpolation::Bilinear,
        Luma([0]),
    )
}

/// Zero every pixel outside the given circle.
pub fn mask_outside_circle(img: &GrayImage, cx: u32, cy: u32, radius: u32) -> GrayImage {
    circle_select(img, cx, cy, radius, true)
}

/// Zero every pixel inside the given circle.
pub fn mask_inside_circle(img: &GrayImage, cx: u32, cy: u32, radius: u32) -> GrayImage {
    circle_select(img, cx, cy, radius, false)
}

fn circle_select(img: &GrayImage, cx: u32, cy: u32, radius: u32, keep_inside: bool) -> GrayImage {
    let r2 = (radius as i64) * (radius as i64);
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let dx = x as i64 - cx as i64;
        let dy = y as i64 - cy as i64;
        let inside = dx * dx + dy * dy <= r2;
        if inside == keep_inside {
            *img.get_pixel(x, y)
        } else {
            Luma([0])
        }
    })
}

/// Mean squared per-channel difference between two equally sized images.
pub fn mse(a: &RgbImage, b: &RgbImage) -> f64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let n = (a.as_raw().len()) as f64;
    if n == 0.0 {
        return 0.0;
    }
    a.as_raw()
        .iter()
        .zip(b.as_raw().iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        / n
}

/// Mean-squared-error comparison; below the threshold the images are
/// considered the same frame.
pub fn is_same_image(a: &RgbImage, b: &RgbImage, threshold: f64) -> bool {
    a.dimensions() == b.dimensions() && mse(a, b) < threshold
}

/// Vertically stitch two captures obtained by scrolling: same width,
/// overlapping content. The top strip of `next` is located inside `img` to
/// find the overlap, then only the non-overlapping remainder is appended.
pub fn concat_vertically(
    img: &RgbImage,
    next: &RgbImage,
    decision_height: u32,
) -> NavResult<RgbImage> {
    if img.width() != next.width() {
        return Err(NavError::StitchFailed {
            description: format!(
                "capture widths differ ({} vs {})",
                img.width(),
                next.width()
            ),
        });
    }
    if decision_height == 0 || decision_height > next.height() {
        return Err(NavError::StitchFailed {
            description: format!("decision height {decision_height} out of range"),
        });
    }

    let img_gray = image::DynamicImage::ImageRgb8(img.clone()).to_luma8();
    let strip = image::imageops::crop_imm(next, 0, 0, next.width(), decision_height).to_image();
    let strip_gray = image::DynamicImage::ImageRgb8(strip).to_luma8();

    let matcher = ImageMatcher::new();
    let results = matcher.match_template(&img_gray, &strip_gray, 0.5, None, true)?;
    let best = results.max().ok_or_else(|| NavError::StitchFailed {
        description: "no overlap found between captures".to_string(),
    })?;

    let overlap = img.height() - best.y;
    // The strip must sit low enough that `next` extends past the bottom of
    // `img`; a match higher up means `next` is contained and appending its
    // remainder would leave a gap.
    if overlap > next.height() {
        return Err(NavError::StitchFailed {
            description: format!(
                "matched strip at row {} leaves a gap below the first capture",
                best.y
            ),
        });
    }
    log::debug!(
        "concat_vertically: overlap {} rows (confidence {:.3})",
        overlap,
        best.confidence
    );

    let out_height = img.height() + next.height() - overlap;
    let mut out = RgbImage::new(img.width(), out_height);
    for (x, y, p) in img.enumerate_pixels() {
        out.put_pixel(x, y, *p);
    }
    for y in overlap..next.height() {
        for x in 0..next.width() {
            out.put_pixel(x, img.height() + y - overlap, *next.get_pixel(x, y));
        }
    }
    Ok(out)
}
