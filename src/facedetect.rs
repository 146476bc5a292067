//! Face localization for crop anchoring and segmentation seeding
//!
//! A lightweight multi-scale detector: candidate windows slide over an
//! equalized grayscale pyramid and pass through a cascade of cheap rejection
//! stages (skin-likelihood fraction, luminance variance, horizontal
//! symmetry). Survivors are scored and the highest-confidence candidate
//! wins, ties broken by first-found. Detection never fails: when nothing
//! survives the cascade, a rectangle centered on the image covering 25% of
//! width and height is returned.

use crate::types::FaceRegion;
use image::DynamicImage;
use imageproc::contrast::equalize_histogram;

/// Smallest image edge the detector will scan
const MIN_IMAGE_EDGE: u32 = 32;
/// Window sizes scale by this factor between pyramid levels
const SCALE_STEP: f64 = 1.25;
/// Skin fraction acceptance range for a candidate window
const SKIN_FRACTION_RANGE: (f64, f64) = (0.25, 0.98);
/// Minimum luminance standard deviation (flat regions are not faces)
const MIN_LUMA_STDDEV: f64 = 12.0;
/// Minimum left/right symmetry score
const MIN_SYMMETRY: f64 = 0.6;
/// Vertical strips compared for the symmetry stage
const SYMMETRY_STRIPS: u32 = 8;

/// A scored face candidate
#[derive(Debug, Clone, Copy)]
pub struct FaceCandidate {
    pub region: FaceRegion,
    pub confidence: f32,
}

/// Locates the most salient face region in an image
#[derive(Debug, Clone, Default)]
pub struct FaceLocator;

impl FaceLocator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Locate the most salient face region
    ///
    /// Always returns a valid rectangle within the image bounds.
    #[must_use]
    pub fn locate(&self, image: &DynamicImage) -> FaceRegion {
        match self.detect(image) {
            Some(candidate) => {
                log::debug!(
                    "Selected face at ({}, {}) {}x{} with confidence {:.3}",
                    candidate.region.x,
                    candidate.region.y,
                    candidate.region.width,
                    candidate.region.height,
                    candidate.confidence
                );
                candidate.region
            },
            None => {
                log::debug!("No face candidate survived the cascade, using centered fallback");
                FaceRegion::centered(image.width(), image.height(), 0.25, 0.25)
            },
        }
    }

    /// Detect the best face candidate, if any
    #[must_use]
    pub fn detect(&self, image: &DynamicImage) -> Option<FaceCandidate> {
        let (width, height) = (image.width(), image.height());
        if width < MIN_IMAGE_EDGE || height < MIN_IMAGE_EDGE {
            return None;
        }

        let gray = equalize_histogram(&image.to_luma8());
        let rgb = image.to_rgb8();

        // Prefix-sum tables for O(1) window statistics
        let luma: Vec<f64> = gray.as_raw().iter().map(|&v| f64::from(v)).collect();
        let skin: Vec<f64> = rgb
            .pixels()
            .map(|p| if is_skin_tone(p[0], p[1], p[2]) { 1.0 } else { 0.0 })
            .collect();

        let luma_sum = IntegralTable::new(&luma, width, height);
        let luma_sq_sum = IntegralTable::new(
            &luma.iter().map(|v| v * v).collect::<Vec<_>>(),
            width,
            height,
        );
        let skin_sum = IntegralTable::new(&skin, width, height);

        let min_dim = width.min(height);
        let mut window = min_dim / 4;
        let max_window = (f64::from(min_dim) * 0.7) as u32;

        let mut best: Option<FaceCandidate> = None;
        while window >= 16 && window <= max_window {
            let stride = (window / 8).max(1);
            let mut y = 0;
            while y + window <= height {
                let mut x = 0;
                while x + window <= width {
                    if let Some(confidence) = score_window(
                        &luma_sum,
                        &luma_sq_sum,
                        &skin_sum,
                        x,
                        y,
                        window,
                    ) {
                        // Strict comparison keeps the first-found candidate on ties
                        if best.map_or(true, |b| confidence > b.confidence) {
                            best = Some(FaceCandidate {
                                region: FaceRegion::new(
                                    i64::from(x),
                                    i64::from(y),
                                    window,
                                    window,
                                ),
                                confidence,
                            });
                        }
                    }
                    x += stride;
                }
                y += stride;
            }
            window = (f64::from(window) * SCALE_STEP) as u32;
        }

        best
    }
}

/// Prefix-sum table over a single-channel buffer
struct IntegralTable {
    sums: Vec<f64>,
    width: u32,
}

impl IntegralTable {
    fn new(values: &[f64], width: u32, height: u32) -> Self {
        let w = width as usize;
        let h = height as usize;
        let mut sums = vec![0.0; (w + 1) * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0.0;
            for x in 0..w {
                row_sum += values[y * w + x];
                sums[(y + 1) * (w + 1) + (x + 1)] = sums[y * (w + 1) + (x + 1)] + row_sum;
            }
        }
        Self { sums, width }
    }

    /// Sum over the half-open rectangle [x0, x1) × [y0, y1)
    fn sum(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> f64 {
        let w = self.width as usize + 1;
        let (x0, y0, x1, y1) = (x0 as usize, y0 as usize, x1 as usize, y1 as usize);
        self.sums[y1 * w + x1] + self.sums[y0 * w + x0]
            - self.sums[y0 * w + x1]
            - self.sums[y1 * w + x0]
    }
}

/// Cascade stages over one window; `None` = rejected, `Some(score)` = survivor
fn score_window(
    luma_sum: &IntegralTable,
    luma_sq_sum: &IntegralTable,
    skin_sum: &IntegralTable,
    x: u32,
    y: u32,
    window: u32,
) -> Option<f32> {
    let area = f64::from(window) * f64::from(window);
    let (x1, y1) = (x + window, y + window);

    // Stage 1: skin-likelihood fraction
    let skin_fraction = skin_sum.sum(x, y, x1, y1) / area;
    if skin_fraction < SKIN_FRACTION_RANGE.0 || skin_fraction > SKIN_FRACTION_RANGE.1 {
        return None;
    }

    // Stage 2: luminance variance (faces have structure, backdrops do not)
    let mean = luma_sum.sum(x, y, x1, y1) / area;
    let variance = (luma_sq_sum.sum(x, y, x1, y1) / area - mean * mean).max(0.0);
    if variance.sqrt() < MIN_LUMA_STDDEV {
        return None;
    }

    // Stage 3: horizontal symmetry of skin mass across vertical strips
    let strips = SYMMETRY_STRIPS.min(window);
    let strip_width = window / strips;
    let mut asymmetry = 0.0;
    let mut total_mass = 0.0;
    for strip in 0..strips / 2 {
        let left_x0 = x + strip * strip_width;
        let right_x0 = x + (strips - 1 - strip) * strip_width;
        let left = skin_sum.sum(left_x0, y, left_x0 + strip_width, y1);
        let right = skin_sum.sum(right_x0, y, right_x0 + strip_width, y1);
        asymmetry += (left - right).abs();
        total_mass += left + right;
    }
    let symmetry = if total_mass > 0.0 {
        1.0 - (asymmetry / total_mass)
    } else {
        0.0
    };
    if symmetry < MIN_SYMMETRY {
        return None;
    }

    // Confidence: symmetry weighted by how face-like the skin coverage is
    let coverage_score = 1.0 - ((skin_fraction - 0.6).abs() / 0.6).min(1.0);
    Some((symmetry * (0.5 + 0.5 * coverage_score)) as f32)
}

/// HSV skin-tone test shared with the classical segmenter's stage-1 cascade
#[must_use]
pub(crate) fn is_skin_tone(r: u8, g: u8, b: u8) -> bool {
    let (h, s, v) = rgb_to_hsv_cv(r, g, b);
    // Broad range covering light through dark skin tones
    (h <= 50.0 && (20.0..=170.0).contains(&s) && v >= 70.0)
        || ((10.0..=30.0).contains(&h) && (50.0..=200.0).contains(&s) && v >= 70.0)
        || (h <= 25.0 && (10.0..=150.0).contains(&s) && (40.0..=200.0).contains(&v))
}

/// RGB → HSV with the OpenCV 8-bit convention: H ∈ [0, 180), S, V ∈ [0, 255]
#[must_use]
pub(crate) fn rgb_to_hsv_cv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = f32::from(r) / 255.0;
    let g = f32::from(g) / 255.0;
    let b = f32::from(b) / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta < f32::EPSILON {
        0.0
    } else if (max - r).abs() < f32::EPSILON {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if (max - g).abs() < f32::EPSILON {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let saturation = if max < f32::EPSILON { 0.0 } else { delta / max };

    (hue / 2.0, saturation * 255.0, max * 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Synthetic portrait: skin-toned head on a blue backdrop with eye and
    /// mouth structure so the variance stage passes
    fn synthetic_portrait(width: u32, height: u32) -> DynamicImage {
        let cx = width / 2;
        let cy = height * 2 / 5;
        let radius = (width.min(height) / 5) as i64;
        let image = RgbImage::from_fn(width, height, |x, y| {
            let dx = i64::from(x) - i64::from(cx);
            let dy = i64::from(y) - i64::from(cy);
            if dx * dx + dy * dy <= radius * radius {
                // Eyes and mouth as dark features
                let eye_y = i64::from(cy) - radius / 3;
                let mouth_y = i64::from(cy) + radius / 2;
                let near = |a: i64, b: i64| (a - b).abs() <= radius / 8;
                if (near(i64::from(y), eye_y)
                    && (near(dx, -radius / 2) || near(dx, radius / 2)))
                    || (near(i64::from(y), mouth_y) && dx.abs() <= radius / 3)
                {
                    Rgb([60, 30, 25])
                } else {
                    Rgb([205, 150, 120])
                }
            } else {
                Rgb([60, 90, 170])
            }
        });
        DynamicImage::ImageRgb8(image)
    }

    #[test]
    fn test_locate_finds_face_near_center() {
        let image = synthetic_portrait(200, 240);
        let locator = FaceLocator::new();
        let region = locator.locate(&image);

        let (cx, cy) = region.center();
        // Head is centered horizontally at 100, vertically at 96
        assert!((cx - 100).abs() < 40, "face center x {cx} too far off");
        assert!((cy - 96).abs() < 60, "face center y {cy} too far off");
        let clamped = region.clamp_to(200, 240);
        assert_eq!(clamped, region, "region must stay within image bounds");
    }

    #[test]
    fn test_locate_fallback_on_flat_image() {
        let flat = DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 80, Rgb([200, 200, 200])));
        let locator = FaceLocator::new();
        let region = locator.locate(&flat);

        assert_eq!(region.width, 30);
        assert_eq!(region.height, 20);
        let (cx, cy) = region.center();
        assert_eq!(cx, 60);
        assert_eq!(cy, 40);
    }

    #[test]
    fn test_locate_fallback_on_tiny_image() {
        let tiny = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([205, 150, 120])));
        let locator = FaceLocator::new();
        let region = locator.locate(&tiny);
        assert_eq!(region, FaceRegion::centered(8, 8, 0.25, 0.25));
    }

    #[test]
    fn test_hsv_conversion_known_values() {
        // Pure red: H=0, S=255, V=255
        let (h, s, v) = rgb_to_hsv_cv(255, 0, 0);
        assert!(h.abs() < 0.5);
        assert!((s - 255.0).abs() < 0.5);
        assert!((v - 255.0).abs() < 0.5);

        // Pure blue: H=120 in OpenCV half-degrees
        let (h, _, _) = rgb_to_hsv_cv(0, 0, 255);
        assert!((h - 120.0).abs() < 0.5);

        // Gray: zero saturation
        let (_, s, _) = rgb_to_hsv_cv(128, 128, 128);
        assert!(s.abs() < 0.5);
    }

    #[test]
    fn test_skin_tone_classifier() {
        assert!(is_skin_tone(205, 150, 120));
        assert!(is_skin_tone(230, 180, 150));
        assert!(!is_skin_tone(60, 90, 170));
        assert!(!is_skin_tone(0, 255, 0));
    }
}
