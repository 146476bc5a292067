//! Classical color/morphology segmentation strategy
//!
//! Pure-raster fallback engine that needs no model file: skin detection in
//! two color spaces combined with a clothing heuristic, studio-backdrop
//! color detection inverted to foreground likelihood, a Canny edge overlay,
//! and an iterative graph-cut pass seeded from the fused heuristic mask.
//! When the graph-cut pass fails the heuristic mask alone is returned as a
//! degraded (but valid) result.

use crate::backends::grabcut::{self, GrabCutParams, Trimap};
use crate::config::RemovalConfig;
use crate::error::Result;
use crate::facedetect::{is_skin_tone, rgb_to_hsv_cv, FaceLocator};
use crate::inference::SegmentationBackend;
use crate::types::{FaceRegion, SegmentationMask};
use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::contrast::adaptive_threshold;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::{close, dilate};

/// Canny hysteresis thresholds for the edge overlay
const CANNY_THRESHOLDS: (f32, f32) = (50.0, 150.0);
/// Block radius for the adaptive clothing-texture threshold
const ADAPTIVE_BLOCK_RADIUS: u32 = 7;
/// Definite-background margin seeded along the image border
const BORDER_MARGIN: u32 = 10;

/// Classical color-heuristic segmenter
pub struct ClassicalSegmenter {
    face_locator: FaceLocator,
    config: RemovalConfig,
    degraded: bool,
}

impl ClassicalSegmenter {
    /// Construct the classical engine; never fails
    #[must_use]
    pub fn new(config: &RemovalConfig) -> Self {
        Self {
            face_locator: FaceLocator::new(),
            config: config.clone(),
            degraded: false,
        }
    }

    /// Build the combined heuristic foreground estimate
    fn heuristic_mask(&self, rgb: &RgbImage) -> GrayImage {
        let (width, height) = rgb.dimensions();

        let mut skin = GrayImage::new(width, height);
        let mut clothing = GrayImage::new(width, height);
        let mut backdrop = GrayImage::new(width, height);
        let mut gray = GrayImage::new(width, height);

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let (r, g, b) = (pixel[0], pixel[1], pixel[2]);
            if is_skin_tone(r, g, b) || is_skin_ycbcr(r, g, b) {
                skin.put_pixel(x, y, image::Luma([255]));
            }
            if is_clothing_lab(r, g, b) {
                clothing.put_pixel(x, y, image::Luma([255]));
            }
            if is_backdrop_color(r, g, b) {
                backdrop.put_pixel(x, y, image::Luma([255]));
            }
            let luma = (0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)) as u8;
            gray.put_pixel(x, y, image::Luma([luma]));
        }

        // Texture-based clothing rescue for fabrics the color ranges miss
        let textured = adaptive_threshold(&gray, ADAPTIVE_BLOCK_RADIUS);

        // Fuse: human evidence OR not-backdrop, then close small gaps
        let mut fused = GrayImage::new(width, height);
        for (x, y, out) in fused.enumerate_pixels_mut() {
            let human = skin.get_pixel(x, y)[0] > 0
                || clothing.get_pixel(x, y)[0] > 0
                || textured.get_pixel(x, y)[0] > 0;
            let foreground_likely = backdrop.get_pixel(x, y)[0] == 0;
            if human || foreground_likely {
                *out = image::Luma([255]);
            }
        }
        let mut fused = close(&fused, Norm::LInf, 2);

        // Edge overlay connects weakly-supported segments
        let edges = canny(&gray, CANNY_THRESHOLDS.0, CANNY_THRESHOLDS.1);
        let dilated_edges = dilate(&edges, Norm::LInf, 1);
        for (x, y, out) in fused.enumerate_pixels_mut() {
            if dilated_edges.get_pixel(x, y)[0] > 0 {
                *out = image::Luma([255]);
            }
        }

        fused
    }

    /// Body prior below a detected face: passport subjects extend downwards
    fn body_prior(face: &FaceRegion, width: u32, height: u32) -> FaceRegion {
        let body_width = (f64::from(face.width) * 3.5) as u32;
        let body_height = (f64::from(face.height) * 4.5) as u32;
        let (face_cx, face_cy) = face.center();
        FaceRegion::new(
            face_cx - i64::from(body_width / 2),
            face_cy,
            body_width,
            body_height,
        )
        .clamp_to(width, height)
    }

    /// Centered subject prior when no face is available
    fn centered_prior(width: u32, height: u32) -> FaceRegion {
        let prior_width = (f64::from(width) * 0.6) as u32;
        let prior_height = (f64::from(height) * 0.8) as u32;
        // Positioned above center to account for the head
        FaceRegion::new(
            i64::from(width / 2) - i64::from(prior_width / 2),
            i64::from(height / 2) - i64::from(prior_height) / 3,
            prior_width,
            prior_height,
        )
        .clamp_to(width, height)
    }
}

impl SegmentationBackend for ClassicalSegmenter {
    fn name(&self) -> &'static str {
        "classical"
    }

    fn segment(&mut self, image: &DynamicImage) -> Result<SegmentationMask> {
        self.degraded = false;
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let heuristic = self.heuristic_mask(&rgb);
        let heuristic_mask = SegmentationMask::from_image(&heuristic);

        if self.config.debug {
            let _ = heuristic_mask.save_png("debug_heuristic_mask.png");
        }

        // Seed the trimap from the heuristic levels plus a subject prior
        let mut trimap = Trimap::from_mask(&heuristic_mask, 180, 120, 50);
        let prior = match self.face_locator.detect(image) {
            Some(candidate) => {
                log::debug!(
                    "Seeding graph-cut with face-anchored body prior (confidence {:.3})",
                    candidate.confidence
                );
                Self::body_prior(&candidate.region, width, height)
            },
            None => Self::centered_prior(width, height),
        };
        trimap.mark_probable_foreground(&prior);
        trimap.mark_border_background(BORDER_MARGIN);

        let params = GrabCutParams::default();
        let mask = match grabcut::run_with_sample_injection(&rgb, &mut trimap, &params) {
            Ok(refined) => {
                let closed = close(&refined.to_image()?, Norm::LInf, 4);
                SegmentationMask::from_image(&closed)
            },
            Err(err) => {
                // Degraded path: the heuristic estimate alone is still a valid mask
                log::warn!("Graph-cut segmentation failed, using heuristic mask: {err}");
                self.degraded = true;
                heuristic_mask
            },
        };

        crate::backends::secondary_refine(&rgb, mask, &self.config)
    }

    fn last_run_degraded(&self) -> bool {
        self.degraded
    }
}

/// YCbCr skin test: Cr ∈ [133, 173], Cb ∈ [77, 127]
fn is_skin_ycbcr(r: u8, g: u8, b: u8) -> bool {
    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    (133.0..=173.0).contains(&cr) && (77.0..=127.0).contains(&cb)
}

/// Clothing ranges in an 8-bit Lab encoding (L, a+128, b+128)
fn is_clothing_lab(r: u8, g: u8, b: u8) -> bool {
    let (l, a, bb) = rgb_to_lab_8bit(r, g, b);
    // Dark clothing (black, navy)
    (l <= 80.0 && a <= 135.0 && bb <= 135.0)
        // Light clothing (white, beige)
        || (l >= 130.0 && a <= 140.0 && bb <= 140.0)
        // Light blue shirts
        || ((100.0..=200.0).contains(&l) && (120.0..=140.0).contains(&a) && (130.0..=150.0).contains(&bb))
}

/// Studio backdrop colors typical of passport photos
fn is_backdrop_color(r: u8, g: u8, b: u8) -> bool {
    let (h, s, v) = rgb_to_hsv_cv(r, g, b);
    // Blue backdrop
    ((100.0..=140.0).contains(&h) && s >= 50.0 && v >= 50.0)
        // Green (chroma key)
        || ((40.0..=80.0).contains(&h) && s >= 50.0 && v >= 50.0)
        // White (studio)
        || (s <= 30.0 && v >= 200.0)
        // Gray (neutral)
        || (s <= 30.0 && (100.0..=180.0).contains(&v))
        // Red, wrapping around the hue circle
        || ((h <= 10.0 || h >= 170.0) && s >= 50.0 && v >= 50.0)
}

/// RGB → CIE Lab in the 8-bit encoding (L scaled to 0..255, a/b offset by 128)
fn rgb_to_lab_8bit(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    fn linearize(c: f32) -> f32 {
        if c > 0.040_45 {
            ((c + 0.055) / 1.055).powf(2.4)
        } else {
            c / 12.92
        }
    }
    fn f(t: f32) -> f32 {
        if t > 0.008_856 {
            t.cbrt()
        } else {
            7.787 * t + 16.0 / 116.0
        }
    }

    let r = linearize(f32::from(r) / 255.0);
    let g = linearize(f32::from(g) / 255.0);
    let b = linearize(f32::from(b) / 255.0);

    // sRGB → XYZ (D65), normalized by the white point
    let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / 0.950_456;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / 1.088_754;

    let fx = f(x);
    let fy = f(y);
    let fz = f(z);

    let l = if y > 0.008_856 {
        116.0 * y.cbrt() - 16.0
    } else {
        903.3 * y
    };
    let a = 500.0 * (fx - fy);
    let b_comp = 200.0 * (fy - fz);

    (l * 255.0 / 100.0, a + 128.0, b_comp + 128.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Portrait-like scene: skin blob plus dark clothing on a blue backdrop
    fn synthetic_scene(width: u32, height: u32) -> DynamicImage {
        let image = RgbImage::from_fn(width, height, |x, y| {
            let head = (width / 3..2 * width / 3).contains(&x)
                && (height / 6..height / 2).contains(&y);
            let torso = (width / 4..3 * width / 4).contains(&x) && y >= height / 2;
            if head {
                Rgb([205, 150, 120])
            } else if torso {
                Rgb([25, 25, 35])
            } else {
                Rgb([70, 100, 180])
            }
        });
        DynamicImage::ImageRgb8(image)
    }

    #[test]
    fn test_segment_dimensions_match_input() {
        let image = synthetic_scene(96, 96);
        let mut segmenter = ClassicalSegmenter::new(&RemovalConfig::default());
        let mask = segmenter.segment(&image).unwrap();
        assert_eq!(mask.dimensions, (96, 96));
    }

    #[test]
    fn test_segment_keeps_subject_drops_backdrop() {
        let image = synthetic_scene(96, 96);
        let mut segmenter = ClassicalSegmenter::new(&RemovalConfig::default());
        let mask = segmenter.segment(&image).unwrap();

        // Head interior should be foreground
        assert_eq!(mask.data[(30 * 96 + 48) as usize], 255);
        // Backdrop corners should be background
        assert_eq!(mask.data[(4 * 96 + 4) as usize], 0);
        assert_eq!(mask.data[(4 * 96 + 91) as usize], 0);
    }

    #[test]
    fn test_ycbcr_skin_ranges() {
        assert!(is_skin_ycbcr(205, 150, 120));
        assert!(!is_skin_ycbcr(70, 100, 180));
        assert!(!is_skin_ycbcr(0, 255, 0));
    }

    #[test]
    fn test_backdrop_color_ranges() {
        assert!(is_backdrop_color(70, 100, 180)); // blue
        assert!(is_backdrop_color(60, 200, 70)); // green
        assert!(is_backdrop_color(245, 245, 245)); // white
        assert!(is_backdrop_color(140, 140, 140)); // gray
        assert!(is_backdrop_color(200, 40, 40)); // red
        assert!(!is_backdrop_color(205, 150, 120)); // skin is not backdrop
    }

    #[test]
    fn test_clothing_ranges() {
        assert!(is_clothing_lab(25, 25, 35)); // dark navy
        assert!(is_clothing_lab(240, 235, 230)); // light beige
        assert!(!is_clothing_lab(0, 255, 0)); // saturated green
    }
}
