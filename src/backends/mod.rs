//! Segmentation strategy implementations
//!
//! Three structurally different engines produce the same artifact, a raw
//! foreground mask: a classical color/morphology heuristic, a direct
//! tensor-runtime path and a managed pretrained-model runtime. The
//! processor's fallback chain decides which one actually runs.

pub mod classical;
pub mod grabcut;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

pub mod test_utils;

pub use classical::ClassicalSegmenter;

#[cfg(feature = "onnx")]
pub use onnx::NeuralTensorSegmenter;

#[cfg(feature = "tract")]
pub use tract::ManagedModelSegmenter;

use crate::config::RemovalConfig;
use crate::error::Result;
use crate::types::{FaceRegion, SegmentationMask};
use grabcut::{GrabCutParams, Trimap};
use image::RgbImage;

/// Secondary graph-cut refinement over a strategy's raw mask
///
/// Runs only outside portrait mode: general photos benefit from a second
/// labeling pass seeded by the raw mask plus a centered probable-foreground
/// rectangle. Failure keeps the raw mask (logged, never an error).
pub(crate) fn secondary_refine(
    image: &RgbImage,
    mask: SegmentationMask,
    config: &RemovalConfig,
) -> Result<SegmentationMask> {
    if config.portrait {
        return Ok(mask);
    }

    let (width, height) = image.dimensions();
    let mut trimap = Trimap::from_mask(&mask, 200, 100, 30);

    // Centered subject prior, positioned high to account for the head
    let prior_width = (f64::from(width) * 0.6) as u32;
    let prior_height = (f64::from(height) * 0.8) as u32;
    let prior = FaceRegion::new(
        i64::from(width / 2) - i64::from(prior_width / 2),
        i64::from(height / 2) - i64::from(prior_height / 2),
        prior_width,
        prior_height,
    )
    .clamp_to(width, height);
    trimap.mark_probable_foreground(&prior);

    match grabcut::run_with_sample_injection(image, &mut trimap, &GrabCutParams::default()) {
        Ok(refined) => Ok(refined),
        Err(err) => {
            log::warn!("Secondary graph-cut refinement failed, keeping raw mask: {err}");
            Ok(mask)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_secondary_refine_noop_in_portrait_mode() {
        let image = RgbImage::from_pixel(32, 32, Rgb([128, 128, 128]));
        let mask = SegmentationMask::filled(255, (32, 32));
        let config = RemovalConfig::default();
        assert!(config.portrait);

        let out = secondary_refine(&image, mask.clone(), &config).unwrap();
        assert_eq!(out.data, mask.data);
    }

    #[test]
    fn test_secondary_refine_runs_outside_portrait_mode() {
        let image = RgbImage::from_fn(64, 64, |x, y| {
            if (20..44).contains(&x) && (16..56).contains(&y) {
                Rgb([210, 170, 140])
            } else {
                Rgb([40, 60, 120])
            }
        });
        let mut mask = SegmentationMask::filled(0, (64, 64));
        for y in 20..52u32 {
            for x in 24..40u32 {
                mask.data[(y * 64 + x) as usize] = 255;
            }
        }

        let mut config = RemovalConfig::default();
        config.portrait = false;

        let out = secondary_refine(&image, mask, &config).unwrap();
        assert_eq!(out.dimensions, (64, 64));
        // Subject center survives refinement
        assert_eq!(out.data[(32 * 64 + 32) as usize], 255);
    }
}
