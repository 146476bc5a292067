//! Mask refinement and alpha matte generation
//!
//! A raw mask from any strategy goes through the same cleanup: binary
//! threshold, morphological close (fill small holes) then open (remove
//! speckle), and optional smoothing restricted to a narrow band around the
//! boundary so the interior stays fully opaque and the exterior fully
//! transparent. Matte generation applies the configured edge policy.

use crate::config::{EdgePolicy, RefinementParams};
use crate::error::Result;
use crate::types::SegmentationMask;
use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::filter::{gaussian_blur_f32, laplacian_filter};
use imageproc::morphology::{close, dilate, erode, open};

/// Weight of the gradient-blurred component in the smooth matte blend
const SMOOTH_BLUR_WEIGHT: f32 = 0.7;
/// Weight of the binary component in the smooth matte blend
const SMOOTH_BINARY_WEIGHT: f32 = 0.3;

/// Morphological cleanup and matte generation for raw segmentation masks
#[derive(Debug, Clone, Default)]
pub struct MaskRefiner {
    params: RefinementParams,
    edge_policy: EdgePolicy,
}

impl MaskRefiner {
    /// Create a refiner with the given tuning and edge policy
    #[must_use]
    pub fn new(params: RefinementParams, edge_policy: EdgePolicy) -> Self {
        Self {
            params,
            edge_policy,
        }
    }

    /// Clean up a raw mask: threshold, close, open, boundary smoothing
    ///
    /// # Errors
    /// Propagates buffer conversion failures for malformed masks.
    pub fn refine(&self, raw_mask: &SegmentationMask) -> Result<SegmentationMask> {
        let gray = raw_mask.to_image()?;

        let binary = threshold_binary(&gray, self.params.threshold);
        let cleaned = open(
            &close(&binary, Norm::LInf, self.params.kernel_radius),
            Norm::LInf,
            self.params.kernel_radius,
        );

        let result = if self.params.band_radius > 0 {
            smooth_boundary_band(&cleaned, self.params.band_radius, self.params.blur_sigma)
        } else {
            cleaned
        };

        Ok(SegmentationMask::from_image(&result))
    }

    /// Turn a refined mask into an alpha matte per the edge policy
    ///
    /// Hard policy passes the binary mask through; smooth policy blends a
    /// Laplacian-gradient-weighted blur with the binary mask (70/30).
    ///
    /// # Errors
    /// Propagates buffer conversion failures for malformed masks.
    pub fn to_alpha_matte(&self, mask: &SegmentationMask) -> Result<SegmentationMask> {
        let gray = mask.to_image()?;
        let binary = threshold_binary(&gray, self.params.threshold);

        let matte = match self.edge_policy {
            EdgePolicy::Hard => binary,
            EdgePolicy::Smooth => smooth_matte(&binary, self.params.blur_sigma),
        };

        Ok(SegmentationMask::from_image(&matte))
    }
}

/// Binary threshold: values above `thresh` become 255, the rest 0
fn threshold_binary(image: &GrayImage, thresh: u8) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = if pixel[0] > thresh { 255 } else { 0 };
    }
    out
}

/// Blur only a narrow band around the mask boundary
///
/// The band is dilate(mask) − erode(mask); inside it the blurred mask is
/// used, everywhere else the binary values are kept untouched.
fn smooth_boundary_band(binary: &GrayImage, band_radius: u8, sigma: f32) -> GrayImage {
    let dilated = dilate(binary, Norm::LInf, band_radius);
    let eroded = erode(binary, Norm::LInf, band_radius);
    let blurred = gaussian_blur_f32(binary, sigma);

    let mut out = binary.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let in_band = dilated.get_pixel(x, y)[0] != eroded.get_pixel(x, y)[0];
        if in_band {
            pixel[0] = blurred.get_pixel(x, y)[0];
        }
    }
    out
}

/// Smooth matte: gradient-weighted blur blended with the binary mask
fn smooth_matte(binary: &GrayImage, sigma: f32) -> GrayImage {
    let blurred = gaussian_blur_f32(binary, sigma);
    let gradient = laplacian_filter(binary);

    let mut out = binary.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let gradient_magnitude = f32::from(gradient.get_pixel(x, y)[0].unsigned_abs().min(255) as u8) / 255.0;
        let blurred_value = f32::from(blurred.get_pixel(x, y)[0]);
        let binary_value = f32::from(binary.get_pixel(x, y)[0]);

        // Blur dominates near edges, binary dominates flat regions
        let edge_component =
            gradient_magnitude * blurred_value + (1.0 - gradient_magnitude) * binary_value;
        let blended = SMOOTH_BLUR_WEIGHT * edge_component + SMOOTH_BINARY_WEIGHT * binary_value;
        pixel[0] = blended.round().clamp(0.0, 255.0) as u8;
    }
    out
}
