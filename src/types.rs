//! Core value types shared across the pipeline
//!
//! A `SegmentationMask` is the single-channel confidence artifact every
//! strategy produces; a `FaceRegion` is a pixel rectangle anchored to one
//! specific image; a `RemovalResult` bundles the processed RGBA buffer with
//! the mask and processing metadata. Masks are produced fresh per call and
//! never shared between requests.

use crate::error::{PhotoError, Result};
use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Single-channel foreground confidence map
///
/// Values run from 0 (pure background) to 255 (pure foreground). Dimensions
/// always match the image the mask was produced from, except transiently
/// inside the neural postprocessing where the model-resolution map is resized
/// back up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Row-major confidence values, one byte per pixel
    pub data: Vec<u8>,
    /// Mask dimensions as (width, height)
    pub dimensions: (u32, u32),
}

/// Summary statistics over a mask
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    /// Pixels with confidence above 127
    pub foreground_pixels: usize,
    /// Total pixel count
    pub total_pixels: usize,
    /// Foreground fraction of the total
    pub foreground_ratio: f64,
    /// Mean confidence value
    pub mean_confidence: f64,
}

impl SegmentationMask {
    /// Create a mask from raw confidence values
    ///
    /// # Panics
    /// Panics when `data.len()` disagrees with the dimensions; masks are
    /// only constructed internally from buffers of the right size.
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        assert_eq!(
            data.len(),
            (dimensions.0 * dimensions.1) as usize,
            "mask buffer length must match dimensions"
        );
        Self { data, dimensions }
    }

    /// Create a mask filled with a constant confidence value
    #[must_use]
    pub fn filled(value: u8, dimensions: (u32, u32)) -> Self {
        Self {
            data: vec![value; (dimensions.0 * dimensions.1) as usize],
            dimensions,
        }
    }

    /// Wrap a grayscale image buffer as a mask
    #[must_use]
    pub fn from_image(image: &GrayImage) -> Self {
        Self {
            dimensions: image.dimensions(),
            data: image.as_raw().clone(),
        }
    }

    /// View the mask as a grayscale image buffer
    ///
    /// # Errors
    /// Returns `PhotoError::Internal` when the buffer length does not match
    /// the dimensions (only possible through direct field manipulation).
    pub fn to_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        GrayImage::from_raw(width, height, self.data.clone()).ok_or_else(|| {
            PhotoError::internal(format!(
                "Mask buffer of {} bytes does not fit {width}x{height}",
                self.data.len()
            ))
        })
    }

    /// Resize the mask to new dimensions with bilinear interpolation
    ///
    /// # Errors
    /// Returns `PhotoError::InvalidInput` for zero target dimensions.
    pub fn resize(&self, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PhotoError::invalid_input(format!(
                "Cannot resize mask to {width}x{height}"
            )));
        }
        let resized = image::imageops::resize(
            &self.to_image()?,
            width,
            height,
            image::imageops::FilterType::Triangle,
        );
        Ok(Self::from_image(&resized))
    }

    /// Compute summary statistics for diagnostics and debug artifacts
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&v| v > 127).count();
        let sum: u64 = self.data.iter().map(|&v| u64::from(v)).sum();
        MaskStatistics {
            foreground_pixels,
            total_pixels,
            foreground_ratio: if total_pixels > 0 {
                foreground_pixels as f64 / total_pixels as f64
            } else {
                0.0
            },
            mean_confidence: if total_pixels > 0 {
                sum as f64 / total_pixels as f64
            } else {
                0.0
            },
        }
    }

    /// Save the mask as a PNG debug artifact
    ///
    /// # Errors
    /// Propagates buffer conversion and file I/O failures.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_image()?.save(path.as_ref())?;
        Ok(())
    }
}

/// Pixel rectangle in the coordinate system of one specific image
///
/// The origin is signed so intermediate arithmetic (padding around a face
/// near the image edge) can go negative before [`FaceRegion::clamp_to`]
/// brings the rectangle back in bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    #[must_use]
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle centered on an image, covering the given fraction of each axis
    #[must_use]
    pub fn centered(image_width: u32, image_height: u32, frac_width: f64, frac_height: f64) -> Self {
        let width = (f64::from(image_width) * frac_width).round() as u32;
        let height = (f64::from(image_height) * frac_height).round() as u32;
        Self {
            x: i64::from(image_width / 2) - i64::from(width / 2),
            y: i64::from(image_height / 2) - i64::from(height / 2),
            width,
            height,
        }
    }

    /// Center point of the rectangle
    #[must_use]
    pub fn center(&self) -> (i64, i64) {
        (
            self.x + i64::from(self.width) / 2,
            self.y + i64::from(self.height) / 2,
        )
    }

    /// Clamp the rectangle fully inside an image of the given dimensions
    ///
    /// The result always satisfies `0 <= x`, `x + width <= image_width` and
    /// the same on the vertical axis; a rectangle entirely outside the image
    /// collapses to zero size at the nearest edge.
    #[must_use]
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Self {
        let x0 = self.x.clamp(0, i64::from(image_width));
        let y0 = self.y.clamp(0, i64::from(image_height));
        let x1 = (self.x + i64::from(self.width)).clamp(x0, i64::from(image_width));
        let y1 = (self.y + i64::from(self.height)).clamp(y0, i64::from(image_height));
        Self {
            x: x0,
            y: y0,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        }
    }

    /// Whether the rectangle covers no pixels
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Per-stage wall-clock timings in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    pub decode_ms: u64,
    pub face_detection_ms: u64,
    pub segmentation_ms: u64,
    pub refinement_ms: u64,
    pub compositing_ms: u64,
    pub crop_ms: u64,
    pub total_ms: u64,
}

/// Metadata recorded alongside a processed image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Name of the segmentation strategy that actually ran
    pub strategy: String,
    /// Whether the strategy degraded to a heuristic-only mask
    pub degraded: bool,
    /// When processing finished
    pub timestamp: DateTime<Utc>,
    /// Per-stage timings
    pub timings: ProcessingTimings,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            degraded: false,
            timestamp: Utc::now(),
            timings: ProcessingTimings::default(),
        }
    }
}

/// Result of a background removal operation
///
/// Carries the RGBA image with the matte applied as its alpha channel, the
/// refined mask it was derived from, and processing metadata.
#[derive(Debug, Clone)]
pub struct RemovalResult {
    image: RgbaImage,
    /// Refined segmentation mask at image resolution
    pub mask: SegmentationMask,
    /// Strategy name, degradation flag and timings
    pub metadata: ProcessingMetadata,
}

impl RemovalResult {
    #[must_use]
    pub fn new(image: RgbaImage, mask: SegmentationMask, metadata: ProcessingMetadata) -> Self {
        Self {
            image,
            mask,
            metadata,
        }
    }

    /// The processed RGBA image
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Consume the result, keeping only the RGBA image
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Output dimensions as (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Encode the processed image as PNG bytes
    ///
    /// # Errors
    /// Propagates PNG encoding failures.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(self.image.clone())
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(bytes)
    }

    /// Save the processed image as a PNG file
    ///
    /// # Errors
    /// Propagates file I/O and encoding failures.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image.save(path.as_ref())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_construction_and_statistics() {
        let mask = SegmentationMask::filled(255, (10, 10));
        assert_eq!(mask.dimensions, (10, 10));
        assert_eq!(mask.data.len(), 100);

        let stats = mask.statistics();
        assert_eq!(stats.foreground_pixels, 100);
        assert!((stats.foreground_ratio - 1.0).abs() < f64::EPSILON);
        assert!((stats.mean_confidence - 255.0).abs() < f64::EPSILON);

        let empty = SegmentationMask::filled(0, (10, 10));
        assert_eq!(empty.statistics().foreground_pixels, 0);
    }

    #[test]
    fn test_mask_image_roundtrip() {
        let mask = SegmentationMask::new((0..=255).collect(), (16, 16));
        let image = mask.to_image().unwrap();
        let back = SegmentationMask::from_image(&image);
        assert_eq!(mask, back);
    }

    #[test]
    fn test_mask_resize() {
        let mask = SegmentationMask::filled(200, (8, 8));
        let resized = mask.resize(32, 16).unwrap();
        assert_eq!(resized.dimensions, (32, 16));
        assert!(resized.data.iter().all(|&v| v == 200));

        assert!(mask.resize(0, 16).is_err());
    }

    #[test]
    fn test_face_region_centered() {
        let region = FaceRegion::centered(120, 80, 0.25, 0.25);
        assert_eq!(region.width, 30);
        assert_eq!(region.height, 20);
        assert_eq!(region.center(), (60, 40));
    }

    #[test]
    fn test_face_region_clamping() {
        // Negative origin clamps to the edge, keeping the in-bounds part
        let region = FaceRegion::new(-10, -5, 40, 30).clamp_to(100, 100);
        assert_eq!(region, FaceRegion::new(0, 0, 30, 25));

        // Overhang on the far side is trimmed
        let region = FaceRegion::new(80, 90, 40, 30).clamp_to(100, 100);
        assert_eq!(region, FaceRegion::new(80, 90, 20, 10));

        // Entirely outside collapses to empty
        let region = FaceRegion::new(200, 200, 10, 10).clamp_to(100, 100);
        assert!(region.is_empty());

        // Fully inside is untouched
        let region = FaceRegion::new(10, 10, 20, 20);
        assert_eq!(region.clamp_to(100, 100), region);
    }

    #[test]
    fn test_removal_result_png_roundtrip() {
        let image = RgbaImage::from_pixel(6, 4, image::Rgba([10, 20, 30, 128]));
        let mask = SegmentationMask::filled(128, (6, 4));
        let result = RemovalResult::new(image, mask, ProcessingMetadata::new("classical"));

        assert_eq!(result.dimensions(), (6, 4));
        let bytes = result.to_png_bytes().unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 6);
        assert_eq!(decoded.height(), 4);
    }

    #[test]
    fn test_metadata_serializes() {
        let mut metadata = ProcessingMetadata::new("neural");
        metadata.timings.segmentation_ms = 42;
        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains("\"neural\""));
        assert!(json.contains("42"));
    }
}
