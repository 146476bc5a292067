//! Face-anchored cropping to a physical passport format
//!
//! The crop rectangle is sized from the detected face with a fixed padding
//! multiple, forced to the target aspect ratio, centered on the face and
//! clamped into the image. The extracted region is then resized to the exact
//! pixel dimensions the format demands. This resize is the only place in the
//! pipeline allowed to change aspect ratio: it maps a fixed crop onto a fixed
//! physical output.

use crate::config::PhotoFormat;
use crate::error::{PhotoError, Result};
use crate::types::FaceRegion;
use image::DynamicImage;

/// Horizontal padding multiple applied to the face width
const FACE_WIDTH_PADDING: f64 = 2.5;
/// Minimum vertical padding multiple applied to the face height
const FACE_HEIGHT_PADDING: f64 = 2.0;

/// Exact pixel dimensions for a photo format
///
/// Per axis: `round(physical_size × dpi / unit_to_inch_factor)`. The common
/// 35×45 mm format at 300 DPI yields 413×531 pixels.
#[must_use]
pub fn target_pixel_size(format: &PhotoFormat) -> (u32, u32) {
    let factor = format.unit().to_inch_factor();
    let dpi = f64::from(format.dpi());
    let width = (format.width() * dpi / factor).round() as u32;
    let height = (format.height() * dpi / factor).round() as u32;
    (width, height)
}

/// Face-anchored cropper for passport formats
#[derive(Debug, Clone, Copy)]
pub struct PassportCropper {
    width_padding: f64,
    height_padding: f64,
}

impl Default for PassportCropper {
    fn default() -> Self {
        Self {
            width_padding: FACE_WIDTH_PADDING,
            height_padding: FACE_HEIGHT_PADDING,
        }
    }
}

impl PassportCropper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the crop rectangle for a face at the target aspect ratio
    ///
    /// The rectangle contains the face with the configured padding, keeps
    /// the aspect ratio `aspect = width / height`, is centered on the face
    /// center, and is clamped to the image bounds. When clamping would break
    /// the aspect ratio, both dimensions shrink proportionally instead.
    ///
    /// # Errors
    /// Returns `PhotoError::Geometry` for empty face rectangles or when no
    /// non-empty crop fits the image.
    pub fn crop_rectangle(
        &self,
        image_width: u32,
        image_height: u32,
        face: &FaceRegion,
        aspect: f64,
    ) -> Result<FaceRegion> {
        if face.is_empty() {
            return Err(PhotoError::geometry(
                "Face rectangle is empty, cannot anchor a crop",
            ));
        }
        if image_width == 0 || image_height == 0 {
            return Err(PhotoError::geometry("Image has zero dimensions"));
        }
        if aspect <= 0.0 || !aspect.is_finite() {
            return Err(PhotoError::geometry(format!(
                "Target aspect ratio must be positive and finite, got {aspect}"
            )));
        }

        // Width from the face padding, height from the aspect ratio; grow the
        // height when it would not contain the padded face
        let mut crop_width = f64::from(face.width) * self.width_padding;
        let mut crop_height = crop_width / aspect;
        let min_height = f64::from(face.height) * self.height_padding;
        if crop_height < min_height {
            crop_height = min_height;
            crop_width = crop_height * aspect;
        }

        // Shrink proportionally until the rectangle fits the image
        let fit = (f64::from(image_width) / crop_width)
            .min(f64::from(image_height) / crop_height)
            .min(1.0);
        crop_width *= fit;
        crop_height *= fit;

        let width = (crop_width.round() as u32).min(image_width).max(1);
        let height = (crop_height.round() as u32).min(image_height).max(1);

        let (face_cx, face_cy) = face.center();
        let x = (face_cx - i64::from(width) / 2).clamp(0, i64::from(image_width - width));
        let y = (face_cy - i64::from(height) / 2).clamp(0, i64::from(image_height - height));

        let rect = FaceRegion::new(x, y, width, height);
        if rect.is_empty() {
            return Err(PhotoError::geometry(format!(
                "Crop rectangle collapsed for face {}x{} in image {image_width}x{image_height}",
                face.width, face.height
            )));
        }
        Ok(rect)
    }

    /// Crop around the face and resize to the format's exact pixel size
    ///
    /// # Errors
    /// - `PhotoError::Geometry` when no crop rectangle fits (see
    ///   [`Self::crop_rectangle`])
    /// - `PhotoError::InvalidInput` for empty images
    pub fn crop(
        &self,
        image: &DynamicImage,
        face: &FaceRegion,
        format: &PhotoFormat,
    ) -> Result<DynamicImage> {
        let (image_width, image_height) = (image.width(), image.height());
        if image_width == 0 || image_height == 0 {
            return Err(PhotoError::invalid_input("Cannot crop an empty image"));
        }

        let (target_width, target_height) = target_pixel_size(format);
        let aspect = f64::from(target_width) / f64::from(target_height);
        let rect = self.crop_rectangle(image_width, image_height, face, aspect)?;

        log::debug!(
            "Cropping {}x{} at ({}, {}) for target {target_width}x{target_height}",
            rect.width,
            rect.height,
            rect.x,
            rect.y
        );

        let region = image.crop_imm(rect.x as u32, rect.y as u32, rect.width, rect.height);
        Ok(region.resize_exact(
            target_width,
            target_height,
            image::imageops::FilterType::CatmullRom,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Unit;
    use image::RgbImage;

    fn passport() -> PhotoFormat {
        PhotoFormat::passport_35x45()
    }

    #[test]
    fn test_target_pixel_size_formula() {
        // 35mm × 300 / 25.4 = 413.38 → 413; 45mm × 300 / 25.4 = 531.49 → 531
        assert_eq!(target_pixel_size(&passport()), (413, 531));

        let visa = PhotoFormat::visa_2x2();
        assert_eq!(target_pixel_size(&visa), (600, 600));

        let cm = PhotoFormat::new(5.0, 7.0, Unit::Cm, 300).unwrap();
        assert_eq!(target_pixel_size(&cm), (591, 827));

        let low_dpi = PhotoFormat::new(35.0, 45.0, Unit::Mm, 72).unwrap();
        assert_eq!(target_pixel_size(&low_dpi), (99, 128));
    }

    #[test]
    fn test_crop_rectangle_contains_face() {
        let cropper = PassportCropper::new();
        let face = FaceRegion::new(400, 300, 100, 120);
        let rect = cropper.crop_rectangle(1000, 1000, &face, 413.0 / 531.0).unwrap();

        // Padded rectangle fully contains the face
        assert!(rect.x <= face.x);
        assert!(rect.y <= face.y);
        assert!(rect.x + i64::from(rect.width) >= face.x + i64::from(face.width));
        assert!(rect.y + i64::from(rect.height) >= face.y + i64::from(face.height));

        // And keeps the target aspect ratio
        let aspect = f64::from(rect.width) / f64::from(rect.height);
        assert!((aspect - 413.0 / 531.0).abs() < 0.02);
    }

    #[test]
    fn test_crop_rectangle_stays_in_bounds_at_edges() {
        let cropper = PassportCropper::new();
        let corners = [
            FaceRegion::new(0, 0, 80, 80),
            FaceRegion::new(520, 0, 80, 80),
            FaceRegion::new(0, 420, 80, 80),
            FaceRegion::new(520, 420, 80, 80),
        ];
        for face in corners {
            let rect = cropper.crop_rectangle(600, 500, &face, 0.8).unwrap();
            assert!(rect.x >= 0);
            assert!(rect.y >= 0);
            assert!(rect.x + i64::from(rect.width) <= 600);
            assert!(rect.y + i64::from(rect.height) <= 500);
            assert!(!rect.is_empty());
        }
    }

    #[test]
    fn test_crop_rectangle_shrinks_proportionally() {
        let cropper = PassportCropper::new();
        // Face so large the padded crop cannot fit; both axes must shrink
        let face = FaceRegion::new(50, 50, 200, 200);
        let rect = cropper.crop_rectangle(300, 300, &face, 1.0).unwrap();
        assert_eq!(rect.width, 300);
        assert_eq!(rect.height, 300);
    }

    #[test]
    fn test_crop_resizes_to_exact_format_size() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(1000, 1200));
        let face = FaceRegion::new(450, 350, 120, 140);
        let out = PassportCropper::new().crop(&image, &face, &passport()).unwrap();
        assert_eq!((out.width(), out.height()), (413, 531));
    }

    #[test]
    fn test_crop_face_at_edge_does_not_fail() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(400, 500));
        let face = FaceRegion::new(360, 10, 60, 70);
        let out = PassportCropper::new().crop(&image, &face, &passport()).unwrap();
        assert_eq!((out.width(), out.height()), (413, 531));
    }

    #[test]
    fn test_empty_face_is_geometry_error() {
        let cropper = PassportCropper::new();
        let face = FaceRegion::new(10, 10, 0, 0);
        let err = cropper.crop_rectangle(100, 100, &face, 1.0).unwrap_err();
        assert!(matches!(err, PhotoError::Geometry(_)));
    }
}
