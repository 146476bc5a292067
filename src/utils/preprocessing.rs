//! Image ↔ tensor conversion shared by the neural backends
//!
//! Preprocessing stretches the image to the model input size with bilinear
//! interpolation, normalizes channel values to [0,1] and lays the result out
//! channel-first with a batch dimension. Postprocessing takes the first
//! output map, min-max normalizes it and resizes it back to the source
//! dimensions, again with bilinear interpolation.

use crate::error::{PhotoError, Result};
use crate::models::PreprocessingConfig;
use crate::types::SegmentationMask;
use image::DynamicImage;
use ndarray::{Array4, ArrayView4};

/// Shared image preprocessing for tensor-based segmentation
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an image into an NCHW f32 tensor for inference
    ///
    /// # Errors
    /// Returns `PhotoError::InvalidInput` for empty images.
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let [target_width, target_height] = preprocessing_config.target_size;
        if image.width() == 0 || image.height() == 0 {
            return Err(PhotoError::invalid_input(
                "Cannot preprocess an empty image",
            ));
        }

        let rgb_image = image.to_rgb8();
        let resized = image::imageops::resize(
            &rgb_image,
            target_width,
            target_height,
            image::imageops::FilterType::Triangle,
        );

        let width = target_width as usize;
        let height = target_height as usize;
        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        let mut tensor = Array4::<f32>::zeros((1, 3, height, width));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for channel in 0..3 {
                let value = f32::from(pixel[channel]) / 255.0;
                tensor[[0, channel, y, x]] = (value - mean[channel]) / std[channel];
            }
        }

        Ok(tensor)
    }

    /// Enforce the exact expected tensor shape and element type
    ///
    /// The element type is fixed to `f32` by construction; a tensor whose
    /// shape disagrees with the expectation is reshaped as a last resort
    /// when the element counts match.
    pub fn enforce_input_shape(
        tensor: Array4<f32>,
        expected: (usize, usize, usize, usize),
    ) -> Result<Array4<f32>> {
        let (n, c, h, w) = expected;
        let shape = tensor.dim();
        if shape == (n, c, h, w) {
            return Ok(tensor);
        }

        let actual_len = shape.0 * shape.1 * shape.2 * shape.3;
        if actual_len != n * c * h * w {
            return Err(PhotoError::processing(format!(
                "Input tensor shape {shape:?} incompatible with expected {expected:?}"
            )));
        }

        log::debug!("Reshaping input tensor from {shape:?} to {expected:?}");
        let (data, _) = tensor.into_raw_vec_and_offset();
        Array4::from_shape_vec((n, c, h, w), data)
            .map_err(|e| PhotoError::processing(format!("Failed to reshape input tensor: {e}")))
    }
}

/// Convert a raw saliency output tensor into a full-resolution mask
///
/// Takes the first output map (batch 0, channel 0), min-max normalizes it to
/// [0,1], scales to [0,255] and resizes to the original image dimensions.
///
/// # Errors
/// Returns `PhotoError::Processing` for tensors without a leading 1×1 map.
pub fn tensor_to_mask(
    tensor: &ArrayView4<'_, f32>,
    original_dimensions: (u32, u32),
) -> Result<SegmentationMask> {
    let shape = tensor.dim();
    if shape.0 < 1 || shape.1 < 1 || shape.2 == 0 || shape.3 == 0 {
        return Err(PhotoError::processing(format!(
            "Invalid output tensor shape {shape:?}"
        )));
    }

    let map_height = shape.2;
    let map_width = shape.3;

    // Min-max normalization over the first output map
    let mut min_value = f32::MAX;
    let mut max_value = f32::MIN;
    for y in 0..map_height {
        for x in 0..map_width {
            let value = tensor[[0, 0, y, x]];
            min_value = min_value.min(value);
            max_value = max_value.max(value);
        }
    }
    let range = max_value - min_value;

    let mut data = Vec::with_capacity(map_width * map_height);
    for y in 0..map_height {
        for x in 0..map_width {
            let value = tensor[[0, 0, y, x]];
            let normalized = if range > f32::EPSILON {
                (value - min_value) / range
            } else {
                // Flat response: treat everything as foreground confidence 1
                1.0
            };
            data.push((normalized.clamp(0.0, 1.0) * 255.0) as u8);
        }
    }

    let mask = SegmentationMask::new(data, (map_width as u32, map_height as u32));
    let (orig_width, orig_height) = original_dimensions;
    if (orig_width, orig_height) == (map_width as u32, map_height as u32) {
        Ok(mask)
    } else {
        mask.resize(orig_width, orig_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn test_config() -> PreprocessingConfig {
        PreprocessingConfig::default()
    }

    fn red_image(width: u32, height: u32) -> DynamicImage {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(width, height, Rgb([255, 0, 0]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_preprocess_shape_and_normalization() {
        let tensor =
            ImagePreprocessor::preprocess_for_inference(&red_image(100, 60), &test_config())
                .unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 320, 320]);

        // Red channel normalized to 1.0, green/blue to 0.0
        assert!((tensor[[0, 0, 160, 160]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 1, 160, 160]].abs() < 1e-6);
        assert!(tensor[[0, 2, 160, 160]].abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_rejects_empty_image() {
        let empty = DynamicImage::ImageRgb8(ImageBuffer::new(0, 0));
        assert!(ImagePreprocessor::preprocess_for_inference(&empty, &test_config()).is_err());
    }

    #[test]
    fn test_enforce_input_shape_passthrough_and_reject() {
        let tensor = Array4::<f32>::zeros((1, 3, 320, 320));
        let same = ImagePreprocessor::enforce_input_shape(tensor, (1, 3, 320, 320)).unwrap();
        assert_eq!(same.dim(), (1, 3, 320, 320));

        let wrong = Array4::<f32>::zeros((1, 3, 100, 100));
        assert!(ImagePreprocessor::enforce_input_shape(wrong, (1, 3, 320, 320)).is_err());
    }

    #[test]
    fn test_tensor_to_mask_min_max_scaling() {
        let mut tensor = Array4::<f32>::zeros((1, 1, 4, 4));
        tensor[[0, 0, 0, 0]] = -2.0;
        tensor[[0, 0, 3, 3]] = 6.0;
        let mask = tensor_to_mask(&tensor.view(), (4, 4)).unwrap();
        assert_eq!(mask.dimensions, (4, 4));
        assert_eq!(mask.data[0], 0);
        assert_eq!(*mask.data.last().unwrap(), 255);
    }

    #[test]
    fn test_tensor_to_mask_resizes_to_original() {
        let tensor = Array4::<f32>::from_elem((1, 1, 8, 8), 0.5);
        let mask = tensor_to_mask(&tensor.view(), (32, 16)).unwrap();
        assert_eq!(mask.dimensions, (32, 16));
        // Flat map normalizes to full foreground confidence
        assert!(mask.data.iter().all(|&v| v == 255));
    }
}
