//! Segmentation backend abstraction

use crate::error::Result;
use crate::types::SegmentationMask;
use image::DynamicImage;

/// Capability interface for segmentation strategies
///
/// Every strategy produces a raw foreground mask with the same dimensions as
/// the input image. Construction is where expensive resources (model files,
/// inference sessions) are acquired; `segment` must not allocate anything
/// that outlives the call.
pub trait SegmentationBackend: Send {
    /// Short strategy name for logging and result metadata
    fn name(&self) -> &'static str;

    /// Produce a raw foreground mask for the image
    ///
    /// # Errors
    /// - Inference failures on an already-constructed engine
    /// - Tensor conversion or shape mismatches
    fn segment(&mut self, image: &DynamicImage) -> Result<SegmentationMask>;

    /// Whether the last `segment` call degraded to a heuristic-only mask
    /// after an internal refinement step failed. Not an error condition.
    fn last_run_degraded(&self) -> bool {
        false
    }

    /// Release any owned engine resource
    ///
    /// Dropping the backend has the same effect; `close` exists so the
    /// selector can release engines deterministically on shutdown.
    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::ConstantMaskBackend;
    use image::RgbImage;

    #[test]
    fn test_backend_trait_object() {
        let mut backend: Box<dyn SegmentationBackend> =
            Box::new(ConstantMaskBackend::new("constant", 200));
        let image = DynamicImage::ImageRgb8(RgbImage::new(8, 6));
        let mask = backend.segment(&image).unwrap();
        assert_eq!(mask.dimensions, (8, 6));
        assert!(mask.data.iter().all(|&v| v == 200));
        assert!(!backend.last_run_degraded());
        backend.close();
    }
}
