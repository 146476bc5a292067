//! Mock segmentation backends for testing the selector and pipeline
//!
//! These mocks let tests exercise the fallback chain and the pipeline
//! contract without any model files: constant-mask engines, engines whose
//! construction fails, and engines that fail at inference time.

use crate::error::{PhotoError, Result};
use crate::inference::SegmentationBackend;
use crate::types::SegmentationMask;
use image::DynamicImage;

/// Backend returning a constant-valued mask of the input dimensions
pub struct ConstantMaskBackend {
    name: &'static str,
    value: u8,
    closed: bool,
}

impl ConstantMaskBackend {
    #[must_use]
    pub fn new(name: &'static str, value: u8) -> Self {
        Self {
            name,
            value,
            closed: false,
        }
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl SegmentationBackend for ConstantMaskBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn segment(&mut self, image: &DynamicImage) -> Result<SegmentationMask> {
        if self.closed {
            return Err(PhotoError::inference("Backend already closed"));
        }
        Ok(SegmentationMask::filled(
            self.value,
            (image.width(), image.height()),
        ))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Backend whose `segment` always fails with an inference error
pub struct FailingInferenceBackend {
    name: &'static str,
}

impl FailingInferenceBackend {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl SegmentationBackend for FailingInferenceBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn segment(&mut self, _image: &DynamicImage) -> Result<SegmentationMask> {
        Err(PhotoError::inference(format!(
            "{} mock inference failure",
            self.name
        )))
    }
}

/// Construct a backend whose construction always fails
///
/// # Errors
/// Always returns `PhotoError::EngineUnavailable`.
pub fn failing_constructor(name: &'static str) -> Result<Box<dyn SegmentationBackend>> {
    Err(PhotoError::engine_unavailable(format!(
        "{name} mock construction failure"
    )))
}
