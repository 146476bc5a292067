//! Managed model-runtime segmentation strategy (Tract)
//!
//! Delegates the saliency task to the pure-Rust `tract` model runtime, the
//! managed/high-level counterpart of the direct tensor-runtime path. The
//! runtime abstraction may hand back something other than a per-pixel map
//! (classification-style output, empty tensors); in that case the strategy
//! degrades to a centered foreground rectangle instead of failing, logging
//! what the model actually returned.

use crate::config::RemovalConfig;
use crate::error::{PhotoError, Result};
use crate::inference::SegmentationBackend;
use crate::models::ModelManager;
use crate::types::{FaceRegion, SegmentationMask};
use crate::utils::{tensor_to_mask, ImagePreprocessor};
use image::DynamicImage;
use ndarray::Array4;
use tract_onnx::prelude::*;

/// Type alias for the runnable Tract model
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Fraction of the image covered by the degraded centered-rectangle mask
const FALLBACK_COVERAGE: (f64, f64) = (0.7, 0.9);

/// Neural segmentation through the managed Tract runtime
pub struct ManagedModelSegmenter {
    model: Option<TractModel>,
    model_manager: ModelManager,
    config: RemovalConfig,
    degraded: bool,
}

impl ManagedModelSegmenter {
    /// Resolve the model file and build the optimized runnable model
    ///
    /// # Errors
    /// - Model file absent or unreadable
    /// - Model parse or optimization failures
    pub fn new(config: &RemovalConfig) -> Result<Self> {
        let model_manager = ModelManager::resolve(config)?;
        let model_data = model_manager.load_model()?;

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| {
                PhotoError::engine_unavailable(format!("Failed to load model into runtime: {e}"))
            })?
            .into_optimized()
            .map_err(|e| {
                PhotoError::engine_unavailable(format!("Failed to optimize model: {e}"))
            })?
            .into_runnable()
            .map_err(|e| {
                PhotoError::engine_unavailable(format!("Failed to create runnable model: {e}"))
            })?;

        log::info!(
            "Managed model runtime ready (model: {})",
            model_manager.info()?.name
        );

        Ok(Self {
            model: Some(model),
            model_manager,
            config: config.clone(),
            degraded: false,
        })
    }

    /// Centered-rectangle mask used when the runtime output is unusable
    fn fallback_mask(width: u32, height: u32) -> SegmentationMask {
        let region = FaceRegion::centered(width, height, FALLBACK_COVERAGE.0, FALLBACK_COVERAGE.1)
            .clamp_to(width, height);
        let mut mask = SegmentationMask::filled(0, (width, height));
        for y in region.y as u32..region.y as u32 + region.height {
            for x in region.x as u32..region.x as u32 + region.width {
                mask.data[(y * width + x) as usize] = 255;
            }
        }
        mask
    }

    /// Run the model; `Ok(None)` means the output was not a usable pixel map
    fn infer(&mut self, input: Array4<f32>) -> Result<Option<Array4<f32>>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| PhotoError::inference("Managed model already closed"))?;

        let input_tensor = Tensor::from(input);
        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| PhotoError::inference(format!("Managed model inference failed: {e}")))?;

        let Some(output) = outputs.into_iter().next() else {
            log::warn!("Managed runtime returned no outputs");
            return Ok(None);
        };
        let output = output.into_arc_tensor();

        let view = output
            .to_array_view::<f32>()
            .map_err(|e| PhotoError::inference(format!("Failed to convert output tensor: {e}")))?;

        let shape = view.shape().to_vec();
        if shape.len() != 4 || shape.iter().any(|&d| d == 0) {
            // Classification-style or otherwise unusable output; log the
            // values for diagnostics before degrading
            let preview: Vec<f32> = view.iter().take(8).copied().collect();
            log::warn!(
                "Managed runtime output is not a pixel map (shape {shape:?}, leading values {preview:?})"
            );
            return Ok(None);
        }

        let dims = (shape[0], shape[1], shape[2], shape[3]);
        let array = Array4::from_shape_vec(dims, view.iter().copied().collect())
            .map_err(|e| PhotoError::inference(format!("Failed to reshape output tensor: {e}")))?;
        Ok(Some(array))
    }
}

impl SegmentationBackend for ManagedModelSegmenter {
    fn name(&self) -> &'static str {
        "managed"
    }

    fn segment(&mut self, image: &DynamicImage) -> Result<SegmentationMask> {
        self.degraded = false;
        let original_dimensions = (image.width(), image.height());
        let preprocessing_config = self.model_manager.preprocessing_config();

        let input = ImagePreprocessor::preprocess_for_inference(image, &preprocessing_config)?;

        let mask = match self.infer(input)? {
            Some(output) => tensor_to_mask(&output.view(), original_dimensions)?,
            None => {
                self.degraded = true;
                Self::fallback_mask(original_dimensions.0, original_dimensions.1)
            },
        };

        if self.config.debug {
            let _ = mask.save_png("debug_managed_mask.png");
        }

        crate::backends::secondary_refine(&image.to_rgb8(), mask, &self.config)
    }

    fn last_run_degraded(&self) -> bool {
        self.degraded
    }

    fn close(&mut self) {
        if self.model.take().is_some() {
            log::debug!("Released managed model runtime");
        }
    }
}
