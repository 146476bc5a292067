//! Direct tensor-runtime segmentation strategy (ONNX Runtime)
//!
//! Runs a fixed-resolution saliency model through an `ort` session without
//! any higher-level model-zoo machinery. Construction loads the externally
//! provisioned model file and builds the session; both can fail, which the
//! selector recovers from by falling back to the next candidate.

use crate::config::RemovalConfig;
use crate::error::{PhotoError, Result};
use crate::inference::SegmentationBackend;
use crate::models::ModelManager;
use crate::types::SegmentationMask;
use crate::utils::{tensor_to_mask, ImagePreprocessor};
use image::DynamicImage;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;

/// Neural segmentation over a direct ONNX Runtime session
pub struct NeuralTensorSegmenter {
    session: Option<Session>,
    model_manager: ModelManager,
    config: RemovalConfig,
}

impl NeuralTensorSegmenter {
    /// Resolve the model file and build the inference session
    ///
    /// # Errors
    /// - Model file absent or unreadable
    /// - Session construction failures
    pub fn new(config: &RemovalConfig) -> Result<Self> {
        let model_manager = ModelManager::resolve(config)?;
        let model_data = model_manager.load_model()?;
        let model_info = model_manager.info()?;

        log::debug!(
            "Initializing tensor-runtime engine with model '{}' ({} bytes)",
            model_info.name,
            model_info.size_bytes
        );

        let session = Session::builder()
            .map_err(|e| {
                PhotoError::engine_unavailable(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level1)
            .map_err(|e| {
                PhotoError::engine_unavailable(format!("Failed to set optimization level: {e}"))
            })?
            .with_memory_pattern(true)
            .map_err(|e| {
                PhotoError::engine_unavailable(format!(
                    "Failed to enable memory pattern optimization: {e}"
                ))
            })?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                PhotoError::engine_unavailable(format!(
                    "Failed to create session from model data: {e}"
                ))
            })?;

        log::info!(
            "Tensor-runtime engine ready (model: {}, input {:?})",
            model_info.name,
            model_info.input_shape
        );

        Ok(Self {
            session: Some(session),
            model_manager,
            config: config.clone(),
        })
    }

    /// Run the session and return the raw output as a 4D tensor
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| PhotoError::inference("Inference session already closed"))?;

        let input_value = Value::from_array(input.clone())
            .map_err(|e| PhotoError::inference(format!("Failed to convert input tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| PhotoError::inference(format!("ONNX inference failed: {e}")))?;

        // First output tensor, accessed positionally
        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| PhotoError::inference("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| PhotoError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| PhotoError::inference(format!("Failed to extract output tensor: {e}")))?;

        let shape: Vec<usize> = output_tensor.shape().to_vec();
        let (data, _) = output_tensor.to_owned().into_raw_vec_and_offset();

        // Expect (N, C, H, W); accept (C, H, W) by restoring the batch axis
        let dims = match shape.as_slice() {
            [n, c, h, w] => (*n, *c, *h, *w),
            [c, h, w] => (1, *c, *h, *w),
            other => {
                return Err(PhotoError::inference(format!(
                    "Expected 4D output tensor, got shape {other:?}"
                )));
            },
        };

        Array4::from_shape_vec(dims, data)
            .map_err(|e| PhotoError::inference(format!("Failed to reshape output tensor: {e}")))
    }
}

impl SegmentationBackend for NeuralTensorSegmenter {
    fn name(&self) -> &'static str {
        "neural"
    }

    fn segment(&mut self, image: &DynamicImage) -> Result<SegmentationMask> {
        let original_dimensions = (image.width(), image.height());
        let preprocessing_config = self.model_manager.preprocessing_config();
        let expected_shape = self.model_manager.info()?.input_shape;

        let input = ImagePreprocessor::preprocess_for_inference(image, &preprocessing_config)?;
        let input = ImagePreprocessor::enforce_input_shape(input, expected_shape)?;

        let output = self.infer(&input)?;
        let mask = tensor_to_mask(&output.view(), original_dimensions)?;

        if self.config.debug {
            let _ = mask.save_png("debug_neural_mask.png");
        }

        crate::backends::secondary_refine(&image.to_rgb8(), mask, &self.config)
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            log::debug!("Released tensor-runtime inference session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_fails_without_model() {
        let config = RemovalConfig::builder()
            .model_path("/definitely/not/a/model.onnx")
            .build()
            .unwrap();
        let result = NeuralTensorSegmenter::new(&config);
        assert!(result.is_err());
    }

    #[test]
    fn test_construction_fails_on_garbage_model() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("garbage.onnx");
        std::fs::write(&model_path, b"this is not an onnx protobuf").unwrap();

        let config = RemovalConfig::builder()
            .model_path(&model_path)
            .build()
            .unwrap();
        let result = NeuralTensorSegmenter::new(&config);
        assert!(result.is_err());
    }
}
