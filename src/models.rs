//! Saliency model resolution and metadata
//!
//! Model files are provisioned externally; this module only locates one,
//! loads its bytes, and exposes the preprocessing contract both neural
//! backends share. A missing model is an `EngineUnavailable`-class failure
//! that the selector recovers from by falling back to the classical
//! strategy.

use crate::config::RemovalConfig;
use crate::error::{PhotoError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Conventional on-disk location probed when no explicit path is configured
const DEFAULT_MODEL_PATH: &str = "models/u2net.onnx";

/// Download location suggested in the missing-model error message
const MODEL_DOWNLOAD_URL: &str =
    "https://github.com/danielgatis/rembg/raw/main/rembg/sessions/u2net.onnx";

/// Expected input edge length of the saliency model
pub const MODEL_INPUT_SIZE: u32 = 320;

/// Preprocessing contract for a saliency model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Model input size as [width, height]
    pub target_size: [u32; 2],
    /// Per-channel mean subtracted after scaling to [0,1]
    pub normalization_mean: [f32; 3],
    /// Per-channel divisor applied after mean subtraction
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        // U²-Net style models take plain [0,1] inputs
        Self {
            target_size: [MODEL_INPUT_SIZE, MODEL_INPUT_SIZE],
            normalization_mean: [0.0, 0.0, 0.0],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }
}

/// Metadata about a resolved model file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Display name (file stem)
    pub name: String,
    /// Model file size in bytes
    pub size_bytes: u64,
    /// Expected input tensor shape (N, C, H, W)
    pub input_shape: (usize, usize, usize, usize),
    /// Expected output tensor shape (N, C, H, W)
    pub output_shape: (usize, usize, usize, usize),
}

/// Resolves and loads the externally-provisioned saliency model file
#[derive(Debug, Clone)]
pub struct ModelManager {
    path: PathBuf,
    preprocessing: PreprocessingConfig,
}

impl ModelManager {
    /// Resolve the model file for the given configuration
    ///
    /// Order: explicit `model_path` from the config, then the conventional
    /// `models/u2net.onnx` location.
    ///
    /// # Errors
    /// Returns `PhotoError::Model` with download instructions when no model
    /// file exists at any probed location.
    pub fn resolve(config: &RemovalConfig) -> Result<Self> {
        let candidate = config
            .model_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));

        if candidate.is_file() {
            log::debug!("Resolved saliency model at {}", candidate.display());
            return Ok(Self::from_path(candidate));
        }

        Err(PhotoError::model_error_with_context(
            "locate",
            &candidate,
            "file not found",
            &[
                &format!("download it from {MODEL_DOWNLOAD_URL}"),
                "set model_path in the removal config",
            ],
        ))
    }

    /// Use an explicit model file path without probing
    #[must_use]
    pub fn from_path(path: PathBuf) -> Self {
        Self {
            path,
            preprocessing: PreprocessingConfig::default(),
        }
    }

    /// Path of the resolved model file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the model file into memory
    ///
    /// # Errors
    /// Propagates I/O failures reading the model file.
    pub fn load_model(&self) -> Result<Vec<u8>> {
        let data = std::fs::read(&self.path).map_err(|e| {
            PhotoError::model_error_with_context(
                "read",
                &self.path,
                &e.to_string(),
                &["verify the file is readable"],
            )
        })?;
        if data.is_empty() {
            return Err(PhotoError::model_error_with_context(
                "read",
                &self.path,
                "file is empty",
                &["re-download the model file"],
            ));
        }
        Ok(data)
    }

    /// Preprocessing contract for this model
    #[must_use]
    pub fn preprocessing_config(&self) -> PreprocessingConfig {
        self.preprocessing.clone()
    }

    /// Model metadata
    ///
    /// # Errors
    /// Propagates I/O failures reading the file length.
    pub fn info(&self) -> Result<ModelInfo> {
        let size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        let name = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("saliency-model")
            .to_owned();
        let edge = MODEL_INPUT_SIZE as usize;
        Ok(ModelInfo {
            name,
            size_bytes,
            input_shape: (1, 3, edge, edge),
            output_shape: (1, 1, edge, edge),
        })
    }
}
