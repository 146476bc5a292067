//! Error types for passport photo processing operations

use thiserror::Error;

/// Result type alias for passport photo operations
pub type Result<T> = std::result::Result<T, PhotoError>;

/// Comprehensive error types for the passport photo pipeline
#[derive(Error, Debug)]
pub enum PhotoError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image format or decoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Unusable caller input (empty image, unsupported unit, non-positive size)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A segmentation engine could not be constructed. Always recovered by
    /// the fallback chain; callers never observe this variant from the
    /// pipeline entry points.
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Inference on an already-selected engine failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model loading or validation errors
    #[error("Model error: {0}")]
    Model(String),

    /// Crop rectangle could not be fit within image bounds
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Buffer transform or pixel processing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PhotoError {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new engine-unavailable error
    pub fn engine_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::EngineUnavailable(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new geometry error
    pub fn geometry<S: Into<String>>(msg: S) -> Self {
        Self::Geometry(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid-input error for an unrecognized measurement unit
    pub fn unsupported_unit<S: std::fmt::Display>(unit: S) -> Self {
        Self::InvalidInput(format!(
            "Unsupported unit: {unit} (expected one of: mm, cm, inch)"
        ))
    }

    /// Create a processing error with stage context
    ///
    /// The stage name lets callers distinguish "bad input" from
    /// "processing failure" without parsing the message.
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {info})"),
            None => String::new(),
        };

        Self::Processing(format!(
            "Processing failed at stage '{stage}'{input_context}: {details}"
        ))
    }

    /// Create a model error with troubleshooting context
    pub fn model_error_with_context<P: AsRef<std::path::Path>>(
        operation: &str,
        model_path: P,
        error: &str,
        suggestions: &[&str],
    ) -> Self {
        let path_display = model_path.as_ref().display();
        let suggestion_text = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" Suggestions: {}", suggestions.join(", "))
        };

        Self::Model(format!(
            "Failed to {operation} model '{path_display}': {error}.{suggestion_text}"
        ))
    }
}
