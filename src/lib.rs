#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Passportify
//!
//! A passport photo pipeline: multi-strategy background removal with
//! automatic engine fallback, mask refinement and alpha compositing,
//! face-anchored cropping to an exact physical size at a fixed print
//! resolution, and background substitution.
//!
//! Three structurally different segmentation strategies produce the same
//! artifact, a foreground confidence mask: a direct tensor-runtime path over
//! a saliency model (`ort`), a managed pure-Rust model runtime (`tract`),
//! and a classical color/morphology heuristic that needs no model file. An
//! ordered fallback chain picks the first strategy that constructs, so a
//! missing model degrades the pipeline instead of crashing it.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use passportify::{
//!     remove_background_from_bytes, PassportPhotoProcessor, PhotoFormat, RemovalConfig,
//! };
//!
//! # async fn example(upload_bytes: Vec<u8>) -> anyhow::Result<()> {
//! // One-shot: decode, segment, refine, apply the alpha matte
//! let config = RemovalConfig::default();
//! let result = remove_background_from_bytes(&upload_bytes, &config).await?;
//! result.save_png("cutout.png")?;
//!
//! // Full normalization: removal plus face-anchored crop to 35×45 mm @ 300 DPI
//! let processor = PassportPhotoProcessor::new(config)?;
//! let image = image::load_from_memory(&upload_bytes)?;
//! let passport = processor.normalize_to_passport(&image, None, Some(&PhotoFormat::passport_35x45()))?;
//! passport.save("passport.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `onnx` (default): direct ONNX Runtime strategy
//! - `tract` (default): managed pure-Rust model runtime strategy
//! - `cli` (default): command-line interface and tracing setup
//!
//! The classical strategy is always available; with both neural features
//! disabled every chain resolves to it.

pub mod adjust;
pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod composite;
pub mod config;
pub mod crop;
pub mod error;
pub mod facedetect;
pub mod inference;
pub mod models;
pub mod processor;
pub mod refine;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use image::DynamicImage;
use instant::Instant;
use tokio::io::AsyncRead;

// Public API exports
pub use adjust::adjust;
pub use backends::ClassicalSegmenter;
#[cfg(feature = "tract")]
pub use backends::ManagedModelSegmenter;
#[cfg(feature = "onnx")]
pub use backends::NeuralTensorSegmenter;
pub use composite::{add_border, apply_alpha, composite as composite_background};
pub use config::{
    parse_hex_color, BackgroundSpec, EdgePolicy, PhotoFormat, RefinementParams, RemovalConfig,
    RemovalConfigBuilder, RemovalStrategy, Unit, DEFAULT_DPI,
};
pub use crop::{target_pixel_size, PassportCropper};
pub use error::{PhotoError, Result};
pub use facedetect::{FaceCandidate, FaceLocator};
pub use inference::SegmentationBackend;
pub use models::{ModelManager, PreprocessingConfig, MODEL_INPUT_SIZE};
pub use processor::{EngineCandidate, EngineConstructor, PassportPhotoProcessor};
pub use refine::MaskRefiner;
pub use types::{
    FaceRegion, MaskStatistics, ProcessingMetadata, ProcessingTimings, RemovalResult,
    SegmentationMask,
};
pub use utils::ImagePreprocessor;

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Remove the background from an image provided as encoded bytes
///
/// Decodes the bytes with the `image` crate (JPEG, PNG, TIFF, …), builds a
/// processor for the configured strategy chain and runs the removal
/// pipeline. Suitable for web servers and other memory-based callers.
///
/// # Errors
/// - `PhotoError::InvalidInput` for undecodable bytes
/// - Everything [`PassportPhotoProcessor::remove_background`] can return
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let decode_start = Instant::now();
    let image = image::load_from_memory(image_bytes).map_err(|e| {
        PhotoError::invalid_input(format!("Failed to decode image from bytes: {e}"))
    })?;
    let decode_ms = decode_start.elapsed().as_millis() as u64;

    let mut result = remove_background_from_image(&image, config).await?;
    result.metadata.timings.decode_ms = decode_ms;
    Ok(result)
}

/// Remove the background from a decoded `DynamicImage`
///
/// The most direct entry point for in-memory processing; no I/O is
/// performed.
///
/// # Errors
/// Everything [`PassportPhotoProcessor::remove_background`] can return.
pub async fn remove_background_from_image(
    image: &DynamicImage,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let processor = PassportPhotoProcessor::new(config.clone())?;
    processor.remove_background(image)
}

/// Remove the background from an async reader stream
///
/// Reads the stream to the end and defers to the bytes-based API, making it
/// suitable for network streams and async file handles.
///
/// # Errors
/// - `PhotoError::Io` for stream read failures
/// - Everything [`remove_background_from_bytes`] can return
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
    remove_background_from_bytes(&buffer, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn encoded_test_image() -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(48, 48, |x, y| {
            if (16..32).contains(&x) && (12..40).contains(&y) {
                Rgb([205, 150, 120])
            } else {
                Rgb([70, 100, 180])
            }
        }));
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn classical_config() -> RemovalConfig {
        RemovalConfig::builder()
            .strategy(RemovalStrategy::Classical)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_remove_background_from_bytes() {
        let bytes = encoded_test_image();
        let result = remove_background_from_bytes(&bytes, &classical_config())
            .await
            .unwrap();
        assert_eq!(result.dimensions(), (48, 48));
        assert_eq!(result.metadata.strategy, "classical");
    }

    #[tokio::test]
    async fn test_remove_background_from_reader() {
        let bytes = encoded_test_image();
        let reader = std::io::Cursor::new(bytes);
        let result = remove_background_from_reader(reader, &classical_config())
            .await
            .unwrap();
        assert_eq!(result.dimensions(), (48, 48));
    }

    #[tokio::test]
    async fn test_undecodable_bytes_are_invalid_input() {
        let err = remove_background_from_bytes(&[0xde, 0xad, 0xbe, 0xef], &classical_config())
            .await
            .unwrap_err();
        assert!(matches!(err, PhotoError::InvalidInput(_)));
    }
}
