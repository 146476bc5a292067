//! Shared utilities for the segmentation backends

pub mod preprocessing;

pub use preprocessing::{tensor_to_mask, ImagePreprocessor};
