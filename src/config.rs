//! Configuration types for the passport photo pipeline

use crate::error::{PhotoError, Result};
use image::Rgb;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Segmentation strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalStrategy {
    /// Try neural tensor inference first, then the managed model runtime,
    /// then the classical color/morphology heuristic
    Auto,
    /// Classical color-heuristic segmentation (always constructible)
    Classical,
    /// Direct tensor-runtime inference over a saliency model
    Neural,
    /// Managed pretrained-model runtime for the same saliency task
    Managed,
}

impl Default for RemovalStrategy {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for RemovalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Classical => write!(f, "classical"),
            Self::Neural => write!(f, "neural"),
            Self::Managed => write!(f, "managed"),
        }
    }
}

impl FromStr for RemovalStrategy {
    type Err = PhotoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            // "opencv" kept as an accepted spelling for the classical engine
            "classical" | "opencv" => Ok(Self::Classical),
            "neural" | "onnx" => Ok(Self::Neural),
            "managed" | "djl" => Ok(Self::Managed),
            other => Err(PhotoError::invalid_input(format!(
                "Unknown removal strategy '{other}' (expected auto, classical, neural or managed)"
            ))),
        }
    }
}

/// Alpha matte edge policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgePolicy {
    /// Binary matte, fully opaque or fully transparent
    Hard,
    /// Gradient-weighted blend for soft edges around the boundary
    Smooth,
}

impl Default for EdgePolicy {
    fn default() -> Self {
        Self::Hard
    }
}

/// Tuning constants for mask refinement
///
/// The reference implementations carried several divergent sets of these
/// constants; they are configuration here rather than hard-coded, with one
/// coherent default set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefinementParams {
    /// Binarization threshold applied before morphology
    pub threshold: u8,
    /// Radius of the morphological close/open structuring element
    pub kernel_radius: u8,
    /// Radius of the boundary band (dilate - erode) that gets smoothed
    pub band_radius: u8,
    /// Gaussian sigma for boundary-band and smooth-matte blurring
    pub blur_sigma: f32,
}

impl Default for RefinementParams {
    fn default() -> Self {
        Self {
            threshold: 127,
            kernel_radius: 2,
            band_radius: 3,
            blur_sigma: 2.0,
        }
    }
}

/// Physical measurement unit for photo formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Mm,
    Cm,
    Inch,
}

impl Unit {
    /// Conversion factor from this unit to inches
    #[must_use]
    pub fn to_inch_factor(self) -> f64 {
        match self {
            Self::Mm => 25.4,
            Self::Cm => 2.54,
            Self::Inch => 1.0,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mm => write!(f, "mm"),
            Self::Cm => write!(f, "cm"),
            Self::Inch => write!(f, "inch"),
        }
    }
}

impl FromStr for Unit {
    type Err = PhotoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mm" => Ok(Self::Mm),
            "cm" => Ok(Self::Cm),
            "inch" | "in" => Ok(Self::Inch),
            other => Err(PhotoError::unsupported_unit(other)),
        }
    }
}

/// Target physical photo size at a fixed print resolution
///
/// Constructed once per request and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotoFormat {
    width: f64,
    height: f64,
    unit: Unit,
    dpi: u32,
}

/// Default print resolution for passport photos
pub const DEFAULT_DPI: u32 = 300;

impl PhotoFormat {
    /// Create a new photo format
    ///
    /// # Errors
    /// Returns `PhotoError::InvalidInput` for non-positive sizes or DPI.
    pub fn new(width: f64, height: f64, unit: Unit, dpi: u32) -> Result<Self> {
        if width <= 0.0 || height <= 0.0 {
            return Err(PhotoError::invalid_input(format!(
                "Photo format dimensions must be positive, got {width}x{height}"
            )));
        }
        if dpi == 0 {
            return Err(PhotoError::invalid_input(
                "Photo format DPI must be positive",
            ));
        }
        Ok(Self {
            width,
            height,
            unit,
            dpi,
        })
    }

    /// The common 35×45 mm passport format at 300 DPI
    #[must_use]
    pub fn passport_35x45() -> Self {
        Self {
            width: 35.0,
            height: 45.0,
            unit: Unit::Mm,
            dpi: DEFAULT_DPI,
        }
    }

    /// US 2×2 inch visa format at 300 DPI
    #[must_use]
    pub fn visa_2x2() -> Self {
        Self {
            width: 2.0,
            height: 2.0,
            unit: Unit::Inch,
            dpi: DEFAULT_DPI,
        }
    }

    /// Look up a named preset (`"35x45"`, `"2x2"`, `"5x7"`, `"33x48"`)
    ///
    /// Presets carry the standard 300 DPI print resolution.
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "35x45" => Some(Self::passport_35x45()),
            "2x2" => Some(Self::visa_2x2()),
            "5x7" => Self::new(5.0, 7.0, Unit::Cm, DEFAULT_DPI).ok(),
            "33x48" => Self::new(33.0, 48.0, Unit::Mm, DEFAULT_DPI).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    #[must_use]
    pub fn unit(&self) -> Unit {
        self.unit
    }

    #[must_use]
    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    /// Replace the print resolution
    ///
    /// # Errors
    /// Returns `PhotoError::InvalidInput` for zero DPI.
    pub fn set_dpi(&mut self, dpi: u32) -> Result<()> {
        if dpi == 0 {
            return Err(PhotoError::invalid_input(
                "Photo format DPI must be positive",
            ));
        }
        self.dpi = dpi;
        Ok(())
    }
}

/// Background substitution specification
#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundSpec {
    /// Keep the transparent background
    None,
    /// Fill with a solid color
    Color(Rgb<u8>),
    /// Tile a background image over the canvas
    Image {
        /// Encoded background image bytes (any format the `image` crate decodes)
        data: Vec<u8>,
        /// Scale factor applied to the background before tiling (1.0 = original size)
        scale: f64,
        /// Horizontal offset as a fraction of the scaled tile width, -1.0..=1.0
        offset_x: f64,
        /// Vertical offset as a fraction of the scaled tile height, -1.0..=1.0
        offset_y: f64,
    },
}

impl BackgroundSpec {
    /// Parse a `#rrggbb` hex color
    ///
    /// An unparsable value falls back to white, matching the lenient
    /// behavior the service surface expects for user-supplied colors.
    #[must_use]
    pub fn from_hex(hex: &str) -> Self {
        match parse_hex_color(hex) {
            Some(color) => Self::Color(color),
            None => {
                log::warn!("Invalid background color '{hex}', falling back to white");
                Self::Color(Rgb([255, 255, 255]))
            },
        }
    }
}

/// Parse `#rrggbb` or `rrggbb` into an RGB color
#[must_use]
pub fn parse_hex_color(hex: &str) -> Option<Rgb<u8>> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let value = u32::from_str_radix(digits, 16).ok()?;
    Some(Rgb([
        ((value >> 16) & 0xFF) as u8,
        ((value >> 8) & 0xFF) as u8,
        (value & 0xFF) as u8,
    ]))
}

/// Configuration for background removal operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalConfig {
    /// Segmentation strategy to construct (with fallback, see the processor)
    pub strategy: RemovalStrategy,

    /// Alpha matte edge policy
    pub edge_policy: EdgePolicy,

    /// Mask refinement tuning constants
    pub refinement: RefinementParams,

    /// Portrait mode: skip the secondary graph-cut refinement pass that the
    /// strategies run over their raw mask for general (non-portrait) input
    pub portrait: bool,

    /// Enable debug mode (writes intermediate masks and mattes as PNG artifacts)
    pub debug: bool,

    /// Border width in pixels added around the normalized photo (0 = no border)
    pub border_width: u32,

    /// Default print resolution when the photo format does not carry one
    pub dpi: u32,

    /// Explicit path to the saliency model file used by the neural strategies.
    /// When absent, the conventional `models/u2net.onnx` location is probed.
    pub model_path: Option<PathBuf>,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            strategy: RemovalStrategy::default(),
            edge_policy: EdgePolicy::default(),
            refinement: RefinementParams::default(),
            portrait: true,
            debug: false,
            border_width: 0,
            dpi: DEFAULT_DPI,
            model_path: None,
        }
    }
}

impl RemovalConfig {
    /// Create a new configuration builder for fluent construction
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    /// - Zero DPI
    /// - Zero refinement kernel radius
    pub fn validate(&self) -> Result<()> {
        if self.dpi == 0 {
            return Err(PhotoError::invalid_input("DPI must be positive"));
        }
        if self.refinement.kernel_radius == 0 {
            return Err(PhotoError::invalid_input(
                "Refinement kernel radius must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Builder for [`RemovalConfig`]
#[derive(Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn strategy(mut self, strategy: RemovalStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    #[must_use]
    pub fn edge_policy(mut self, policy: EdgePolicy) -> Self {
        self.config.edge_policy = policy;
        self
    }

    #[must_use]
    pub fn refinement(mut self, params: RefinementParams) -> Self {
        self.config.refinement = params;
        self
    }

    #[must_use]
    pub fn portrait(mut self, portrait: bool) -> Self {
        self.config.portrait = portrait;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    #[must_use]
    pub fn border_width(mut self, width: u32) -> Self {
        self.config.border_width = width;
        self
    }

    #[must_use]
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.model_path = Some(path.into());
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// Returns `PhotoError::InvalidInput` for out-of-range values.
    pub fn build(self) -> Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "auto".parse::<RemovalStrategy>().unwrap(),
            RemovalStrategy::Auto
        );
        assert_eq!(
            "opencv".parse::<RemovalStrategy>().unwrap(),
            RemovalStrategy::Classical
        );
        assert_eq!(
            "onnx".parse::<RemovalStrategy>().unwrap(),
            RemovalStrategy::Neural
        );
        assert_eq!(
            "managed".parse::<RemovalStrategy>().unwrap(),
            RemovalStrategy::Managed
        );
        assert!("tensorflow".parse::<RemovalStrategy>().is_err());
    }

    #[test]
    fn test_unit_parsing_and_factors() {
        assert_eq!("mm".parse::<Unit>().unwrap(), Unit::Mm);
        assert_eq!("CM".parse::<Unit>().unwrap(), Unit::Cm);
        assert_eq!("inch".parse::<Unit>().unwrap(), Unit::Inch);
        assert!((Unit::Mm.to_inch_factor() - 25.4).abs() < f64::EPSILON);
        assert!((Unit::Cm.to_inch_factor() - 2.54).abs() < f64::EPSILON);
        assert!((Unit::Inch.to_inch_factor() - 1.0).abs() < f64::EPSILON);

        let err = "furlong".parse::<Unit>().unwrap_err();
        assert!(err.to_string().contains("Unsupported unit"));
    }

    #[test]
    fn test_photo_format_validation() {
        assert!(PhotoFormat::new(35.0, 45.0, Unit::Mm, 300).is_ok());
        assert!(PhotoFormat::new(0.0, 45.0, Unit::Mm, 300).is_err());
        assert!(PhotoFormat::new(35.0, -1.0, Unit::Mm, 300).is_err());
        assert!(PhotoFormat::new(35.0, 45.0, Unit::Mm, 0).is_err());
    }

    #[test]
    fn test_photo_format_presets() {
        let passport = PhotoFormat::preset("35x45").unwrap();
        assert_eq!(passport.unit(), Unit::Mm);
        assert_eq!(passport.dpi(), 300);

        let visa = PhotoFormat::preset("2x2").unwrap();
        assert_eq!(visa.unit(), Unit::Inch);

        assert!(PhotoFormat::preset("9x9").is_none());
    }

    #[test]
    fn test_hex_color_parsing() {
        assert_eq!(parse_hex_color("#ffffff"), Some(Rgb([255, 255, 255])));
        assert_eq!(parse_hex_color("1a2b3c"), Some(Rgb([0x1a, 0x2b, 0x3c])));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("not-a-color"), None);

        // Lenient surface behavior: bad colors fall back to white
        assert_eq!(
            BackgroundSpec::from_hex("oops"),
            BackgroundSpec::Color(Rgb([255, 255, 255]))
        );
    }

    #[test]
    fn test_config_builder() {
        let config = RemovalConfig::builder()
            .strategy(RemovalStrategy::Classical)
            .debug(true)
            .border_width(10)
            .build()
            .unwrap();
        assert_eq!(config.strategy, RemovalStrategy::Classical);
        assert!(config.debug);
        assert_eq!(config.border_width, 10);
    }

    #[test]
    fn test_config_validation() {
        let mut config = RemovalConfig::default();
        config.dpi = 0;
        assert!(config.validate().is_err());

        let mut config = RemovalConfig::default();
        config.refinement.kernel_radius = 0;
        assert!(config.validate().is_err());
    }
}
