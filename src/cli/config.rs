//! Conversion of CLI arguments into pipeline configuration

use crate::cli::main_impl::Cli;
use crate::{
    adjust::BRIGHTNESS_RANGE,
    config::{BackgroundSpec, EdgePolicy, PhotoFormat, RemovalConfig, RemovalStrategy, Unit},
};
use anyhow::{Context, Result};

/// Everything the CLI pipeline run needs, derived from the parsed arguments
pub(crate) struct PipelineOptions {
    pub removal: RemovalConfig,
    pub format: Option<PhotoFormat>,
    pub background: BackgroundSpec,
    pub brightness: i32,
    pub contrast: f32,
    pub saturation: f32,
}

impl PipelineOptions {
    /// Whether the color adjustment stage would be a no-op
    pub(crate) fn adjustments_are_identity(&self) -> bool {
        self.brightness == 0
            && (self.contrast - 1.0).abs() < f32::EPSILON
            && (self.saturation - 1.0).abs() < f32::EPSILON
    }
}

/// Convert CLI arguments to unified pipeline options
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build pipeline options from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<PipelineOptions> {
        let strategy: RemovalStrategy = cli
            .strategy
            .parse()
            .context("Invalid removal strategy")?;

        let edge_policy = if cli.smooth_edges {
            EdgePolicy::Smooth
        } else {
            EdgePolicy::Hard
        };

        let mut builder = RemovalConfig::builder()
            .strategy(strategy)
            .edge_policy(edge_policy)
            .portrait(!cli.general)
            .debug(cli.debug)
            .border_width(cli.border)
            .dpi(cli.dpi);
        if let Some(model) = &cli.model {
            builder = builder.model_path(model.clone());
        }
        let removal = builder.build().context("Invalid configuration")?;

        let format = cli
            .format
            .as_deref()
            .map(|spec| Self::parse_format(spec, &cli.unit, cli.dpi))
            .transpose()?;

        let background = match &cli.background {
            Some(value) => Self::parse_background(value, cli)?,
            None => BackgroundSpec::None,
        };

        Ok(PipelineOptions {
            removal,
            format,
            background,
            brightness: cli.brightness,
            contrast: cli.contrast,
            saturation: cli.saturation,
        })
    }

    /// Parse a photo format: a named preset (`35x45`, `2x2`, …) or a
    /// `WIDTHxHEIGHT` pair in the configured unit
    pub(crate) fn parse_format(spec: &str, unit: &str, dpi: u32) -> Result<PhotoFormat> {
        if let Some(mut preset) = PhotoFormat::preset(spec) {
            preset.set_dpi(dpi).context("Invalid DPI")?;
            return Ok(preset);
        }

        let (width, height) = spec
            .split_once(['x', 'X'])
            .with_context(|| format!("Format '{spec}' is not a preset or WIDTHxHEIGHT pair"))?;
        let width: f64 = width
            .trim()
            .parse()
            .with_context(|| format!("Invalid format width '{width}'"))?;
        let height: f64 = height
            .trim()
            .parse()
            .with_context(|| format!("Invalid format height '{height}'"))?;
        let unit: Unit = unit.parse().context("Invalid unit")?;

        PhotoFormat::new(width, height, unit, dpi).context("Invalid photo format")
    }

    /// Parse a background argument: a hex color (`#rrggbb`) or the path of a
    /// background image to tile
    fn parse_background(value: &str, cli: &Cli) -> Result<BackgroundSpec> {
        if value.eq_ignore_ascii_case("none") {
            return Ok(BackgroundSpec::None);
        }
        if crate::config::parse_hex_color(value).is_some() || value.starts_with('#') {
            return Ok(BackgroundSpec::from_hex(value));
        }

        let data = std::fs::read(value)
            .with_context(|| format!("Background '{value}' is neither a hex color nor a readable image file"))?;
        Ok(BackgroundSpec::Image {
            data,
            scale: cli.background_scale,
            offset_x: cli.background_offset_x,
            offset_y: cli.background_offset_y,
        })
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        cli.strategy
            .parse::<RemovalStrategy>()
            .context("Invalid removal strategy")?;

        if cli.brightness < BRIGHTNESS_RANGE.0 || cli.brightness > BRIGHTNESS_RANGE.1 {
            anyhow::bail!(
                "Brightness must be in [{}, {}]",
                BRIGHTNESS_RANGE.0,
                BRIGHTNESS_RANGE.1
            );
        }
        if cli.contrast < 0.0 || !cli.contrast.is_finite() {
            anyhow::bail!("Contrast multiplier must be non-negative and finite");
        }
        if cli.saturation < 0.0 || !cli.saturation.is_finite() {
            anyhow::bail!("Saturation multiplier must be non-negative and finite");
        }
        if cli.dpi == 0 {
            anyhow::bail!("DPI must be positive");
        }
        if let Some(format) = &cli.format {
            Self::parse_format(format, &cli.unit, cli.dpi).context("Invalid format")?;
        }
        if !(-1.0..=1.0).contains(&cli.background_offset_x)
            || !(-1.0..=1.0).contains(&cli.background_offset_y)
        {
            anyhow::bail!("Background offsets must be in [-1, 1]");
        }

        Ok(())
    }
}
