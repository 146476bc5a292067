//! Passport photo CLI
//!
//! Command-line interface over the passport photo pipeline: background
//! removal with the configured strategy chain, optional face-anchored crop
//! to a physical format, background substitution and color adjustment.

use super::config::CliConfigBuilder;
use crate::{adjust, composite, config::BackgroundSpec, processor::PassportPhotoProcessor};
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Passport photo tool
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "passportify")]
pub struct Cli {
    /// Input portrait image
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Output file [default: <input stem>_passport.png]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Segmentation strategy (auto, classical, neural, managed)
    #[arg(short, long, default_value = "auto")]
    pub strategy: String,

    /// Photo format: a preset (35x45, 2x2, 5x7, 33x48) or WIDTHxHEIGHT in
    /// the configured unit. Without a format only background removal runs.
    #[arg(short, long)]
    pub format: Option<String>,

    /// Measurement unit for a WIDTHxHEIGHT format (mm, cm, inch)
    #[arg(long, default_value = "mm")]
    pub unit: String,

    /// Print resolution in dots per inch
    #[arg(long, default_value_t = 300)]
    pub dpi: u32,

    /// Background: "none", a hex color (#rrggbb) or a background image path
    #[arg(short, long)]
    pub background: Option<String>,

    /// Scale factor applied to a background image before tiling
    #[arg(long, default_value_t = 1.0)]
    pub background_scale: f64,

    /// Horizontal tile offset as a fraction of the tile width, -1.0..=1.0
    #[arg(long, default_value_t = 0.0)]
    pub background_offset_x: f64,

    /// Vertical tile offset as a fraction of the tile height, -1.0..=1.0
    #[arg(long, default_value_t = 0.0)]
    pub background_offset_y: f64,

    /// Brightness offset, -100..=100
    #[arg(long, default_value_t = 0)]
    pub brightness: i32,

    /// Contrast multiplier
    #[arg(long, default_value_t = 1.0)]
    pub contrast: f32,

    /// Saturation multiplier
    #[arg(long, default_value_t = 1.0)]
    pub saturation: f32,

    /// Border width in pixels added around the output
    #[arg(long, default_value_t = 0)]
    pub border: u32,

    /// Path to the saliency model file for the neural strategies
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Generate soft matte edges instead of a hard binary matte
    #[arg(long)]
    pub smooth_edges: bool,

    /// Treat the input as a general photo rather than a portrait, enabling
    /// the secondary graph-cut refinement pass
    #[arg(long)]
    pub general: bool,

    /// Write intermediate masks and mattes as debug artifacts
    #[arg(long)]
    pub debug: bool,

    /// Enable verbose logging (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let options = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    info!("Input: {}", cli.input);
    info!("Strategy: {}", options.removal.strategy);
    if let Some(format) = &options.format {
        info!(
            "Format: {}x{} {} @ {} DPI",
            format.width(),
            format.height(),
            format.unit(),
            format.dpi()
        );
    }

    let image = image::open(&cli.input)
        .with_context(|| format!("Failed to open input image '{}'", cli.input))?;

    let processor = PassportPhotoProcessor::new(options.removal.clone())
        .context("Failed to create passport photo processor")?;

    let start = Instant::now();
    let normalized = processor
        .normalize_to_passport(&image, None, options.format.as_ref())
        .context("Failed to normalize photo")?;
    if let Some(engine) = processor.engine_name() {
        info!("Segmentation engine: {engine}");
    }

    let with_background = match &options.background {
        BackgroundSpec::None => normalized,
        spec => composite::composite(&normalized.to_rgba8(), spec)
            .context("Background substitution failed")?,
    };

    let final_image = if options.adjustments_are_identity() {
        with_background
    } else {
        adjust(
            &with_background,
            options.brightness,
            options.contrast,
            options.saturation,
        )
        .context("Color adjustment failed")?
    };

    let output_path = resolve_output_path(&cli);
    final_image
        .save(&output_path)
        .with_context(|| format!("Failed to write output '{}'", output_path.display()))?;

    info!(
        "Wrote {} ({}x{}) in {:.2}s",
        output_path.display(),
        final_image.width(),
        final_image.height(),
        start.elapsed().as_secs_f64()
    );

    processor.close();
    Ok(())
}

/// Output path: explicit `--output`, or the input stem with a
/// `_passport.png` suffix next to the input
fn resolve_output_path(cli: &Cli) -> PathBuf {
    match &cli.output {
        Some(path) => path.clone(),
        None => {
            let input = Path::new(&cli.input);
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output");
            input.with_file_name(format!("{stem}_passport.png"))
        },
    }
}

fn init_tracing(verbose_count: u8) -> Result<()> {
    crate::tracing_config::init_cli_tracing(verbose_count)
        .context("Failed to initialize tracing subscriber")
}
