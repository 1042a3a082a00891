//! glowcut-cli: headless front end for the glowcut pipeline.
//!
//! Loads an image, optionally crops it, optionally removes its
//! background, applies the padding/shadow/glow style, and writes the
//! resulting PNG. Useful for batch jobs and for checking pipeline output
//! without a browser.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin glowcut-cli -- [OPTIONS] <IMAGE>
//! ```
//!
//! Background removal needs a model; pass one of:
//!
//! - `--segment-cmd "rembg i - -"`: any command reading a PNG on stdin
//!   and writing the cut-out PNG on stdout.
//! - `--mask mask.png`: a precomputed mask (white keeps, black removes).

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod segmenters;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use glowcut_pipeline::{
    AspectRatio, Controller, ControllerConfig, Dimensions, PipelineError, RectCropper, Region,
    Segmenter, StyleParams, StylePatch, WithTimeout,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::segmenters::{CommandSegmenter, MaskSegmenter};

/// Crop, cut out, and style an image into a glowing PNG.
#[derive(Parser)]
#[command(name = "glowcut-cli", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image: PathBuf,

    /// Where to write the styled PNG.
    #[arg(short, long, default_value = ControllerConfig::DEFAULT_DOWNLOAD_FILENAME)]
    output: PathBuf,

    /// Lock the crop box to an aspect ratio (`1:1`, `4:5`, `16:9`, `free`).
    ///
    /// Without `--crop`, the default centred box is committed.
    #[arg(long)]
    aspect: Option<AspectRatio>,

    /// Crop region as `x,y,width,height` in source pixels.
    #[arg(long)]
    crop: Option<Region>,

    /// Command that removes the background (PNG on stdin -> PNG on stdout).
    #[arg(long, conflicts_with = "mask")]
    segment_cmd: Option<String>,

    /// Mask image to use as the background cut-out.
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Remove the background before cropping instead of after.
    #[arg(long)]
    segment_first: bool,

    /// Give up on background removal after this many seconds.
    #[arg(long, default_value_t = 60.0)]
    segment_timeout: f64,

    /// Transparent border in pixels (0-200).
    #[arg(long)]
    padding: Option<f64>,

    /// Drop shadow blur radius (0-80).
    #[arg(long)]
    shadow: Option<f64>,

    /// Neon glow blur radius (0-80).
    #[arg(long)]
    glow: Option<f64>,

    /// Style as a JSON object, e.g. `{"padding":10,"glow_blur":30}`.
    ///
    /// When provided, `--padding`, `--shadow`, and `--glow` are ignored.
    #[arg(long)]
    style_json: Option<String>,

    /// Print a JSON report instead of a human-readable summary.
    #[arg(long)]
    json: bool,

    /// Log pipeline internals (overridden by `RUST_LOG`).
    #[arg(short, long)]
    verbose: bool,
}

/// Anything that stops a CLI run.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("error reading {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error writing {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error loading mask {}: {source}", .path.display())]
    Mask {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("error parsing --style-json: {0}")]
    StyleJson(#[from] serde_json::Error),

    #[error("--segment-cmd is empty")]
    EmptyCommand,

    #[error("--segment-timeout must be a positive number of seconds")]
    InvalidTimeout,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// What a run did, for `--json` output.
#[derive(Debug, Serialize)]
struct Report {
    input: PathBuf,
    output: PathBuf,
    source: Dimensions,
    crop: Option<Region>,
    background_removed: bool,
    working: Dimensions,
    style: StyleParams,
    exported: Dimensions,
    bytes: usize,
    elapsed_ms: f64,
}

/// How the background is removed, if at all.
enum Cutout {
    None,
    Command(CommandSegmenter),
    Mask(MaskSegmenter),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(report) => {
            if cli.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("Error serializing report: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print_summary(&report);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the style patch from `--style-json` or the individual flags.
fn style_from_cli(cli: &Cli) -> Result<StylePatch, CliError> {
    if let Some(ref json) = cli.style_json {
        return Ok(serde_json::from_str(json)?);
    }
    Ok(StylePatch {
        padding: cli.padding,
        shadow_blur: cli.shadow,
        glow_blur: cli.glow,
    })
}

fn cutout_from_cli(cli: &Cli) -> Result<Cutout, CliError> {
    if let Some(ref command) = cli.segment_cmd {
        return CommandSegmenter::parse(command)
            .map(Cutout::Command)
            .ok_or(CliError::EmptyCommand);
    }
    if let Some(ref path) = cli.mask {
        return MaskSegmenter::open(path)
            .map(Cutout::Mask)
            .map_err(|source| CliError::Mask {
                path: path.clone(),
                source,
            });
    }
    Ok(Cutout::None)
}

async fn run(cli: &Cli) -> Result<Report, CliError> {
    let started = Instant::now();
    let style = style_from_cli(cli)?;
    let cutout = cutout_from_cli(cli)?;
    let background_removed = !matches!(cutout, Cutout::None);
    let timeout = Duration::try_from_secs_f64(cli.segment_timeout)
        .ok()
        .filter(|t| !t.is_zero())
        .ok_or(CliError::InvalidTimeout)?;

    let bytes = std::fs::read(&cli.image).map_err(|source| CliError::Read {
        path: cli.image.clone(),
        source,
    })?;
    tracing::info!(path = %cli.image.display(), bytes = bytes.len(), "read input");

    let controller = Controller::from_config(ControllerConfig::default());
    controller.set_style(style)?;
    controller.load(&bytes)?;
    let source = controller
        .working_dimensions()
        .ok_or(PipelineError::NoActiveSession)?;

    if cli.segment_first {
        cut_out(&controller, &cutout, timeout).await?;
    }
    let crop = apply_crop(&controller, cli)?;
    if !cli.segment_first {
        // Masks are drawn for the source image, not the cropped one.
        let cutout = match (cutout, crop) {
            (Cutout::Mask(mask), Some(region)) => Cutout::Mask(mask.crop_to(source, region)),
            (cutout, _) => cutout,
        };
        cut_out(&controller, &cutout, timeout).await?;
    }

    let blob = controller.export_for_download()?;
    write_output(&cli.output, blob.bytes())?;

    Ok(Report {
        input: cli.image.clone(),
        output: cli.output.clone(),
        source,
        crop,
        background_removed,
        working: controller
            .working_dimensions()
            .ok_or(PipelineError::NothingToExport)?,
        style: controller.style(),
        exported: blob.dimensions(),
        bytes: blob.bytes().len(),
        elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
    })
}

/// Apply `--aspect` and `--crop`, committing when either is given.
fn apply_crop(
    controller: &Controller<RectCropper>,
    cli: &Cli,
) -> Result<Option<Region>, PipelineError> {
    if cli.aspect.is_none() && cli.crop.is_none() {
        return Ok(None);
    }
    if let Some(ratio) = cli.aspect {
        controller.set_aspect_ratio(ratio)?;
    }
    let region = match cli.crop {
        Some(region) => controller.select(region)?,
        None => controller
            .selection()
            .ok_or(PipelineError::NoActiveSession)?,
    };
    if cli.crop.is_some_and(|requested| requested != region) {
        tracing::warn!(%region, "crop region adjusted to fit the image and aspect ratio");
    }
    controller.commit_crop()?;
    Ok(Some(region))
}

async fn cut_out(
    controller: &Controller<RectCropper>,
    cutout: &Cutout,
    timeout: Duration,
) -> Result<(), PipelineError> {
    match cutout {
        Cutout::None => Ok(()),
        Cutout::Command(segmenter) => remove(controller, segmenter, timeout).await,
        Cutout::Mask(segmenter) => remove(controller, segmenter, timeout).await,
    }
}

async fn remove<S: Segmenter>(
    controller: &Controller<RectCropper>,
    segmenter: &S,
    timeout: Duration,
) -> Result<(), PipelineError> {
    let bounded = WithTimeout::new(segmenter, timeout, tokio::time::sleep);
    tracing::debug!(timeout = ?bounded.timeout(), "removing background");
    controller.remove_background(bounded).await
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    std::fs::write(path, bytes).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "wrote output");
    Ok(())
}

fn print_summary(report: &Report) {
    println!("{} -> {}", report.input.display(), report.output.display());
    println!("  source:    {}", report.source);
    if let Some(region) = report.crop {
        println!("  crop:      {region}");
    }
    if report.background_removed {
        println!("  cutout:    background removed");
    }
    println!("  working:   {}", report.working);
    println!(
        "  style:     padding {}  shadow {}  glow {}",
        report.style.padding, report.style.shadow_blur, report.style.glow_blur
    );
    println!("  exported:  {} ({} bytes)", report.exported, report.bytes);
    println!("  elapsed:   {:.1}ms", report.elapsed_ms);
}
