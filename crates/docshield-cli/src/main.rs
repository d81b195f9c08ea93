// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DocShield: document redaction from the command line.
//
// Entry point. Initialises logging, parses arguments, and drives one
// `ImageProcessor` session per invocation.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use docshield_core::error::{DocShieldError, Result};
use docshield_core::{BlurParameters, EditorConfig, MaskTarget};
use docshield_engine::ImageProcessor;
use tracing::{info, warn};

/// Blur sensitive areas of scanned documents.
#[derive(Debug, Parser)]
#[command(name = "docshield", version, about)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Paint masks, optionally auto-detect PII, and write the redacted result
    Redact(RedactArgs),
    /// Print OCR-detected sensitive regions as JSON
    Detect(DetectArgs),
}

#[derive(Debug, Args)]
struct RedactArgs {
    /// Input image or PDF
    input: PathBuf,

    /// Output image or PDF; the format follows the extension
    output: PathBuf,

    /// Rectangle to blur, as x1,y1,x2,y2 (repeatable)
    #[arg(long = "rect", value_name = "X1,Y1,X2,Y2", value_parser = parse_box)]
    rects: Vec<BoxArg>,

    /// Ellipse to blur, inscribed in x1,y1,x2,y2 (repeatable)
    #[arg(long = "ellipse", value_name = "X1,Y1,X2,Y2", value_parser = parse_box)]
    ellipses: Vec<BoxArg>,

    /// Also blur personal data found by OCR
    #[arg(long)]
    detect: bool,

    /// Blur strength; overrides the config file
    #[arg(long)]
    intensity: Option<u32>,

    /// Number of blur passes; overrides the config file
    #[arg(long)]
    iterations: Option<u32>,

    /// Page to redact when the input is a PDF (1-indexed)
    #[arg(long, default_value_t = 1)]
    page: u32,

    /// Editor config file (defaults to the per-user config)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct DetectArgs {
    /// Input image or PDF
    input: PathBuf,

    /// Page to scan when the input is a PDF (1-indexed)
    #[arg(long, default_value_t = 1)]
    page: u32,

    /// Editor config file (defaults to the per-user config)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Two corners of a box in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BoxArg {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

fn parse_box(value: &str) -> std::result::Result<BoxArg, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<i32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|err| format!("invalid coordinate in '{}': {}", value, err))?;

    match parts.as_slice() {
        [x1, y1, x2, y2] => Ok(BoxArg {
            x1: *x1,
            y1: *y1,
            x2: *x2,
            y2: *y2,
        }),
        _ => Err(format!(
            "expected four comma-separated numbers, got '{}'",
            value
        )),
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    match path {
        Some(path) => EditorConfig::load(path),
        None => Ok(EditorConfig::load_or_default(EditorConfig::default_path())),
    }
}

#[cfg(feature = "ocr")]
fn build_processor(config: &EditorConfig) -> ImageProcessor {
    use docshield_engine::{NoOcr, OcrsRecognizer};

    match &config.ocr_model_dir {
        Some(dir) => match OcrsRecognizer::from_model_dir(dir) {
            Ok(recognizer) => ImageProcessor::with_ocr(Box::new(recognizer)),
            Err(err) => {
                warn!(error = %err, "OCR models unavailable; detection disabled");
                ImageProcessor::with_ocr(Box::new(NoOcr))
            }
        },
        None => ImageProcessor::new(),
    }
}

#[cfg(not(feature = "ocr"))]
fn build_processor(_config: &EditorConfig) -> ImageProcessor {
    ImageProcessor::new()
}

fn load_input(processor: &mut ImageProcessor, input: &Path, page: u32) -> Result<()> {
    if is_pdf(input) {
        processor.load_pdf_page(input, page)
    } else {
        processor.load_image(input)
    }
}

fn run_redact(args: &RedactArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let defaults = config.blur_parameters();
    let params = BlurParameters::new(
        args.intensity.unwrap_or(defaults.intensity),
        args.iterations.unwrap_or(defaults.iterations),
    );

    let mut processor = build_processor(&config);
    load_input(&mut processor, &args.input, args.page)?;

    for rect in &args.rects {
        processor.paint_rectangle(rect.x1, rect.y1, rect.x2, rect.y2, MaskTarget::Committed);
    }
    for ellipse in &args.ellipses {
        processor.paint_ellipse(
            ellipse.x1,
            ellipse.y1,
            ellipse.x2,
            ellipse.y2,
            MaskTarget::Committed,
        );
    }

    if args.detect {
        if !processor.is_ocr_available() {
            warn!("--detect requested but OCR is unavailable");
        }
        let regions = processor.detect_sensitive_info();
        info!(regions = regions.len(), "Detection finished");
        processor.apply_blur_to_sensitive_regions(params);
    }

    if processor.mask().is_blank(false) {
        warn!("Nothing to redact; output will match the input");
    }

    if is_pdf(&args.output) {
        processor.try_export_to_pdf(&args.output, params)?;
    } else {
        processor.try_save_image(&args.output, params)?;
    }
    info!(output = %args.output.display(), "Redacted document written");
    Ok(())
}

fn run_detect(args: &DetectArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let mut processor = build_processor(&config);
    if !processor.is_ocr_available() {
        return Err(DocShieldError::CapabilityUnavailable("OCR"));
    }
    load_input(&mut processor, &args.input, args.page)?;

    let regions = processor.detect_sensitive_info();
    println!("{}", serde_json::to_string_pretty(&regions)?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Redact(args) => run_redact(args),
        Commands::Detect(args) => run_detect(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
