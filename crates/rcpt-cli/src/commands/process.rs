//! Process command - capture a single receipt image.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use uuid::Uuid;

use rcpt_core::models::config::{EngineKind, RcptConfig};
use rcpt_core::store::ReceiptStore;
use rcpt_core::{CaptureMetadata, ReceiptPipeline};

use super::output::{format_processed, print_diagnostics, OutputFormat};
use super::{load_config, open_store};

/// Image extensions accepted as receipt input.
pub const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Receipt image
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Extract only; do not store the receipt or its image
    #[arg(long)]
    dry_run: bool,

    /// Recognition engine (overrides config)
    #[arg(short, long, value_enum)]
    engine: Option<EngineArg>,

    /// ONNX model directory (overrides config)
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Show extraction confidence scores
    #[arg(long)]
    show_confidence: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum EngineArg {
    /// External tesseract binary
    Tesseract,
    /// Built-in ONNX recognizer
    Onnx,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Tesseract => EngineKind::Tesseract,
            EngineArg::Onnx => EngineKind::Onnx,
        }
    }
}

/// Apply command-line OCR overrides to the loaded configuration.
pub fn apply_overrides(config: &mut RcptConfig, engine: Option<EngineArg>, model_dir: Option<PathBuf>) {
    if let Some(engine) = engine {
        config.ocr.engine = engine.into();
    }
    if let Some(dir) = model_dir {
        config.ocr.model_dir = dir;
    }
}

pub fn is_image(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}

/// Where a captured image is kept once its receipt is stored.
///
/// Named `<capture date>-<uuid v4>.<ext>`, unique per call.
pub fn stored_image_path(image_dir: &Path, input: &Path, captured_at: DateTime<Utc>) -> PathBuf {
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| "img".to_string());
    image_dir.join(format!("{}-{}.{}", captured_at.format("%Y%m%d"), Uuid::new_v4(), ext))
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, args.engine, args.model_dir.clone());

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if !is_image(&args.input) {
        anyhow::bail!("Unsupported file format: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Loading recognizer...");

    let pipeline = ReceiptPipeline::new(&config)?;

    let captured_at = Utc::now();
    let image_ref = if args.dry_run {
        args.input.display().to_string()
    } else {
        stored_image_path(&config.storage.image_dir, &args.input, captured_at)
            .display()
            .to_string()
    };

    pb.set_message("Running OCR...");
    let processed = pipeline.process_path(&args.input, Some(CaptureMetadata::new(captured_at, image_ref.clone())));

    let mut processed = match processed {
        Ok(p) => p,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e.into());
        }
    };

    if !args.dry_run {
        pb.set_message("Saving receipt...");
        fs::create_dir_all(&config.storage.image_dir)?;
        fs::copy(&args.input, &image_ref)?;

        let store = open_store(&config)?;
        let id = store.save(&processed.assembly.receipt)?;
        debug!("Stored receipt {} with image {}", id, image_ref);
        processed.assembly.receipt.id = Some(id);
    }

    pb.finish_and_clear();

    let output = format_processed(&processed, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if let Some(id) = &processed.assembly.receipt.id {
        eprintln!("{} Saved receipt {}", style("✓").green(), id);
    }

    print_diagnostics(&processed, args.show_confidence);

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}
