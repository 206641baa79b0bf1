//! Batch processing command for multiple receipt images.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, warn};

use rcpt_core::models::config::RcptConfig;
use rcpt_core::store::ReceiptStore;
use rcpt_core::{CanonicalReceipt, CaptureMetadata, ReceiptPipeline, SqliteStore};

use super::process::{apply_overrides, is_image, stored_image_path, EngineArg};
use super::{load_config, open_store};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern of receipt images
    #[arg(required = true)]
    input: String,

    /// Extract only; do not store anything
    #[arg(long)]
    dry_run: bool,

    /// Print a CSV summary of every file
    #[arg(long)]
    summary: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    /// Recognition engine (overrides config)
    #[arg(short, long, value_enum)]
    engine: Option<EngineArg>,

    /// ONNX model directory (overrides config)
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

/// Result of processing a single file.
struct FileResult {
    path: PathBuf,
    receipt: Option<CanonicalReceipt>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, args.engine, args.model_dir.clone());

    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_image(p))
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    eprintln!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let pipeline = ReceiptPipeline::new(&config)?;
    let store = if args.dry_run { None } else { Some(open_store(&config)?) };

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut results = Vec::with_capacity(files.len());

    for path in files {
        let file_start = Instant::now();
        let result = process_file(&path, &pipeline, store.as_ref(), &config);
        let processing_time_ms = file_start.elapsed().as_millis() as u64;

        match result {
            Ok(receipt) => results.push(FileResult {
                path,
                receipt: Some(receipt),
                error: None,
                processing_time_ms,
            }),
            Err(e) => {
                let error_msg = e.to_string();
                if args.continue_on_error {
                    warn!("Failed to process {}: {}", path.display(), error_msg);
                    results.push(FileResult {
                        path,
                        receipt: None,
                        error: Some(error_msg),
                        processing_time_ms,
                    });
                } else {
                    pb.abandon();
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    anyhow::bail!("Processing failed for {}: {}", path.display(), error_msg);
                }
            }
        }

        pb.inc(1);
    }

    pb.finish_and_clear();

    if args.summary {
        print!("{}", summary_csv(&results)?);
    }

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let succeeded = results.len() - failed;

    eprintln!(
        "{} Processed {} files in {:.1}s: {} succeeded, {} failed",
        style("✓").green(),
        results.len(),
        start.elapsed().as_secs_f64(),
        style(succeeded).green(),
        if failed > 0 { style(failed).red() } else { style(failed).dim() },
    );

    for result in results.iter().filter(|r| r.error.is_some()) {
        eprintln!(
            "  {} {}: {}",
            style("✗").red(),
            result.path.display(),
            result.error.as_deref().unwrap_or_default()
        );
    }

    Ok(())
}

fn process_file(
    path: &Path,
    pipeline: &ReceiptPipeline,
    store: Option<&SqliteStore>,
    config: &RcptConfig,
) -> anyhow::Result<CanonicalReceipt> {
    let captured_at = Utc::now();

    let Some(store) = store else {
        let processed = pipeline.process_path(path, None)?;
        return Ok(processed.assembly.receipt);
    };

    let image_path = stored_image_path(&config.storage.image_dir, path, captured_at);
    let capture = CaptureMetadata::new(captured_at, image_path.display().to_string());
    let mut receipt = pipeline.process_path(path, Some(capture))?.assembly.receipt;

    fs::create_dir_all(&config.storage.image_dir)?;
    fs::copy(path, &image_path)?;
    receipt.id = Some(store.save(&receipt)?);

    Ok(receipt)
}

fn summary_csv(results: &[FileResult]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["file", "status", "id", "vendor", "date", "total", "currency", "time_ms", "error"])?;

    for result in results {
        let receipt = result.receipt.as_ref();
        wtr.write_record([
            result.path.display().to_string(),
            if result.error.is_some() { "failed" } else { "ok" }.to_string(),
            receipt.and_then(|r| r.id.clone()).unwrap_or_default(),
            receipt.and_then(|r| r.vendor.clone()).unwrap_or_default(),
            receipt.and_then(|r| r.date).map(|d| d.to_string()).unwrap_or_default(),
            receipt.and_then(|r| r.total).map(|t| t.to_string()).unwrap_or_default(),
            receipt.map(|r| r.currency.clone()).unwrap_or_default(),
            result.processing_time_ms.to_string(),
            result.error.clone().unwrap_or_default(),
        ])?;
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_summary_csv() {
        let mut receipt = CanonicalReceipt::new(Utc.with_ymd_and_hms(2024, 7, 4, 0, 0, 0).unwrap(), "a.jpg", "EUR");
        receipt.vendor = Some("CAFE".to_string());

        let results = vec![
            FileResult {
                path: PathBuf::from("a.jpg"),
                receipt: Some(receipt),
                error: None,
                processing_time_ms: 12,
            },
            FileResult {
                path: PathBuf::from("b.jpg"),
                receipt: None,
                error: Some("bad image".to_string()),
                processing_time_ms: 3,
            },
        ];

        let csv = summary_csv(&results).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[1], "a.jpg,ok,,CAFE,,,EUR,12,");
        assert_eq!(lines[2], "b.jpg,failed,,,,,,3,bad image");
    }
}
