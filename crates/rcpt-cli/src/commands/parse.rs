//! Parse command - extract fields from text that was recognized elsewhere.

use std::io::Read;
use std::path::PathBuf;

use clap::Args;
use console::style;

use rcpt_core::store::ReceiptStore;
use rcpt_core::{CaptureMetadata, RawOcrText, ReceiptParser};

use super::output::{format_processed, print_diagnostics, OutputFormat};
use super::{load_config, open_store};

/// Arguments for the parse command.
#[derive(Args)]
pub struct ParseArgs {
    /// Text file with one OCR line per line ("-" for stdin)
    #[arg(required = true)]
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Store the resulting receipt
    #[arg(long)]
    save: bool,

    /// Image reference recorded with the receipt (default: the input path)
    #[arg(long)]
    image_ref: Option<String>,

    /// Show extraction confidence scores
    #[arg(long)]
    show_confidence: bool,
}

pub async fn run(args: ParseArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let text = if args.input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&args.input)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", args.input.display(), e))?
    };

    let image_ref = args
        .image_ref
        .clone()
        .unwrap_or_else(|| args.input.display().to_string());

    let parser = ReceiptParser::new(&config)?;
    let mut processed = parser.parse(RawOcrText::from_text(&text), &CaptureMetadata::now(image_ref))?;

    if args.save {
        let store = open_store(&config)?;
        processed.assembly.receipt.id = Some(store.save(&processed.assembly.receipt)?);
    }

    println!("{}", format_processed(&processed, args.format)?);

    if let Some(id) = &processed.assembly.receipt.id {
        eprintln!("{} Saved receipt {}", style("✓").green(), id);
    }
    print_diagnostics(&processed, args.show_confidence);

    Ok(())
}
