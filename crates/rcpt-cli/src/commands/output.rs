//! Rendering receipts for the terminal.

use console::style;
use rust_decimal::Decimal;

use rcpt_core::store::write_records;
use rcpt_core::{CanonicalReceipt, ProcessedReceipt, TotalProvenance};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

/// Render a freshly processed receipt.
pub fn format_processed(processed: &ProcessedReceipt, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&processed.assembly)?),
        OutputFormat::Csv => format_csv(std::slice::from_ref(&processed.assembly.receipt)),
        OutputFormat::Text => Ok(format_text(
            &processed.assembly.receipt,
            Some(processed.assembly.total_provenance),
        )),
    }
}

/// Render a stored receipt.
pub fn format_receipt(receipt: &CanonicalReceipt, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(receipt)?),
        OutputFormat::Csv => format_csv(std::slice::from_ref(receipt)),
        OutputFormat::Text => Ok(format_text(receipt, None)),
    }
}

pub fn format_csv(receipts: &[CanonicalReceipt]) -> anyhow::Result<String> {
    let mut out = Vec::new();
    write_records(receipts, &mut out)?;
    Ok(String::from_utf8(out)?)
}

fn format_text(receipt: &CanonicalReceipt, provenance: Option<TotalProvenance>) -> String {
    let mut output = String::new();
    let amount = |v: Option<Decimal>| match v {
        Some(v) => format!("{} {}", v, receipt.currency),
        None => "-".to_string(),
    };

    if let Some(id) = &receipt.id {
        output.push_str(&format!("Receipt: {}\n", id));
    }
    output.push_str(&format!("Vendor:   {}\n", receipt.vendor.as_deref().unwrap_or("-")));
    output.push_str(&format!(
        "Date:     {}\n",
        receipt.date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
    ));
    output.push_str(&format!("Subtotal: {}\n", amount(receipt.subtotal)));
    output.push_str(&format!("Tax:      {}\n", amount(receipt.tax)));

    let total = amount(receipt.total);
    match provenance {
        Some(p) if receipt.total.is_some() => {
            output.push_str(&format!("Total:    {} ({})\n", total, provenance_label(p)))
        }
        _ => output.push_str(&format!("Total:    {}\n", total)),
    }

    for (label, value) in [
        ("Payment", &receipt.payment_method),
        ("Category", &receipt.category),
        ("Notes", &receipt.notes),
    ] {
        if let Some(value) = value {
            output.push_str(&format!("{:<9} {}\n", format!("{}:", label), value));
        }
    }

    output.push_str(&format!("\nCaptured: {}\n", receipt.captured_at.format("%Y-%m-%d %H:%M:%S UTC")));
    output.push_str(&format!("Image:    {}\n", receipt.image_ref));

    if !receipt.edited.is_empty() {
        let fields: Vec<&str> = receipt.edited.iter().map(|f| f.as_str()).collect();
        output.push_str(&format!("Edited:   {}\n", fields.join(", ")));
    }

    output
}

fn provenance_label(provenance: TotalProvenance) -> &'static str {
    match provenance {
        TotalProvenance::Labeled => "labeled",
        TotalProvenance::LargestAmount => "largest amount",
        TotalProvenance::Derived => "subtotal + tax",
        TotalProvenance::Absent => "absent",
    }
}

/// One-line listing entry.
pub fn summary_line(receipt: &CanonicalReceipt) -> String {
    let total = receipt
        .total
        .map(|t| format!("{:>10} {}", t, receipt.currency))
        .unwrap_or_else(|| format!("{:>10} {}", "-", receipt.currency));

    format!(
        "{}  {}  {}  {}",
        style(receipt.id.as_deref().unwrap_or("-")).dim(),
        receipt.date.map(|d| d.to_string()).unwrap_or_else(|| "----------".to_string()),
        total,
        receipt.vendor.as_deref().unwrap_or("(unknown vendor)"),
    )
}

/// Print warnings and confidences to stderr.
pub fn print_diagnostics(processed: &ProcessedReceipt, show_confidence: bool) {
    if !processed.assembly.warnings.is_empty() {
        eprintln!("{}", style("Validation issues:").yellow());
        for warning in &processed.assembly.warnings {
            eprintln!("  - {}", warning);
        }
    }

    if show_confidence {
        eprintln!();
        for (field, confidence) in &processed.assembly.confidences {
            eprintln!("{} {:<9} {:.0}%", style("ℹ").blue(), field, confidence * 100.0);
        }
        eprintln!(
            "{} Processing time: {}ms",
            style("ℹ").blue(),
            processed.processing_time_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn receipt() -> CanonicalReceipt {
        let mut r = CanonicalReceipt::new(Utc.with_ymd_and_hms(2024, 7, 4, 12, 0, 0).unwrap(), "img.jpg", "USD");
        r.vendor = Some("STORE X".to_string());
        r.date = NaiveDate::from_ymd_opt(2024, 7, 4);
        r.total = Some(Decimal::new(1100, 2));
        r
    }

    #[test]
    fn test_text_format() {
        let text = format_text(&receipt(), Some(TotalProvenance::Derived));
        assert!(text.contains("Vendor:   STORE X"));
        assert!(text.contains("Total:    11.00 USD (subtotal + tax)"));
        assert!(text.contains("Tax:      -"));
    }

    #[test]
    fn test_csv_format_has_header() {
        let csv = format_csv(&[receipt()]).unwrap();
        assert!(csv.starts_with("id,captured_at,vendor"));
        assert_eq!(csv.lines().count(), 2);
    }
}
