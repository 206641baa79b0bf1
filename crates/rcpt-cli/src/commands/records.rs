//! Commands over stored receipts: list, show, edit, delete, export, stats.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use clap::Args;
use console::style;
use rust_decimal::Decimal;
use tracing::warn;

use rcpt_core::store::ReceiptStore;
use rcpt_core::{EditableField, ReceiptQuery, ReceiptUpdate};

use super::output::{format_receipt, summary_line, OutputFormat};
use super::{load_config, open_store};

/// Arguments for the list command.
#[derive(Args)]
pub struct ListArgs {
    /// Case-insensitive text matched against vendor and receipt text
    #[arg(short, long)]
    search: Option<String>,

    /// Exact category
    #[arg(long)]
    category: Option<String>,

    /// Page number, starting at 1
    #[arg(short, long, default_value = "1")]
    page: u32,

    /// Receipts per page
    #[arg(long, default_value = "20")]
    per_page: u32,

    /// Print the page as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the show command.
#[derive(Args)]
pub struct ShowArgs {
    /// Receipt id
    id: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Also print the recognized text
    #[arg(long)]
    raw: bool,
}

/// Arguments for the edit command.
#[derive(Args, Default)]
pub struct EditArgs {
    /// Receipt id
    id: String,

    #[arg(long)]
    vendor: Option<String>,

    /// Receipt date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<String>,

    #[arg(long)]
    subtotal: Option<String>,

    #[arg(long)]
    tax: Option<String>,

    #[arg(long)]
    total: Option<String>,

    /// ISO 4217 code
    #[arg(long)]
    currency: Option<String>,

    #[arg(long)]
    payment_method: Option<String>,

    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    notes: Option<String>,

    /// Clear a field (repeatable), e.g. --clear tax
    #[arg(long, value_name = "FIELD")]
    clear: Vec<String>,
}

/// Arguments for the delete command.
#[derive(Args)]
pub struct DeleteArgs {
    /// Receipt id
    id: String,

    /// Also delete the stored image
    #[arg(long)]
    remove_image: bool,
}

/// Arguments for the export command.
#[derive(Args)]
pub struct ExportArgs {
    /// Output file (default: the configured export path)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Arguments for the stats command.
#[derive(Args)]
pub struct StatsArgs {
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

pub async fn list(args: ListArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    let mut query = ReceiptQuery::default().with_page(args.page, args.per_page);
    if let Some(search) = args.search {
        query = query.with_search(search);
    }
    if let Some(category) = args.category {
        query = query.with_category(category);
    }

    let page = store.query(&query)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.receipts.is_empty() {
        println!("No receipts found.");
        return Ok(());
    }

    for receipt in &page.receipts {
        println!("{}", summary_line(receipt));
    }
    println!();
    println!(
        "{} Page {}/{} ({} receipts)",
        style("ℹ").blue(),
        page.page,
        page.page_count().max(1),
        page.total_count
    );

    Ok(())
}

pub async fn show(args: ShowArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    let receipt = store.get(&args.id)?;
    println!("{}", format_receipt(&receipt, args.format)?);

    if args.raw {
        println!("{}", style("Recognized text:").bold());
        println!("{}", receipt.raw_text);
    }

    Ok(())
}

pub async fn edit(args: EditArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let update = build_update(&args)?;
    if update.is_empty() {
        anyhow::bail!("Nothing to change. Pass at least one field option or --clear.");
    }

    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    let receipt = store.update(&args.id, &update)?;
    let fields: Vec<&str> = update.changed_fields().iter().map(|f| f.as_str()).collect();

    println!(
        "{} Updated {} ({})",
        style("✓").green(),
        args.id,
        fields.join(", ")
    );
    println!("{}", format_receipt(&receipt, OutputFormat::Text)?);

    Ok(())
}

/// Translate edit options into a partial update.
fn build_update(args: &EditArgs) -> anyhow::Result<ReceiptUpdate> {
    let mut update = ReceiptUpdate {
        vendor: args.vendor.clone().map(Some),
        date: args.date.as_deref().map(parse_date).transpose()?.map(Some),
        subtotal: args.subtotal.as_deref().map(parse_decimal).transpose()?.map(Some),
        tax: args.tax.as_deref().map(parse_decimal).transpose()?.map(Some),
        total: args.total.as_deref().map(parse_decimal).transpose()?.map(Some),
        currency: args.currency.clone(),
        payment_method: args.payment_method.clone().map(Some),
        category: args.category.clone().map(Some),
        notes: args.notes.clone().map(Some),
    };

    for name in &args.clear {
        let field = EditableField::parse(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown field: {}", name))?;
        match field {
            EditableField::Vendor => update.vendor = Some(None),
            EditableField::Date => update.date = Some(None),
            EditableField::Subtotal => update.subtotal = Some(None),
            EditableField::Tax => update.tax = Some(None),
            EditableField::Total => update.total = Some(None),
            EditableField::Currency => anyhow::bail!("Currency cannot be cleared"),
            EditableField::PaymentMethod => update.payment_method = Some(None),
            EditableField::Category => update.category = Some(None),
            EditableField::Notes => update.notes = Some(None),
        }
    }

    if let Some(currency) = &update.currency {
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            anyhow::bail!("Invalid currency code: {}", currency);
        }
    }

    Ok(update)
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("Invalid date (expected YYYY-MM-DD): {}", s))
}

fn parse_decimal(s: &str) -> anyhow::Result<Decimal> {
    Decimal::from_str(s.trim()).map_err(|_| anyhow::anyhow!("Invalid amount: {}", s))
}

pub async fn delete(args: DeleteArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    let receipt = store.delete(&args.id)?;
    println!("{} Deleted receipt {}", style("✓").green(), args.id);

    if args.remove_image {
        let image = Path::new(&receipt.image_ref);
        if image.is_file() {
            match std::fs::remove_file(image) {
                Ok(()) => println!("{} Removed image {}", style("✓").green(), image.display()),
                Err(e) => warn!("Failed to remove image {}: {}", image.display(), e),
            }
        } else {
            warn!("Image {} not found, nothing removed", image.display());
        }
    }

    Ok(())
}

pub async fn export(args: ExportArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    let path = args.output.unwrap_or_else(|| config.storage.export_path.clone());
    let count = store.export_csv(&path)?;

    println!(
        "{} Exported {} receipts to {}",
        style("✓").green(),
        count,
        path.display()
    );

    Ok(())
}

pub async fn stats(args: StatsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    let stats = store.stats()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Receipts:    {}", stats.count);
    println!("Total spent: {}", stats.total_spent);
    for (currency, total) in &stats.by_currency {
        println!("  {:<4} {:>12}", currency, total);
    }

    if !stats.recent.is_empty() {
        println!();
        println!("{}", style("Recent:").bold());
        for receipt in &stats.recent {
            println!("{}", summary_line(receipt));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(id: &str) -> EditArgs {
        EditArgs {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_update_sets_and_clears() {
        let mut a = args("r1");
        a.total = Some("12.50".to_string());
        a.date = Some("2024-07-04".to_string());
        a.clear = vec!["tax".to_string()];

        let update = build_update(&a).unwrap();
        assert_eq!(update.total, Some(Some(Decimal::new(1250, 2))));
        assert_eq!(update.date, Some(NaiveDate::from_ymd_opt(2024, 7, 4)));
        assert_eq!(update.tax, Some(None));
        assert_eq!(update.vendor, None);
    }

    #[test]
    fn test_build_update_rejects_bad_input() {
        let mut a = args("r1");
        a.date = Some("04/07/2024".to_string());
        assert!(build_update(&a).is_err());

        let mut a = args("r1");
        a.clear = vec!["currency".to_string()];
        assert!(build_update(&a).is_err());

        let mut a = args("r1");
        a.currency = Some("euro".to_string());
        assert!(build_update(&a).is_err());
    }

    #[test]
    fn test_empty_edit() {
        assert!(build_update(&args("r1")).unwrap().is_empty());
    }
}
