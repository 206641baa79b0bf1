//! Flat CSV export of the receipt store.

use std::io::Write;
use std::path::Path;

use chrono::SecondsFormat;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StoreError;
use crate::models::receipt::CanonicalReceipt;

/// Export columns, in order.
pub const CSV_HEADER: [&str; 9] = [
    "id",
    "captured_at",
    "vendor",
    "date",
    "subtotal",
    "tax",
    "total",
    "currency",
    "image_ref",
];

/// Write receipts as CSV with a header row. Null fields become empty strings.
pub fn write_records<W: Write>(receipts: &[CanonicalReceipt], out: W) -> Result<(), StoreError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(CSV_HEADER)?;

    for r in receipts {
        let amount = |v: Option<rust_decimal::Decimal>| v.map(|d| d.to_string()).unwrap_or_default();
        writer.write_record([
            r.id.clone().unwrap_or_default(),
            r.captured_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            r.vendor.clone().unwrap_or_default(),
            r.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            amount(r.subtotal),
            amount(r.tax),
            amount(r.total),
            r.currency.clone(),
            r.image_ref.clone(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Replace the file at `path` with a fresh export.
///
/// Written to a temporary file in the same directory and renamed over the
/// target, so readers see either the old or the new file, never a partial one.
pub fn write_csv(receipts: &[CanonicalReceipt], path: &Path) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    write_records(receipts, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;

    debug!("Exported {} receipts to {}", receipts.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn receipt() -> CanonicalReceipt {
        let mut r = CanonicalReceipt::new(Utc.with_ymd_and_hms(2024, 7, 4, 12, 30, 0).unwrap(), "img/1.jpg", "USD");
        r.id = Some("abc".to_string());
        r.vendor = Some("STORE, X".to_string());
        r.date = NaiveDate::from_ymd_opt(2024, 7, 4);
        r.total = Some(Decimal::new(1100, 2));
        r
    }

    #[test]
    fn test_write_records() {
        let mut out = Vec::new();
        write_records(&[receipt()], &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,captured_at,vendor,date,subtotal,tax,total,currency,image_ref");
        assert_eq!(lines[1], "abc,2024-07-04T12:30:00Z,\"STORE, X\",2024-07-04,,,11.00,USD,img/1.jpg");
    }

    #[test]
    fn test_write_csv_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("receipts.csv");

        write_csv(&[receipt(), receipt()], &path).unwrap();
        write_csv(&[receipt()], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
