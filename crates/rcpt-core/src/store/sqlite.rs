//! SQLite-backed receipt store.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::receipt::{CanonicalReceipt, EditableField, ReceiptUpdate};

use super::export::write_csv;
use super::{ReceiptPage, ReceiptQuery, ReceiptStore, StoreStats};

const CURRENT_SCHEMA_VERSION: i32 = 1;

const COLUMNS: &str = "id, captured_at, image_ref, vendor, date, subtotal, tax, total, currency, \
                       payment_method, category, notes, raw_text, edited";

/// Number of receipts listed in [`StoreStats::recent`].
const RECENT_LIMIT: i64 = 5;

/// Receipt store over a single SQLite connection.
///
/// Writes are serialized by an internal mutex. Each mutation runs in a
/// transaction that also rewrites the CSV export, when one is configured,
/// before committing.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    export_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create a database file, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        info!("Opened receipt database at {}", path.display());
        Self::from_connection(conn)
    }

    /// Database living only as long as the store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, StoreError> {
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            export_path: None,
        })
    }

    /// Keep a CSV export at `path` in step with every mutation.
    pub fn with_export(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = Some(path.into());
        self
    }

    /// Write the full export to an arbitrary path. Returns the row count.
    pub fn export_csv(&self, path: &Path) -> Result<usize, StoreError> {
        let conn = self.connection();
        let receipts = load_all(&conn)?;
        write_csv(&receipts, path)?;
        Ok(receipts.len())
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave SQLite inconsistent.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Rewrite the export from inside a write transaction.
    fn refresh_export(&self, tx: &Transaction<'_>) -> Result<(), StoreError> {
        if let Some(path) = &self.export_path {
            write_csv(&load_all(tx)?, path)?;
        }
        Ok(())
    }
}

fn run_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::Invalid(format!(
            "database version ({}) is newer than supported schema ({})",
            version, CURRENT_SCHEMA_VERSION
        )));
    }
    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    let mut current = version;
    while current < CURRENT_SCHEMA_VERSION {
        current += 1;
        match current {
            1 => tx.execute_batch(include_str!("schemas/schema_v1.sql"))?,
            _ => unreachable!("no migration for schema version {current}"),
        }
        debug!("Migrated receipt database to version {}", current);
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    tx.commit()?;

    Ok(())
}

fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| corrupt(column, value))
}

fn parse_date(value: Option<String>, column: &str) -> Result<Option<NaiveDate>, StoreError> {
    value
        .map(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d").map_err(|_| corrupt(column, &v)))
        .transpose()
}

fn parse_decimal(value: Option<String>, column: &str) -> Result<Option<Decimal>, StoreError> {
    value
        .map(|v| Decimal::from_str(&v).map_err(|_| corrupt(column, &v)))
        .transpose()
}

fn parse_edited(value: &str) -> Result<BTreeSet<EditableField>, StoreError> {
    value
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| EditableField::parse(s).ok_or_else(|| corrupt("edited", s)))
        .collect()
}

fn format_edited(fields: &BTreeSet<EditableField>) -> String {
    fields.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(",")
}

fn corrupt(column: &str, value: &str) -> StoreError {
    StoreError::Corrupt {
        column: column.to_string(),
        value: value.to_string(),
    }
}

fn row_to_receipt(row: &Row) -> Result<CanonicalReceipt, StoreError> {
    let captured_at: String = row.get("captured_at")?;
    let edited: String = row.get("edited")?;

    Ok(CanonicalReceipt {
        id: Some(row.get("id")?),
        captured_at: parse_timestamp(&captured_at, "captured_at")?,
        image_ref: row.get("image_ref")?,
        vendor: row.get("vendor")?,
        date: parse_date(row.get("date")?, "date")?,
        subtotal: parse_decimal(row.get("subtotal")?, "subtotal")?,
        tax: parse_decimal(row.get("tax")?, "tax")?,
        total: parse_decimal(row.get("total")?, "total")?,
        currency: row.get("currency")?,
        payment_method: row.get("payment_method")?,
        category: row.get("category")?,
        notes: row.get("notes")?,
        raw_text: row.get("raw_text")?,
        edited: parse_edited(&edited)?,
    })
}

fn load_where(conn: &Connection, sql: &str, values: &[Value]) -> Result<Vec<CanonicalReceipt>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(values.iter()))?;

    let mut receipts = Vec::new();
    while let Some(row) = rows.next()? {
        receipts.push(row_to_receipt(row)?);
    }
    Ok(receipts)
}

fn load_all(conn: &Connection) -> Result<Vec<CanonicalReceipt>, StoreError> {
    load_where(
        conn,
        &format!("SELECT {COLUMNS} FROM receipts ORDER BY captured_at ASC, created_at ASC"),
        &[],
    )
}

fn load_one(conn: &Connection, id: &str) -> Result<CanonicalReceipt, StoreError> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM receipts WHERE id = ?1"))?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => row_to_receipt(row),
        None => Err(StoreError::NotFound(id.to_string())),
    }
}

fn amount_text(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.to_string())
}

fn date_text(value: Option<NaiveDate>) -> Option<String> {
    value.map(|d| d.format("%Y-%m-%d").to_string())
}

/// LIKE pattern matching `term` anywhere, with wildcards in `term` taken literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn reject_negative_total(receipt: &CanonicalReceipt) -> Result<(), StoreError> {
    match receipt.total {
        Some(total) if total.is_sign_negative() && !total.is_zero() => {
            Err(StoreError::Invalid(format!("total cannot be negative: {}", total)))
        }
        _ => Ok(()),
    }
}

impl ReceiptStore for SqliteStore {
    fn save(&self, receipt: &CanonicalReceipt) -> Result<String, StoreError> {
        reject_negative_total(receipt)?;

        let id = receipt
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = timestamp(&Utc::now());

        let mut conn = self.connection();
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO receipts ({COLUMNS}, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)"
            ),
            params![
                id,
                timestamp(&receipt.captured_at),
                receipt.image_ref,
                receipt.vendor,
                date_text(receipt.date),
                amount_text(receipt.subtotal),
                amount_text(receipt.tax),
                amount_text(receipt.total),
                receipt.currency,
                receipt.payment_method,
                receipt.category,
                receipt.notes,
                receipt.raw_text,
                format_edited(&receipt.edited),
                now,
            ],
        )?;
        self.refresh_export(&tx)?;
        tx.commit()?;

        info!("Saved receipt {} ({})", id, receipt.image_ref);
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<CanonicalReceipt, StoreError> {
        load_one(&self.connection(), id)
    }

    fn list_all(&self) -> Result<Vec<CanonicalReceipt>, StoreError> {
        load_all(&self.connection())
    }

    fn query(&self, query: &ReceiptQuery) -> Result<ReceiptPage, StoreError> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            clauses.push(r"(vendor LIKE ? ESCAPE '\' OR raw_text LIKE ? ESCAPE '\')");
            let pattern = like_pattern(search);
            values.push(Value::Text(pattern.clone()));
            values.push(Value::Text(pattern));
        }
        if let Some(category) = &query.category {
            clauses.push("category = ?");
            values.push(Value::Text(category.clone()));
        }

        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let conn = self.connection();
        let total_count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM receipts{filter}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let per_page = query.per_page.max(1);
        values.push(Value::Integer(i64::from(per_page)));
        values.push(Value::Integer(i64::try_from(query.offset()).unwrap_or(i64::MAX)));

        let receipts = load_where(
            &conn,
            &format!(
                "SELECT {COLUMNS} FROM receipts{filter}
                 ORDER BY date IS NULL, date DESC, captured_at DESC
                 LIMIT ? OFFSET ?"
            ),
            &values,
        )?;

        Ok(ReceiptPage {
            receipts,
            total_count: u64::try_from(total_count).unwrap_or(0),
            page: query.page.max(1),
            per_page,
        })
    }

    fn update(&self, id: &str, update: &ReceiptUpdate) -> Result<CanonicalReceipt, StoreError> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;

        let mut receipt = load_one(&tx, id)?;
        if update.is_empty() {
            return Ok(receipt);
        }
        update.apply(&mut receipt);
        reject_negative_total(&receipt)?;

        tx.execute(
            "UPDATE receipts
             SET vendor = ?1, date = ?2, subtotal = ?3, tax = ?4, total = ?5, currency = ?6,
                 payment_method = ?7, category = ?8, notes = ?9, edited = ?10, updated_at = ?11
             WHERE id = ?12",
            params![
                receipt.vendor,
                date_text(receipt.date),
                amount_text(receipt.subtotal),
                amount_text(receipt.tax),
                amount_text(receipt.total),
                receipt.currency,
                receipt.payment_method,
                receipt.category,
                receipt.notes,
                format_edited(&receipt.edited),
                timestamp(&Utc::now()),
                id,
            ],
        )?;
        self.refresh_export(&tx)?;
        tx.commit()?;

        let changed: Vec<&str> = update.changed_fields().iter().map(|f| f.as_str()).collect();
        info!("Updated receipt {}: {}", id, changed.join(", "));
        Ok(receipt)
    }

    fn delete(&self, id: &str) -> Result<CanonicalReceipt, StoreError> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;

        let receipt = load_one(&tx, id)?;
        tx.execute("DELETE FROM receipts WHERE id = ?1", params![id])?;
        self.refresh_export(&tx)?;
        tx.commit()?;

        info!("Deleted receipt {}", id);
        Ok(receipt)
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.connection();
        let mut stats = StoreStats::default();

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM receipts", [], |row| row.get(0))?;
        stats.count = u64::try_from(count).unwrap_or(0);

        let mut stmt = conn.prepare("SELECT currency, total FROM receipts WHERE total IS NOT NULL")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let currency: String = row.get(0)?;
            let Some(total) = parse_decimal(row.get(1)?, "total")? else {
                continue;
            };
            // Sums saturate at the Decimal limit instead of overflowing.
            stats.total_spent = stats.total_spent.saturating_add(total);
            let sum = stats.by_currency.entry(currency).or_default();
            *sum = sum.saturating_add(total);
        }

        stats.recent = load_where(
            &conn,
            &format!("SELECT {COLUMNS} FROM receipts ORDER BY captured_at DESC LIMIT ?"),
            &[Value::Integer(RECENT_LIMIT)],
        )?;

        Ok(stats)
    }
}

impl SqliteStore {
    /// Whether a receipt id exists, without decoding the row.
    pub fn contains(&self, id: &str) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .connection()
            .query_row("SELECT 1 FROM receipts WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn receipt(vendor: &str, day: u32, total: i64) -> CanonicalReceipt {
        let mut r = CanonicalReceipt::new(
            Utc.with_ymd_and_hms(2024, 7, day, 9, 15, 30).unwrap(),
            format!("images/{vendor}.jpg"),
            "USD",
        );
        r.vendor = Some(vendor.to_string());
        r.date = NaiveDate::from_ymd_opt(2024, 7, day);
        r.subtotal = Some(Decimal::new(total - 100, 2));
        r.tax = Some(Decimal::new(100, 2));
        r.total = Some(Decimal::new(total, 2));
        r.raw_text = format!("{vendor}\nTotal {}", Decimal::new(total, 2));
        r
    }

    #[test]
    fn test_save_then_list_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut original = receipt("STORE X", 4, 1100);
        original.captured_at = Utc::now();
        original.category = Some("groceries".to_string());

        let id = store.save(&original).unwrap();
        let listed = store.list_all().unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id.as_deref(), Some(id.as_str()));

        let mut loaded = listed[0].clone();
        loaded.id = None;
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_absent_fields_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let empty = CanonicalReceipt::new(Utc::now(), "img.jpg", "EUR");

        let id = store.save(&empty).unwrap();
        let mut loaded = store.get(&id).unwrap();
        loaded.id = None;
        assert_eq!(loaded, empty);
    }

    #[test]
    fn test_list_all_in_capture_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save(&receipt("B", 9, 500)).unwrap();
        store.save(&receipt("A", 2, 700)).unwrap();

        let vendors: Vec<String> = store
            .list_all()
            .unwrap()
            .into_iter()
            .filter_map(|r| r.vendor)
            .collect();
        assert_eq!(vendors, vec!["A", "B"]);
    }

    #[test]
    fn test_update_marks_edited() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.save(&receipt("STORE X", 4, 1100)).unwrap();

        let update = ReceiptUpdate {
            vendor: Some(Some("Store X Ltd".to_string())),
            total: Some(Some(Decimal::new(1200, 2))),
            ..Default::default()
        };
        let updated = store.update(&id, &update).unwrap();

        assert_eq!(updated.vendor.as_deref(), Some("Store X Ltd"));
        assert!(updated.is_edited(EditableField::Vendor));
        assert!(updated.is_edited(EditableField::Total));
        assert!(!updated.is_edited(EditableField::Date));
        assert_eq!(store.get(&id).unwrap(), updated);
    }

    #[test]
    fn test_update_rejects_negative_total() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.save(&receipt("STORE X", 4, 1100)).unwrap();

        let update = ReceiptUpdate {
            total: Some(Some(Decimal::new(-100, 2))),
            ..Default::default()
        };
        assert!(matches!(store.update(&id, &update), Err(StoreError::Invalid(_))));
        assert_eq!(store.get(&id).unwrap().total, Some(Decimal::new(1100, 2)));
    }

    #[test]
    fn test_missing_id() {
        let store = SqliteStore::open_in_memory().unwrap();

        assert!(matches!(store.get("nope"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete("nope"), Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.update("nope", &ReceiptUpdate::default()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.save(&receipt("STORE X", 4, 1100)).unwrap();

        let removed = store.delete(&id).unwrap();
        assert_eq!(removed.vendor.as_deref(), Some("STORE X"));
        assert!(!store.contains(&id).unwrap());
    }

    #[test]
    fn test_query_search_category_and_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut coffee = receipt("Corner Cafe", 3, 450);
        coffee.category = Some("dining".to_string());
        store.save(&coffee).unwrap();
        store.save(&receipt("Grocer", 5, 2310)).unwrap();
        let mut late_cafe = receipt("Cafe 100%", 8, 600);
        late_cafe.category = Some("dining".to_string());
        store.save(&late_cafe).unwrap();

        let page = store.query(&ReceiptQuery::default().with_search("cafe")).unwrap();
        let vendors: Vec<_> = page.receipts.iter().filter_map(|r| r.vendor.as_deref()).collect();
        assert_eq!(vendors, vec!["Cafe 100%", "Corner Cafe"]);
        assert_eq!(page.total_count, 2);

        let page = store.query(&ReceiptQuery::default().with_search("100%")).unwrap();
        assert_eq!(page.total_count, 1);

        let page = store.query(&ReceiptQuery::default().with_category("dining").with_page(2, 1)).unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.receipts.len(), 1);
        assert_eq!(page.receipts[0].vendor.as_deref(), Some("Corner Cafe"));
    }

    #[test]
    fn test_stats() {
        let store = SqliteStore::open_in_memory().unwrap();
        for day in 1..=6 {
            store.save(&receipt(&format!("V{day}"), day, 1000)).unwrap();
        }
        let mut euro = receipt("EU", 7, 250);
        euro.currency = "EUR".to_string();
        store.save(&euro).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.count, 7);
        assert_eq!(stats.total_spent, Decimal::new(6250, 2));
        assert_eq!(stats.by_currency.get("EUR"), Some(&Decimal::new(250, 2)));
        assert_eq!(stats.recent.len(), 5);
        assert_eq!(stats.recent[0].vendor.as_deref(), Some("EU"));
    }

    #[test]
    fn test_stats_saturate_on_huge_totals() {
        let store = SqliteStore::open_in_memory().unwrap();
        for (vendor, day) in [("A", 1), ("B", 2)] {
            let mut r = receipt(vendor, day, 0);
            r.total = Some(Decimal::MAX);
            store.save(&r).unwrap();
        }

        let stats = store.stats().unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_spent, Decimal::MAX);
        assert_eq!(stats.by_currency.get("USD"), Some(&Decimal::MAX));
    }

    #[test]
    fn test_export_follows_mutations() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("receipts.csv");
        let store = SqliteStore::open(&dir.path().join("receipts.db"))
            .unwrap()
            .with_export(&export);

        let first = store.save(&receipt("A", 1, 100)).unwrap();
        store.save(&receipt("B", 2, 200)).unwrap();
        assert_eq!(std::fs::read_to_string(&export).unwrap().lines().count(), 3);

        store.delete(&first).unwrap();
        let text = std::fs::read_to_string(&export).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains(",B,"));
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("receipts.db");

        let id = SqliteStore::open(&path).unwrap().save(&receipt("A", 1, 100)).unwrap();
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get(&id).unwrap().vendor.as_deref(), Some("A"));
    }
}
