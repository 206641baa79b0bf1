//! Durable receipt storage with a flat CSV export.

mod export;
mod sqlite;

pub use export::{write_csv, write_records, CSV_HEADER};
pub use sqlite::SqliteStore;

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::models::receipt::{CanonicalReceipt, ReceiptUpdate};

/// Persistence sink for canonical receipts.
///
/// Every successful mutation is durable when the call returns and is
/// reflected in the flat export.
pub trait ReceiptStore: Send + Sync {
    /// Persist a new receipt and return its id.
    fn save(&self, receipt: &CanonicalReceipt) -> Result<String, StoreError>;

    /// Fetch one receipt.
    fn get(&self, id: &str) -> Result<CanonicalReceipt, StoreError>;

    /// All receipts in capture order.
    fn list_all(&self) -> Result<Vec<CanonicalReceipt>, StoreError>;

    /// Search, filter and paginate, newest receipt date first.
    fn query(&self, query: &ReceiptQuery) -> Result<ReceiptPage, StoreError>;

    /// Apply a manual correction and return the updated receipt.
    fn update(&self, id: &str, update: &ReceiptUpdate) -> Result<CanonicalReceipt, StoreError>;

    /// Remove a receipt and return what was removed.
    fn delete(&self, id: &str) -> Result<CanonicalReceipt, StoreError>;

    /// Aggregate figures over all receipts.
    fn stats(&self) -> Result<StoreStats, StoreError>;
}

/// Filter and page selection for [`ReceiptStore::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptQuery {
    /// Substring matched against vendor and raw text, case-insensitive.
    pub search: Option<String>,
    /// Exact category.
    pub category: Option<String>,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl Default for ReceiptQuery {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            page: 1,
            per_page: 20,
        }
    }
}

impl ReceiptQuery {
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page.max(1);
        self.per_page = per_page.max(1);
        self
    }

    fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.per_page)
    }
}

/// One page of query results.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptPage {
    pub receipts: Vec<CanonicalReceipt>,
    /// Matches across all pages.
    pub total_count: u64,
    pub page: u32,
    pub per_page: u32,
}

impl ReceiptPage {
    pub fn page_count(&self) -> u64 {
        self.total_count.div_ceil(u64::from(self.per_page.max(1)))
    }
}

/// Aggregate figures over the store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub count: u64,
    /// Sum of all totals, regardless of currency.
    pub total_spent: Decimal,
    /// Sum of totals per currency.
    pub by_currency: BTreeMap<String, Decimal>,
    /// Most recently captured receipts, newest first.
    pub recent: Vec<CanonicalReceipt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_offset() {
        assert_eq!(ReceiptQuery::default().offset(), 0);
        assert_eq!(ReceiptQuery::default().with_page(3, 10).offset(), 20);
        assert_eq!(ReceiptQuery::default().with_page(0, 0).offset(), 0);
    }

    #[test]
    fn test_page_count() {
        let page = ReceiptPage {
            receipts: Vec::new(),
            total_count: 41,
            page: 1,
            per_page: 20,
        };
        assert_eq!(page.page_count(), 3);
    }
}
