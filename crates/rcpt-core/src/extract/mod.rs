//! Heuristic receipt field extraction.

pub mod engine;
pub mod resolve;
pub mod rules;

pub use engine::FieldExtractionEngine;
pub use rules::{AmountRole, Candidate, FieldCandidate};

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Where the extracted total came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalSource {
    /// A line carrying a total keyword.
    Labeled,
    /// No labeled line; the largest unlabeled amount.
    LargestAmount,
}

/// Extraction output: one optional winner per field plus every candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedFields {
    pub date: Option<Candidate<NaiveDate>>,
    pub vendor: Option<Candidate<String>>,
    pub subtotal: Option<Candidate<Decimal>>,
    pub tax: Option<Candidate<Decimal>>,
    pub total: Option<Candidate<Decimal>>,
    pub total_source: Option<TotalSource>,
    pub currency: Option<Candidate<String>>,
    /// All candidates in line order, kept for audit.
    pub candidates: Vec<FieldCandidate>,
}

impl ExtractedFields {
    /// True when no field has a winner.
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.vendor.is_none()
            && self.subtotal.is_none()
            && self.tax.is_none()
            && self.total.is_none()
            && self.currency.is_none()
    }

    /// Detected currency code, or the given default.
    pub fn currency_or(&self, default: &str) -> String {
        self.currency
            .as_ref()
            .map(|c| c.value.clone())
            .unwrap_or_else(|| default.to_string())
    }

    /// Confidence of each field that has a winner.
    pub fn confidences(&self) -> BTreeMap<&'static str, f32> {
        let mut out = BTreeMap::new();
        let mut put = |name: &'static str, confidence: Option<f32>| {
            if let Some(c) = confidence {
                out.insert(name, c);
            }
        };

        put("vendor", self.vendor.as_ref().map(|c| c.confidence));
        put("date", self.date.as_ref().map(|c| c.confidence));
        put("subtotal", self.subtotal.as_ref().map(|c| c.confidence));
        put("tax", self.tax.as_ref().map(|c| c.confidence));
        put("total", self.total.as_ref().map(|c| c.confidence));
        put("currency", self.currency.as_ref().map(|c| c.confidence));

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_confidences_lists_winners_only() {
        let fields = ExtractedFields {
            total: Some(Candidate::new(Decimal::new(1100, 2), 0.9, 4, "11.00", "amount")),
            ..Default::default()
        };

        let confidences = fields.confidences();
        assert_eq!(confidences.len(), 1);
        assert_eq!(confidences.get("total"), Some(&0.9));
        assert!(!fields.is_empty());
    }
}
