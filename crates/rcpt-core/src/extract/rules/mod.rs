//! Line rules for receipt field extraction.
//!
//! Each rule looks at one scanned line and may propose a candidate value.
//! Rules never see each other's output; picking winners happens afterwards
//! in [`crate::extract::resolve`].

pub mod amounts;
pub mod currency;
pub mod dates;
pub mod patterns;
pub mod vendor;

pub use amounts::{format_amount, parse_amount, scan_amounts, AmountClassifier, AmountRule, AmountToken};
pub use currency::CurrencyRule;
pub use dates::{default_date_matchers, match_date, DateMatcher, DateRule};
pub use vendor::VendorRule;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::ocr::OcrLine;

/// Trait for line rules.
pub trait LineRule: Send + Sync {
    /// Rule name, recorded on every candidate it produces.
    fn name(&self) -> &'static str;

    /// Propose a candidate for this line, if the line carries one.
    fn apply(&self, line: &LineContext<'_>) -> Option<FieldCandidate>;
}

/// A proposed field value with its confidence and provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate<T> {
    /// Extracted value.
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Index of the source line.
    pub line: usize,
    /// Byte range of the match within the line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
    /// Rule or matcher that produced the value.
    pub rule: &'static str,
}

impl<T> Candidate<T> {
    pub fn new(value: T, confidence: f32, line: usize, source: impl Into<String>, rule: &'static str) -> Self {
        Self {
            value,
            confidence,
            line,
            position: None,
            source: source.into(),
            rule,
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }

    /// Scale confidence by the recognizer's confidence in the source line.
    pub fn scaled(mut self, factor: Option<f32>) -> Self {
        if let Some(f) = factor {
            self.confidence *= f.clamp(0.0, 1.0);
        }
        self
    }
}

/// Role of an amount line, decided by keyword classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountRole {
    Subtotal,
    Tax,
    Total,
    Unclassified,
}

/// Candidate produced by a rule, tagged by field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldCandidate {
    Date(Candidate<NaiveDate>),
    Amount {
        role: AmountRole,
        candidate: Candidate<Decimal>,
    },
    Currency(Candidate<String>),
    Vendor(Candidate<String>),
}

impl FieldCandidate {
    pub fn line(&self) -> usize {
        match self {
            Self::Date(c) => c.line,
            Self::Amount { candidate, .. } => candidate.line,
            Self::Currency(c) | Self::Vendor(c) => c.line,
        }
    }

    pub fn confidence(&self) -> f32 {
        match self {
            Self::Date(c) => c.confidence,
            Self::Amount { candidate, .. } => candidate.confidence,
            Self::Currency(c) | Self::Vendor(c) => c.confidence,
        }
    }

    fn scaled(self, factor: Option<f32>) -> Self {
        match self {
            Self::Date(c) => Self::Date(c.scaled(factor)),
            Self::Amount { role, candidate } => Self::Amount {
                role,
                candidate: candidate.scaled(factor),
            },
            Self::Currency(c) => Self::Currency(c.scaled(factor)),
            Self::Vendor(c) => Self::Vendor(c.scaled(factor)),
        }
    }
}

/// One OCR line with its date match and amount tokens already found.
///
/// Scanning happens once per line; every rule reads the same context.
#[derive(Debug, Clone)]
pub struct LineContext<'a> {
    pub index: usize,
    pub text: &'a str,
    /// Recognizer confidence for the whole line.
    pub ocr_confidence: Option<f32>,
    /// Winning date match on this line.
    pub date: Option<Candidate<NaiveDate>>,
    /// Monetary tokens in order of appearance, date text excluded.
    pub amounts: Vec<AmountToken>,
}

impl<'a> LineContext<'a> {
    pub fn scan(index: usize, line: &'a OcrLine, matchers: &[DateMatcher]) -> Self {
        let text = line.text.as_str();
        let date = match_date(index, text, matchers);
        let amounts = scan_amounts(text);

        Self {
            index,
            text,
            ocr_confidence: line.confidence,
            date,
            amounts,
        }
    }

    /// Last monetary token, the line's amount.
    pub fn amount(&self) -> Option<&AmountToken> {
        self.amounts.last()
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Run a rule and scale its candidate by the line's OCR confidence.
    pub fn apply(&self, rule: &dyn LineRule) -> Option<FieldCandidate> {
        rule.apply(self).map(|c| c.scaled(self.ocr_confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scan_masks_date_text() {
        let line = OcrLine::new("04.07.2024 12.50");
        let ctx = LineContext::scan(0, &line, &default_date_matchers());

        assert_eq!(ctx.date.as_ref().map(|d| d.value), NaiveDate::from_ymd_opt(2024, 7, 4));
        assert_eq!(ctx.amounts.len(), 1);
        assert_eq!(ctx.amount().unwrap().value, Decimal::new(1250, 2));
    }

    #[test]
    fn test_ocr_confidence_scales_candidates() {
        let line = OcrLine::new("STORE X").with_confidence(0.5);
        let ctx = LineContext::scan(0, &line, &default_date_matchers());

        let candidate = ctx.apply(&VendorRule).unwrap();
        assert!((candidate.confidence() - 0.3).abs() < 1e-6);
    }
}
