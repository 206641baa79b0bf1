//! Turning extracted fields into a canonical receipt record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::AssemblyError;
use crate::extract::{ExtractedFields, TotalSource};
use crate::models::config::ExtractionConfig;
use crate::models::receipt::CanonicalReceipt;
use crate::ocr::RawOcrText;

/// Facts about the capture event, supplied by whoever took the picture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureMetadata {
    pub captured_at: DateTime<Utc>,
    pub image_ref: String,
}

impl CaptureMetadata {
    pub fn new(captured_at: DateTime<Utc>, image_ref: impl Into<String>) -> Self {
        Self {
            captured_at,
            image_ref: image_ref.into(),
        }
    }

    /// Capture happening now.
    pub fn now(image_ref: impl Into<String>) -> Self {
        Self::new(Utc::now(), image_ref)
    }
}

/// How the record's total was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalProvenance {
    /// Read from a line carrying a total keyword.
    Labeled,
    /// Largest unlabeled amount on the receipt.
    LargestAmount,
    /// Computed as subtotal + tax.
    Derived,
    /// No total could be found or computed.
    Absent,
}

impl From<TotalSource> for TotalProvenance {
    fn from(source: TotalSource) -> Self {
        match source {
            TotalSource::Labeled => Self::Labeled,
            TotalSource::LargestAmount => Self::LargestAmount,
        }
    }
}

/// Assembled record with its total provenance and advisory warnings.
#[derive(Debug, Clone, Serialize)]
pub struct Assembly {
    pub receipt: CanonicalReceipt,
    pub total_provenance: TotalProvenance,
    pub warnings: Vec<String>,
    /// Confidence of each extracted field.
    pub confidences: BTreeMap<&'static str, f32>,
}

/// Builds canonical records. Stateless apart from its configuration.
#[derive(Debug, Clone)]
pub struct ReceiptAssembler {
    default_currency: String,
    tolerance: Decimal,
}

impl ReceiptAssembler {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            default_currency: config.default_currency.to_uppercase(),
            tolerance: config.total_tolerance,
        }
    }

    /// Assemble a record from extracted fields.
    ///
    /// Missing fields never reject a record; only a negative total does.
    pub fn assemble(
        &self,
        fields: &ExtractedFields,
        capture: &CaptureMetadata,
        raw: &RawOcrText,
    ) -> Result<Assembly, AssemblyError> {
        let currency = fields.currency_or(&self.default_currency).to_uppercase();
        let mut receipt = CanonicalReceipt::new(capture.captured_at, capture.image_ref.clone(), currency);

        receipt.vendor = fields.vendor.as_ref().map(|c| c.value.clone());
        receipt.date = fields.date.as_ref().map(|c| c.value);
        receipt.subtotal = fields.subtotal.as_ref().map(|c| c.value);
        receipt.tax = fields.tax.as_ref().map(|c| c.value);
        receipt.raw_text = raw.text();

        let mut overflow = None;
        let (total, total_provenance) = match (&fields.total, receipt.subtotal, receipt.tax) {
            (Some(total), _, _) => (
                Some(total.value),
                fields
                    .total_source
                    .map(TotalProvenance::from)
                    .unwrap_or(TotalProvenance::Labeled),
            ),
            (None, Some(subtotal), Some(tax)) => match subtotal.checked_add(tax) {
                Some(derived) => {
                    info!("Derived total {} from subtotal {} + tax {}", derived, subtotal, tax);
                    (Some(derived), TotalProvenance::Derived)
                }
                None => {
                    warn!("Subtotal {} + tax {} overflows, total left absent", subtotal, tax);
                    overflow = Some(format!(
                        "Subtotal + tax overflows ({} + {}), total not derived",
                        subtotal, tax
                    ));
                    (None, TotalProvenance::Absent)
                }
            },
            _ => (None, TotalProvenance::Absent),
        };

        if let Some(total) = total {
            if total.is_sign_negative() && !total.is_zero() {
                warn!("Rejecting receipt {} with negative total {}", capture.image_ref, total);
                return Err(AssemblyError::NegativeTotal(total));
            }
        }
        receipt.total = total;

        let mut warnings = receipt.validate(self.tolerance);
        warnings.extend(overflow);
        for warning in &warnings {
            info!("{}: {}", capture.image_ref, warning);
        }

        Ok(Assembly {
            receipt,
            total_provenance,
            warnings,
            confidences: fields.confidences(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::FieldExtractionEngine;
    use chrono::{NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn assemble(lines: &[&str]) -> Result<Assembly, AssemblyError> {
        let config = ExtractionConfig::default();
        let raw = RawOcrText::from_lines(lines.iter().copied());
        let fields = FieldExtractionEngine::new(&config).unwrap().extract(&raw);
        let capture = CaptureMetadata::new(Utc.with_ymd_and_hms(2024, 7, 4, 12, 0, 0).unwrap(), "img/1.jpg");
        ReceiptAssembler::new(&config).assemble(&fields, &capture, &raw)
    }

    #[test]
    fn test_complete_receipt() {
        let assembly = assemble(&["STORE X", "07/04/2024", "Subtotal 10.00", "Tax 1.00", "Total 11.00"]).unwrap();
        let receipt = assembly.receipt;

        assert_eq!(receipt.id, None);
        assert_eq!(receipt.vendor.as_deref(), Some("STORE X"));
        assert_eq!(receipt.date, NaiveDate::from_ymd_opt(2024, 7, 4));
        assert_eq!(receipt.total, Some(dec("11.00")));
        assert_eq!(receipt.currency, "USD");
        assert_eq!(receipt.image_ref, "img/1.jpg");
        assert_eq!(receipt.captured_at, Utc.with_ymd_and_hms(2024, 7, 4, 12, 0, 0).unwrap());
        assert_eq!(receipt.raw_text, "STORE X\n07/04/2024\nSubtotal 10.00\nTax 1.00\nTotal 11.00");
        assert_eq!(assembly.total_provenance, TotalProvenance::Labeled);
        assert!(assembly.warnings.is_empty());
    }

    #[test]
    fn test_total_derived_from_subtotal_and_tax() {
        let assembly = assemble(&["Subtotal 10.00", "Tax 1.00"]).unwrap();

        assert_eq!(assembly.receipt.total, Some(dec("11.00")));
        assert_eq!(assembly.total_provenance, TotalProvenance::Derived);
    }

    #[test]
    fn test_missing_fields_do_not_reject() {
        let assembly = assemble(&[]).unwrap();

        assert_eq!(assembly.receipt.total, None);
        assert_eq!(assembly.total_provenance, TotalProvenance::Absent);
        assert_eq!(assembly.receipt.currency, "USD");
        assert!(assembly.warnings.iter().any(|w| w.contains("Missing total")));
    }

    #[test]
    fn test_negative_total_rejected() {
        let result = assemble(&["Total -5.00"]);
        assert_eq!(result.unwrap_err(), AssemblyError::NegativeTotal(dec("-5.00")));
    }

    #[test]
    fn test_mismatch_is_a_warning() {
        let assembly = assemble(&["Subtotal 10.00", "Tax 1.00", "Total 12.00"]).unwrap();

        assert_eq!(assembly.receipt.total, Some(dec("12.00")));
        assert!(assembly.warnings.iter().any(|w| w.contains("differs")));
    }

    #[test]
    fn test_overflowing_derived_total_left_absent() {
        let assembly = assemble(&[
            "Subtotal 50000000000000000000000000000.00",
            "Tax 50000000000000000000000000000.00",
        ])
        .unwrap();

        assert_eq!(assembly.receipt.subtotal, Some(dec("50000000000000000000000000000")));
        assert_eq!(assembly.receipt.total, None);
        assert_eq!(assembly.total_provenance, TotalProvenance::Absent);
        assert!(assembly.warnings.iter().any(|w| w.contains("overflows")));
    }

    #[test]
    fn test_detected_currency_kept() {
        let assembly = assemble(&["TOTAL 11.00 EUR"]).unwrap();
        assert_eq!(assembly.receipt.currency, "EUR");
    }
}
