//! Canonical receipt record and manual edits.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The single authoritative representation of a receipt after extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalReceipt {
    /// Store-assigned identifier. `None` until persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// When the image was captured or uploaded.
    pub captured_at: DateTime<Utc>,

    /// Path or identifier of the source image.
    pub image_ref: String,

    /// Merchant name.
    pub vendor: Option<String>,

    /// Purchase date printed on the receipt.
    pub date: Option<NaiveDate>,

    /// Amount before tax.
    pub subtotal: Option<Decimal>,

    /// Tax amount.
    pub tax: Option<Decimal>,

    /// Grand total.
    pub total: Option<Decimal>,

    /// ISO 4217 currency code.
    pub currency: String,

    /// Payment method, entered by hand.
    pub payment_method: Option<String>,

    /// Spending category, entered by hand.
    pub category: Option<String>,

    /// Free-form notes.
    pub notes: Option<String>,

    /// OCR output, verbatim.
    pub raw_text: String,

    /// Fields corrected by a person after extraction.
    #[serde(default)]
    pub edited: BTreeSet<EditableField>,
}

impl CanonicalReceipt {
    /// Create a record with every extracted field absent.
    pub fn new(captured_at: DateTime<Utc>, image_ref: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            id: None,
            captured_at,
            image_ref: image_ref.into(),
            vendor: None,
            date: None,
            subtotal: None,
            tax: None,
            total: None,
            currency: currency.into(),
            payment_method: None,
            category: None,
            notes: None,
            raw_text: String::new(),
            edited: BTreeSet::new(),
        }
    }

    /// Whether a field was changed by hand.
    pub fn is_edited(&self, field: EditableField) -> bool {
        self.edited.contains(&field)
    }

    /// Advisory consistency checks. Never blocks persistence.
    pub fn validate(&self, tolerance: Decimal) -> Vec<String> {
        let mut issues = Vec::new();

        if self.vendor.is_none() {
            issues.push("Missing vendor".to_string());
        }
        if self.date.is_none() {
            issues.push("Missing date".to_string());
        }
        if self.total.is_none() {
            issues.push("Missing total".to_string());
        }

        if let (Some(subtotal), Some(tax), Some(total)) = (self.subtotal, self.tax, self.total) {
            // Amounts near the Decimal limit cannot be compared; skip the check.
            let difference = subtotal
                .checked_add(tax)
                .and_then(|expected| expected.checked_sub(total).map(|d| (expected, d)));
            if let Some((expected, difference)) = difference {
                if difference.abs() > tolerance {
                    issues.push(format!(
                        "Subtotal + tax ({}) differs from total ({})",
                        expected, total
                    ));
                }
            }
        }

        issues
    }
}

/// Fields a person may correct after extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditableField {
    Vendor,
    Date,
    Subtotal,
    Tax,
    Total,
    Currency,
    PaymentMethod,
    Category,
    Notes,
}

impl EditableField {
    pub const ALL: [EditableField; 9] = [
        EditableField::Vendor,
        EditableField::Date,
        EditableField::Subtotal,
        EditableField::Tax,
        EditableField::Total,
        EditableField::Currency,
        EditableField::PaymentMethod,
        EditableField::Category,
        EditableField::Notes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EditableField::Vendor => "vendor",
            EditableField::Date => "date",
            EditableField::Subtotal => "subtotal",
            EditableField::Tax => "tax",
            EditableField::Total => "total",
            EditableField::Currency => "currency",
            EditableField::PaymentMethod => "payment_method",
            EditableField::Category => "category",
            EditableField::Notes => "notes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == s.trim())
    }
}

impl fmt::Display for EditableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial update of a stored receipt.
///
/// The outer `Option` says whether the field is being changed; the inner one,
/// for nullable fields, allows clearing it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptUpdate {
    pub vendor: Option<Option<String>>,
    pub date: Option<Option<NaiveDate>>,
    pub subtotal: Option<Option<Decimal>>,
    pub tax: Option<Option<Decimal>>,
    pub total: Option<Option<Decimal>>,
    pub currency: Option<String>,
    pub payment_method: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

impl ReceiptUpdate {
    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Fields this update touches.
    pub fn changed_fields(&self) -> Vec<EditableField> {
        let flags = [
            (self.vendor.is_some(), EditableField::Vendor),
            (self.date.is_some(), EditableField::Date),
            (self.subtotal.is_some(), EditableField::Subtotal),
            (self.tax.is_some(), EditableField::Tax),
            (self.total.is_some(), EditableField::Total),
            (self.currency.is_some(), EditableField::Currency),
            (self.payment_method.is_some(), EditableField::PaymentMethod),
            (self.category.is_some(), EditableField::Category),
            (self.notes.is_some(), EditableField::Notes),
        ];

        flags
            .into_iter()
            .filter_map(|(set, field)| set.then_some(field))
            .collect()
    }

    /// Apply to a record, marking every touched field as edited.
    pub fn apply(&self, receipt: &mut CanonicalReceipt) {
        if let Some(vendor) = &self.vendor {
            receipt.vendor = vendor.clone();
        }
        if let Some(date) = self.date {
            receipt.date = date;
        }
        if let Some(subtotal) = self.subtotal {
            receipt.subtotal = subtotal;
        }
        if let Some(tax) = self.tax {
            receipt.tax = tax;
        }
        if let Some(total) = self.total {
            receipt.total = total;
        }
        if let Some(currency) = &self.currency {
            receipt.currency = currency.to_uppercase();
        }
        if let Some(payment_method) = &self.payment_method {
            receipt.payment_method = payment_method.clone();
        }
        if let Some(category) = &self.category {
            receipt.category = category.clone();
        }
        if let Some(notes) = &self.notes {
            receipt.notes = notes.clone();
        }

        receipt.edited.extend(self.changed_fields());
    }
}
