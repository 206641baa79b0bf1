//! Monetary amount scanning and line classification.

use std::ops::Range;
use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;

use crate::models::config::ExtractionConfig;

use super::patterns::{date_patterns, keyword_pattern, AMOUNT_TOKEN};
use super::{AmountRole, Candidate, FieldCandidate, LineContext, LineRule};

/// A monetary token found on a line.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountToken {
    pub value: Decimal,
    /// Currency symbol written next to the number.
    pub symbol: Option<char>,
    pub start: usize,
    pub end: usize,
}

/// Find monetary tokens on a line.
///
/// Tokens overlapping date text (the `07.04` in `07.04.2024`) and
/// percentages (`8.25%`) are skipped.
pub fn scan_amounts(text: &str) -> Vec<AmountToken> {
    let date_spans: Vec<Range<usize>> = date_patterns()
        .iter()
        .flat_map(|p| p.find_iter(text).map(|m| m.range()))
        .collect();

    let mut tokens = Vec::new();

    for caps in AMOUNT_TOKEN.captures_iter(text) {
        let (Some(whole), Some(int), Some(frac)) = (caps.get(0), caps.name("int"), caps.name("frac"))
        else {
            continue;
        };

        let digits = int.start()..frac.end();
        if date_spans.iter().any(|d| d.start < digits.end && digits.start < d.end) {
            continue;
        }
        if text[whole.end()..].trim_start().starts_with('%') {
            continue;
        }

        let integer: String = int.as_str().chars().filter(char::is_ascii_digit).collect();
        let Ok(mut value) = Decimal::from_str(&format!("{}.{}", integer, frac.as_str())) else {
            continue;
        };
        if caps.name("minus").is_some() || caps.name("minus2").is_some() {
            value.set_sign_negative(true);
        }

        tokens.push(AmountToken {
            value,
            symbol: caps.name("symbol").and_then(|s| s.as_str().chars().next()),
            start: whole.start(),
            end: whole.end(),
        });
    }

    tokens
}

/// Parse a user-written amount ("1,234.56", "1.234,56", "$12", "-3.50").
///
/// When both separators appear, the last one is the decimal point. A lone
/// separator followed by exactly three digits groups thousands.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let negative = s.trim_start().starts_with('-');
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(pos), None) | (None, Some(pos)) => {
            let sep = if cleaned.as_bytes()[pos] == b',' { ',' } else { '.' };
            let single = cleaned.matches(sep).count() == 1;
            if single && cleaned.len() - pos - 1 != 3 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(sep, "")
            }
        }
        (None, None) => cleaned,
    };

    let mut value = Decimal::from_str(&normalized).ok()?;
    if negative {
        value.set_sign_negative(true);
    }
    Some(value)
}

/// Format an amount with two fraction digits.
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

/// Keyword classifiers deciding the role of an amount line.
///
/// Checked in order subtotal, tax, total, so "Subtotal" never counts as a
/// total and "Total tax" counts as tax.
#[derive(Debug, Clone)]
pub struct AmountClassifier {
    subtotal: Option<Regex>,
    tax: Option<Regex>,
    total: Option<Regex>,
}

impl AmountClassifier {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            subtotal: keyword_pattern(&config.subtotal_keywords)?,
            tax: keyword_pattern(&config.tax_keywords)?,
            total: keyword_pattern(&config.total_keywords)?,
        })
    }

    pub fn classify(&self, text: &str) -> AmountRole {
        let matches = |p: &Option<Regex>| p.as_ref().is_some_and(|r| r.is_match(text));

        if matches(&self.subtotal) {
            AmountRole::Subtotal
        } else if matches(&self.tax) {
            AmountRole::Tax
        } else if matches(&self.total) {
            AmountRole::Total
        } else {
            AmountRole::Unclassified
        }
    }
}

/// Proposes one amount per line, tagged with its role.
///
/// A labeled line proposes its last amount. An unlabeled line proposes its
/// largest, so the fallback total sees every token.
#[derive(Debug, Clone)]
pub struct AmountRule {
    classifier: AmountClassifier,
}

impl AmountRule {
    pub fn new(classifier: AmountClassifier) -> Self {
        Self { classifier }
    }
}

impl LineRule for AmountRule {
    fn name(&self) -> &'static str {
        "amount"
    }

    fn apply(&self, line: &LineContext<'_>) -> Option<FieldCandidate> {
        let role = self.classifier.classify(line.text);
        let token = match role {
            AmountRole::Unclassified => line
                .amounts
                .iter()
                .fold(None, |best: Option<&AmountToken>, t| match best {
                    Some(b) if b.value >= t.value => Some(b),
                    _ => Some(t),
                })?,
            _ => line.amount()?,
        };
        let confidence = match role {
            AmountRole::Unclassified => 0.5,
            _ => 0.9,
        };

        let candidate = Candidate::new(
            token.value,
            confidence,
            line.index,
            &line.text[token.start..token.end],
            self.name(),
        )
        .with_position(token.start, token.end);

        Some(FieldCandidate::Amount { role, candidate })
    }
}
