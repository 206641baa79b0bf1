//! Vendor name detection.

use super::{Candidate, FieldCandidate, LineContext, LineRule};

/// Decoration printed around store names on thermal receipts.
fn is_decoration(c: char) -> bool {
    c.is_whitespace() || matches!(c, '*' | '=' | '-' | '_' | '#' | '~' | '|')
}

/// Proposes every line that could be a store name.
///
/// A candidate line has text, no date, no amount and at least one letter.
/// The earliest candidate wins during resolution.
pub struct VendorRule;

impl LineRule for VendorRule {
    fn name(&self) -> &'static str {
        "vendor"
    }

    fn apply(&self, line: &LineContext<'_>) -> Option<FieldCandidate> {
        if line.is_blank() || line.date.is_some() || !line.amounts.is_empty() {
            return None;
        }

        let name = line.text.trim_matches(is_decoration);
        if !name.chars().any(char::is_alphabetic) {
            return None;
        }

        Some(FieldCandidate::Vendor(Candidate::new(
            name.to_string(),
            0.6,
            line.index,
            line.text,
            self.name(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::rules::default_date_matchers;
    use crate::ocr::OcrLine;
    use pretty_assertions::assert_eq;

    fn vendor(text: &str) -> Option<String> {
        let line = OcrLine::new(text);
        let ctx = LineContext::scan(0, &line, &default_date_matchers());
        match VendorRule.apply(&ctx)? {
            FieldCandidate::Vendor(c) => Some(c.value),
            _ => None,
        }
    }

    #[test]
    fn test_plain_name() {
        assert_eq!(vendor("  STORE X  "), Some("STORE X".to_string()));
    }

    #[test]
    fn test_decoration_trimmed() {
        assert_eq!(vendor("*** CORNER CAFE ***"), Some("CORNER CAFE".to_string()));
    }

    #[test]
    fn test_rejected_lines() {
        assert_eq!(vendor(""), None);
        assert_eq!(vendor("07/04/2024"), None);
        assert_eq!(vendor("Milk 2.49"), None);
        assert_eq!(vendor("12345 ---"), None);
    }
}
