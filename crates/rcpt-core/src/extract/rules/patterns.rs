//! Common regex patterns for receipt extraction.

use lazy_static::lazy_static;
use regex::Regex;

/// Month names and abbreviations, longest first so the alternation prefers full names.
const MONTHS: &str = "january|february|march|april|may|june|july|august|september|october|november|december|sept|jan|feb|mar|apr|jun|jul|aug|sep|oct|nov|dec";

lazy_static! {
    // 2024-07-04, 2024/07/04, 2024.07.04
    pub static ref DATE_ISO: Regex = Regex::new(
        r"\b(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})\b"
    ).unwrap();

    // 4 July 2024, 4th Jul. 2024, 04-Jul-2024
    pub static ref DATE_DAY_MONTH_NAME: Regex = Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?[\s\-]+({})\.?[\s,\-]+(\d{{4}})\b",
        MONTHS
    )).unwrap();

    // July 4, 2024, Jul 04 2024
    pub static ref DATE_MONTH_NAME_DAY: Regex = Regex::new(&format!(
        r"(?i)\b({})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b",
        MONTHS
    )).unwrap();

    // 07/04/2024
    pub static ref DATE_SLASH: Regex = Regex::new(
        r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b"
    ).unwrap();

    // 04-07-2024, 04.07.2024
    pub static ref DATE_DASH_DOT: Regex = Regex::new(
        r"\b(\d{1,2})[-.](\d{1,2})[-.](\d{4})\b"
    ).unwrap();

    // 07/04/24
    pub static ref DATE_SHORT_YEAR: Regex = Regex::new(
        r"\b(\d{1,2})/(\d{1,2})/(\d{2})\b"
    ).unwrap();

    // Monetary token: optional minus and currency symbol, thousands separators, two fraction digits.
    // 11.00, $1,234.56, -5.00, € 10,00, 1.234,56
    pub static ref AMOUNT_TOKEN: Regex = Regex::new(
        r"(?P<minus>-)?(?:(?P<symbol>[$€£¥])\s*)?(?P<minus2>-)?\b(?P<int>\d{1,3}(?:[.,]\d{3})+|\d+)[.,](?P<frac>\d{2})\b"
    ).unwrap();

    // Three uppercase letters standing alone, a candidate ISO 4217 code.
    pub static ref CURRENCY_CODE: Regex = Regex::new(
        r"\b([A-Z]{3})\b"
    ).unwrap();
}

/// All date patterns, for masking date text out of amount scanning.
pub fn date_patterns() -> [&'static Regex; 6] {
    [
        &*DATE_ISO,
        &*DATE_DAY_MONTH_NAME,
        &*DATE_MONTH_NAME_DAY,
        &*DATE_SLASH,
        &*DATE_DASH_DOT,
        &*DATE_SHORT_YEAR,
    ]
}

/// Case-insensitive whole-word matcher for any of the keywords.
///
/// Inner whitespace in a keyword matches any run of whitespace, so
/// "amount due" also matches "AMOUNT   DUE". Returns `None` for an empty list.
pub fn keyword_pattern(keywords: &[String]) -> Result<Option<Regex>, regex::Error> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| {
            k.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect();

    if alternatives.is_empty() {
        return Ok(None);
    }

    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_token_forms() {
        for text in ["11.00", "$11.00", "$ 1,234.56", "10,00", "1.234,56", "-5.00"] {
            assert!(AMOUNT_TOKEN.is_match(text), "{text}");
        }
        for text in ["1,000", "SKU12.50", "12:30", "1234", "12.5"] {
            assert!(!AMOUNT_TOKEN.is_match(text), "{text}");
        }
    }

    #[test]
    fn test_short_year_does_not_match_full_year() {
        assert!(!DATE_SHORT_YEAR.is_match("07/04/2024"));
        assert!(DATE_SHORT_YEAR.is_match("07/04/24"));
    }

    #[test]
    fn test_keyword_pattern() {
        let keywords = vec!["total".to_string(), "amount due".to_string()];
        let pattern = keyword_pattern(&keywords).unwrap().unwrap();

        assert!(pattern.is_match("TOTAL: 11.00"));
        assert!(pattern.is_match("Amount  Due 4.00"));
        assert!(!pattern.is_match("Subtotal 10.00"));
        assert!(keyword_pattern(&[]).unwrap().is_none());
    }
}
