//! Currency detection on amount lines.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::config::ExtractionConfig;

use super::patterns::CURRENCY_CODE;
use super::{Candidate, FieldCandidate, LineContext, LineRule};

/// Detects an ISO code or a known symbol on a line that carries an amount.
#[derive(Debug, Clone)]
pub struct CurrencyRule {
    symbols: BTreeMap<String, String>,
    codes: BTreeSet<String>,
}

impl CurrencyRule {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            symbols: config.currency_symbols.clone(),
            codes: config.currency_codes.iter().map(|c| c.to_uppercase()).collect(),
        }
    }

    fn code(&self, line: &LineContext<'_>) -> Option<Candidate<String>> {
        CURRENCY_CODE.find_iter(line.text).find_map(|m| {
            self.codes.contains(m.as_str()).then(|| {
                Candidate::new(m.as_str().to_string(), 0.9, line.index, m.as_str(), "currency_code")
                    .with_position(m.start(), m.end())
            })
        })
    }

    fn symbol(&self, line: &LineContext<'_>) -> Option<Candidate<String>> {
        // Symbol attached to a token first, then one printed anywhere on the line.
        let attached = line.amounts.iter().find_map(|t| {
            let symbol = t.symbol?.to_string();
            self.symbols.get(&symbol).map(|code| (symbol, code))
        });

        let (symbol, code) = attached.or_else(|| {
            self.symbols
                .iter()
                .filter(|(s, _)| !s.is_empty())
                .filter_map(|(s, code)| line.text.find(s.as_str()).map(|pos| (pos, s, code)))
                .min_by_key(|(pos, _, _)| *pos)
                .map(|(_, s, code)| (s.clone(), code))
        })?;

        Some(Candidate::new(code.clone(), 0.8, line.index, symbol, "currency_symbol"))
    }
}

impl LineRule for CurrencyRule {
    fn name(&self) -> &'static str {
        "currency"
    }

    fn apply(&self, line: &LineContext<'_>) -> Option<FieldCandidate> {
        if line.amounts.is_empty() {
            return None;
        }
        self.code(line)
            .or_else(|| self.symbol(line))
            .map(FieldCandidate::Currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::rules::default_date_matchers;
    use crate::ocr::OcrLine;
    use pretty_assertions::assert_eq;

    fn detect(text: &str) -> Option<(String, f32)> {
        let rule = CurrencyRule::from_config(&ExtractionConfig::default());
        let line = OcrLine::new(text);
        let ctx = LineContext::scan(0, &line, &default_date_matchers());
        match rule.apply(&ctx)? {
            FieldCandidate::Currency(c) => Some((c.value, c.confidence)),
            _ => None,
        }
    }

    #[test]
    fn test_iso_code() {
        assert_eq!(detect("TOTAL 11.00 EUR"), Some(("EUR".to_string(), 0.9)));
    }

    #[test]
    fn test_symbol() {
        assert_eq!(detect("TOTAL $11.00"), Some(("USD".to_string(), 0.8)));
        assert_eq!(detect("TOTAL 11.00 £"), Some(("GBP".to_string(), 0.8)));
    }

    #[test]
    fn test_code_beats_symbol() {
        assert_eq!(detect("$11.00 CAD"), Some(("CAD".to_string(), 0.9)));
    }

    #[test]
    fn test_requires_amount_on_line() {
        assert_eq!(detect("Prices in EUR"), None);
        assert_eq!(detect("WE ACCEPT $"), None);
    }

    #[test]
    fn test_unknown_code_ignored() {
        assert_eq!(detect("TOTAL 11.00 ABC"), None);
    }
}
