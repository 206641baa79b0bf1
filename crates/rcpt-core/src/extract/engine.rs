//! Field extraction engine: scan lines, run rules, resolve winners.

use std::time::Instant;

use tracing::debug;

use crate::error::{RcptError, Result};
use crate::models::config::ExtractionConfig;
use crate::ocr::RawOcrText;

use super::resolve::resolve;
use super::rules::{
    default_date_matchers, AmountClassifier, AmountRule, CurrencyRule, DateMatcher, DateRule,
    LineContext, LineRule, VendorRule,
};
use super::ExtractedFields;

/// Heuristic receipt field extractor.
///
/// Immutable after construction and safe to share between threads.
/// Extraction is total: any sequence of lines, including an empty one or
/// pure noise, yields a field set.
pub struct FieldExtractionEngine {
    matchers: Vec<DateMatcher>,
    rules: Vec<Box<dyn LineRule>>,
}

impl FieldExtractionEngine {
    /// Build the default rule set from configuration.
    ///
    /// Fails only if a configured keyword cannot be compiled into a pattern.
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let classifier = AmountClassifier::from_config(config)
            .map_err(|e| RcptError::Config(format!("invalid extraction keyword: {}", e)))?;

        Ok(Self {
            matchers: default_date_matchers(),
            rules: vec![
                Box::new(DateRule),
                Box::new(AmountRule::new(classifier)),
                Box::new(CurrencyRule::from_config(config)),
                Box::new(VendorRule),
            ],
        })
    }

    /// Names of the active rules, in order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Extract fields from recognized text.
    pub fn extract(&self, raw: &RawOcrText) -> ExtractedFields {
        let start = Instant::now();

        let candidates = raw
            .lines()
            .iter()
            .enumerate()
            .map(|(index, line)| LineContext::scan(index, line, &self.matchers))
            .flat_map(|ctx| {
                self.rules
                    .iter()
                    .filter_map(|rule| ctx.apply(rule.as_ref()))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        debug!(
            "Scanned {} lines, {} candidates",
            raw.len(),
            candidates.len()
        );

        let fields = resolve(candidates);

        debug!(
            "Extraction finished in {}us: vendor={:?} date={:?} total={:?} ({:?})",
            start.elapsed().as_micros(),
            fields.vendor.as_ref().map(|c| &c.value),
            fields.date.as_ref().map(|c| c.value),
            fields.total.as_ref().map(|c| c.value),
            fields.total_source,
        );

        fields
    }

    /// Extract fields from plain lines.
    pub fn extract_lines<S: AsRef<str>>(&self, lines: &[S]) -> ExtractedFields {
        self.extract(&RawOcrText::from_lines(lines.iter().map(|l| l.as_ref())))
    }
}
