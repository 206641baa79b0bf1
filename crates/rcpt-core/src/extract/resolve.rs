//! Picking one winner per field from the candidates all rules produced.

use rust_decimal::Decimal;

use super::rules::{AmountRole, Candidate, FieldCandidate};
use super::{ExtractedFields, TotalSource};

/// Highest confidence; the earliest line wins a tie.
pub fn highest_confidence<'a, T: 'a>(
    candidates: impl IntoIterator<Item = &'a Candidate<T>>,
) -> Option<&'a Candidate<T>> {
    candidates.into_iter().fold(None, |best, c| match best {
        Some(b) if b.confidence > c.confidence => Some(b),
        Some(b) if b.confidence == c.confidence && b.line <= c.line => Some(b),
        _ => Some(c),
    })
}

/// Candidate from the latest line.
pub fn last_line<'a, T: 'a>(
    candidates: impl IntoIterator<Item = &'a Candidate<T>>,
) -> Option<&'a Candidate<T>> {
    candidates.into_iter().fold(None, |best, c| match best {
        Some(b) if b.line > c.line => Some(b),
        _ => Some(c),
    })
}

/// Candidate from the earliest line.
pub fn first_line<'a, T: 'a>(
    candidates: impl IntoIterator<Item = &'a Candidate<T>>,
) -> Option<&'a Candidate<T>> {
    candidates.into_iter().fold(None, |best, c| match best {
        Some(b) if b.line <= c.line => Some(b),
        _ => Some(c),
    })
}

/// Largest amount; the earliest line wins a tie.
pub fn largest_value<'a>(
    candidates: impl IntoIterator<Item = &'a Candidate<Decimal>>,
) -> Option<&'a Candidate<Decimal>> {
    candidates.into_iter().fold(None, |best, c| match best {
        Some(b) if b.value > c.value => Some(b),
        Some(b) if b.value == c.value && b.line <= c.line => Some(b),
        _ => Some(c),
    })
}

/// Combine every candidate into the final field set.
///
/// Total: the last labeled total line, else the largest unlabeled amount.
/// Subtotal and tax: the last labeled line. Date and currency: highest
/// confidence. Vendor: the first candidate line.
pub fn resolve(candidates: Vec<FieldCandidate>) -> ExtractedFields {
    let mut dates = Vec::new();
    let mut currencies = Vec::new();
    let mut vendors = Vec::new();
    let mut subtotals = Vec::new();
    let mut taxes = Vec::new();
    let mut totals = Vec::new();
    let mut unclassified = Vec::new();

    for candidate in &candidates {
        match candidate {
            FieldCandidate::Date(c) => dates.push(c),
            FieldCandidate::Currency(c) => currencies.push(c),
            FieldCandidate::Vendor(c) => vendors.push(c),
            FieldCandidate::Amount { role, candidate } => match role {
                AmountRole::Subtotal => subtotals.push(candidate),
                AmountRole::Tax => taxes.push(candidate),
                AmountRole::Total => totals.push(candidate),
                AmountRole::Unclassified => unclassified.push(candidate),
            },
        }
    }

    let (total, total_source) = match last_line(totals) {
        Some(labeled) => (Some(labeled.clone()), Some(TotalSource::Labeled)),
        None => match largest_value(unclassified) {
            Some(largest) => (Some(largest.clone()), Some(TotalSource::LargestAmount)),
            None => (None, None),
        },
    };

    ExtractedFields {
        date: highest_confidence(dates).cloned(),
        vendor: first_line(vendors).cloned(),
        subtotal: last_line(subtotals).cloned(),
        tax: last_line(taxes).cloned(),
        total,
        total_source,
        currency: highest_confidence(currencies).cloned(),
        candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn amount(value: i64, line: usize, confidence: f32) -> Candidate<Decimal> {
        Candidate::new(Decimal::new(value, 2), confidence, line, "", "amount")
    }

    #[test]
    fn test_highest_confidence_tie_keeps_earliest() {
        let a = amount(100, 3, 0.9);
        let b = amount(200, 1, 0.9);
        let c = amount(300, 2, 0.5);
        assert_eq!(highest_confidence([&a, &b, &c]).map(|w| w.line), Some(1));
    }

    #[test]
    fn test_largest_value_tie_keeps_earliest() {
        let a = amount(2310, 4, 0.5);
        let b = amount(2310, 2, 0.5);
        let c = amount(999, 0, 0.5);
        assert_eq!(largest_value([&a, &b, &c]).map(|w| w.line), Some(2));
    }

    #[test]
    fn test_last_and_first_line() {
        let a = amount(1, 0, 0.9);
        let b = amount(2, 5, 0.9);
        assert_eq!(last_line([&a, &b]).map(|w| w.line), Some(5));
        assert_eq!(first_line([&b, &a]).map(|w| w.line), Some(0));
        assert!(last_line(Vec::<&Candidate<Decimal>>::new()).is_none());
    }

    #[test]
    fn test_labeled_total_beats_larger_unlabeled() {
        let fields = resolve(vec![
            FieldCandidate::Amount {
                role: AmountRole::Unclassified,
                candidate: amount(5000, 0, 0.5),
            },
            FieldCandidate::Amount {
                role: AmountRole::Total,
                candidate: amount(1100, 1, 0.9),
            },
        ]);

        assert_eq!(fields.total.map(|t| t.value), Some(Decimal::new(1100, 2)));
        assert_eq!(fields.total_source, Some(TotalSource::Labeled));
    }
}
