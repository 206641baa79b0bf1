//! Date matching for receipt lines.

use chrono::NaiveDate;
use regex::{Captures, Regex};

use super::patterns::{
    DATE_DASH_DOT, DATE_DAY_MONTH_NAME, DATE_ISO, DATE_MONTH_NAME_DAY, DATE_SHORT_YEAR, DATE_SLASH,
};
use super::{Candidate, FieldCandidate, LineContext, LineRule};

/// A date format: pattern, how to read its captures, and how far to trust it.
#[derive(Clone, Copy)]
pub struct DateMatcher {
    pub name: &'static str,
    pub pattern: &'static Regex,
    pub confidence: f32,
    build: fn(&Captures) -> Option<NaiveDate>,
}

impl DateMatcher {
    /// First match on the line that is a real calendar date.
    fn find(&self, index: usize, text: &str) -> Option<Candidate<NaiveDate>> {
        self.pattern.captures_iter(text).find_map(|caps| {
            let date = (self.build)(&caps)?;
            let whole = caps.get(0)?;
            Some(
                Candidate::new(date, self.confidence, index, whole.as_str(), self.name)
                    .with_position(whole.start(), whole.end()),
            )
        })
    }
}

impl std::fmt::Debug for DateMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateMatcher")
            .field("name", &self.name)
            .field("confidence", &self.confidence)
            .finish()
    }
}

/// Date matchers in priority order.
///
/// Slash dates read month-first; the day-first reading only applies when the
/// month-first one is not a valid date (13/07/2024).
pub fn default_date_matchers() -> Vec<DateMatcher> {
    vec![
        DateMatcher {
            name: "iso",
            pattern: &*DATE_ISO,
            confidence: 0.95,
            build: |c| ymd(num(c, 1)?, num(c, 2)?, num(c, 3)?),
        },
        DateMatcher {
            name: "day_month_name",
            pattern: &*DATE_DAY_MONTH_NAME,
            confidence: 0.90,
            build: |c| ymd(num(c, 3)?, month_number(c.get(2)?.as_str())?, num(c, 1)?),
        },
        DateMatcher {
            name: "month_name_day",
            pattern: &*DATE_MONTH_NAME_DAY,
            confidence: 0.90,
            build: |c| ymd(num(c, 3)?, month_number(c.get(1)?.as_str())?, num(c, 2)?),
        },
        DateMatcher {
            name: "us_numeric",
            pattern: &*DATE_SLASH,
            confidence: 0.85,
            build: |c| ymd(num(c, 3)?, num(c, 1)?, num(c, 2)?),
        },
        DateMatcher {
            name: "day_first",
            pattern: &*DATE_DASH_DOT,
            confidence: 0.80,
            build: |c| ymd(num(c, 3)?, num(c, 2)?, num(c, 1)?),
        },
        DateMatcher {
            name: "day_first_slash",
            pattern: &*DATE_SLASH,
            confidence: 0.60,
            build: |c| ymd(num(c, 3)?, num(c, 2)?, num(c, 1)?),
        },
        DateMatcher {
            name: "short_year",
            pattern: &*DATE_SHORT_YEAR,
            confidence: 0.50,
            build: |c| ymd(2000 + num(c, 3)?, num(c, 1)?, num(c, 2)?),
        },
    ]
}

/// Try each matcher in order; the first valid date wins for the line.
pub fn match_date(index: usize, text: &str, matchers: &[DateMatcher]) -> Option<Candidate<NaiveDate>> {
    matchers.iter().find_map(|m| m.find(index, text))
}

fn num(caps: &Captures, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}

fn ymd(year: u32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

/// Convert an English month name or abbreviation to its number.
fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let month = match lower.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Surfaces the date already matched while scanning the line.
pub struct DateRule;

impl LineRule for DateRule {
    fn name(&self) -> &'static str {
        "date"
    }

    fn apply(&self, line: &LineContext<'_>) -> Option<FieldCandidate> {
        line.date.clone().map(FieldCandidate::Date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(text: &str) -> Option<(NaiveDate, &'static str)> {
        match_date(0, text, &default_date_matchers()).map(|c| (c.value, c.rule))
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_iso_date() {
        assert_eq!(date("Date: 2024-07-04 14:22"), Some((d(2024, 7, 4), "iso")));
        assert_eq!(date("2024/07/04"), Some((d(2024, 7, 4), "iso")));
    }

    #[test]
    fn test_month_name_dates() {
        assert_eq!(date("4 July 2024"), Some((d(2024, 7, 4), "day_month_name")));
        assert_eq!(date("04-Jul-2024"), Some((d(2024, 7, 4), "day_month_name")));
        assert_eq!(date("Jul 4, 2024"), Some((d(2024, 7, 4), "month_name_day")));
        assert_eq!(date("SEPT 30 2024"), Some((d(2024, 9, 30), "month_name_day")));
    }

    #[test]
    fn test_slash_dates_prefer_month_first() {
        assert_eq!(date("07/04/2024"), Some((d(2024, 7, 4), "us_numeric")));
        assert_eq!(date("13/07/2024"), Some((d(2024, 7, 13), "day_first_slash")));
    }

    #[test]
    fn test_dash_and_dot_dates_are_day_first() {
        assert_eq!(date("04.07.2024"), Some((d(2024, 7, 4), "day_first")));
        assert_eq!(date("04-07-2024"), Some((d(2024, 7, 4), "day_first")));
    }

    #[test]
    fn test_short_year() {
        assert_eq!(date("07/04/24 10:15"), Some((d(2024, 7, 4), "short_year")));
    }

    #[test]
    fn test_invalid_dates_are_discarded() {
        assert_eq!(date("32/13/2024"), None);
        assert_eq!(date("2024-02-30"), None);
        // An impossible first match does not hide a valid one later on the line.
        assert_eq!(date("2024-13-01 2024-01-13"), Some((d(2024, 1, 13), "iso")));
    }

    #[test]
    fn test_no_date() {
        assert_eq!(date("Total 11.00"), None);
        assert_eq!(date(""), None);
    }

    #[test]
    fn test_month_number() {
        assert_eq!(month_number("September"), Some(9));
        assert_eq!(month_number("dec"), Some(12));
        assert_eq!(month_number("xx"), None);
    }
}
