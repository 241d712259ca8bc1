use crate::error::{GardenReportError, Result};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar month identifier, ordered by (year, month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        first_day_of_month(self.year, self.month)
    }

    pub fn last_day(&self) -> NaiveDate {
        last_day_of_month(self.year, self.month)
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    /// Short label used on chart axes and table rows, e.g. "2024-03".
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

pub fn first_day_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next = MonthKey::new(year, month).next();

    first_day_of_month(next.year, next.month)
        .checked_sub_days(Days::new(1))
        .unwrap_or(NaiveDate::MIN)
}

pub fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    let year_diff = end.year() - start.year();
    let month_diff = end.month() as i32 - start.month() as i32;
    year_diff * 12 + month_diff
}

/// Lowercase ASCII slug with `_` separators, for file names.
pub fn slugify(text: &str) -> String {
    let ascii = crate::insight::sanitize_narrative(text).to_lowercase();
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_separator = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        "sin_nombre".to_string()
    } else {
        slug
    }
}

/// Parses a period string in the format "YYYY-MM" or "YYYY-MM:YYYY-MM"
/// Returns (start_date, end_date), both inclusive.
pub fn parse_period_string(period: &str) -> Result<(NaiveDate, NaiveDate)> {
    let parts: Vec<&str> = period.split(':').collect();

    let parse_month = |raw: &str| -> Result<NaiveDate> {
        let start_str = format!("{}-01", raw.trim());
        NaiveDate::parse_from_str(&start_str, "%Y-%m-%d").map_err(|_| {
            GardenReportError::InvalidConfig(format!(
                "Invalid month '{}' in period '{}'. Expected YYYY-MM",
                raw, period
            ))
        })
    };

    let (start, end_ref) = match parts.as_slice() {
        [single] => {
            let start = parse_month(single)?;
            (start, start)
        }
        [first, last] => (parse_month(first)?, parse_month(last)?),
        _ => {
            return Err(GardenReportError::InvalidConfig(format!(
                "Invalid period format: {}. Expected 'YYYY-MM' or 'YYYY-MM:YYYY-MM'",
                period
            )))
        }
    };

    let end = last_day_of_month(end_ref.year(), end_ref.month());
    if end < start {
        return Err(GardenReportError::InvalidDateRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    Ok((start, end))
}
