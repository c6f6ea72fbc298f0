use chrono::{Duration, NaiveDate};
use serde::Serialize;

/// Inclusive calendar-day range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    Format(String),

    #[error("start date {start} is after end date {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },

    #[error("range spans {days} days, at most {max} allowed")]
    TooLong { days: i64, max: i64 },
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` bounds and enforce a maximum span.
    pub fn parse(start: &str, end: &str, max_days: i64) -> Result<Self, RangeError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| RangeError::Format(s.to_string()))
        };
        let range = Self::new(parse(start)?, parse(end)?)?;
        if range.len_days() > max_days {
            return Err(RangeError::TooLong { days: range.len_days(), max: max_days });
        }
        Ok(range)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.len_days()).map(move |offset| start + Duration::days(offset))
    }
}
