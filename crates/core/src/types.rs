//! Shared primitive types and the closed reporting window.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Database primary key type.
pub type DbId = i64;

/// UTC timestamp used for every event time column.
pub type Timestamp = DateTime<Utc>;

/// Seconds in one UTC day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Widest reporting window accepted, in days (about ten years).
pub const MAX_RANGE_DAYS: i64 = 3_660;

/// A closed `[begin, end]` window expressed in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub begin: i64,
    pub end: i64,
}

impl TimeRange {
    /// Build a range, rejecting inverted, out-of-calendar or over-long bounds.
    pub fn new(begin: i64, end: i64) -> Result<Self, CoreError> {
        let range = Self { begin, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.begin > self.end {
            return Err(CoreError::Validation(format!(
                "time_range begin ({}) must not be after end ({})",
                self.begin, self.end
            )));
        }
        if self.begin_utc().is_none() || self.end_utc().is_none() {
            return Err(CoreError::Validation(
                "time_range bounds are outside the supported calendar".into(),
            ));
        }
        if self.end - self.begin > MAX_RANGE_DAYS * SECONDS_PER_DAY {
            return Err(CoreError::Validation(format!(
                "time_range must not span more than {MAX_RANGE_DAYS} days"
            )));
        }
        Ok(())
    }

    pub fn begin_utc(&self) -> Option<Timestamp> {
        Utc.timestamp_opt(self.begin, 0).single()
    }

    pub fn end_utc(&self) -> Option<Timestamp> {
        Utc.timestamp_opt(self.end, 0).single()
    }

    /// Whether a timestamp falls inside the closed range.
    pub fn contains(&self, ts: &Timestamp) -> bool {
        let secs = ts.timestamp();
        secs >= self.begin && secs <= self.end
    }

    /// Number of days used to normalise per-day rates: `ceil(span / 1 day)`, at least 1.
    pub fn days(&self) -> i64 {
        let span = self.end - self.begin;
        let days = (span + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
        days.max(1)
    }

    /// First and last calendar day (UTC) touched by the range.
    pub fn calendar_days(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.begin_utc()?.date_naive(), self.end_utc()?.date_naive()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    // -- new ---

    #[test]
    fn rejects_inverted_range() {
        assert!(TimeRange::new(10, 5).is_err());
    }

    #[test]
    fn rejects_range_wider_than_limit() {
        let begin = 1_600_000_000;
        let end = begin + MAX_RANGE_DAYS * SECONDS_PER_DAY;
        assert!(TimeRange::new(begin, end).is_ok());
        assert_matches!(
            TimeRange::new(begin, end + 1),
            Err(CoreError::Validation(msg)) if msg.contains("3660 days")
        );
        assert_matches!(
            TimeRange::new(0, 253_402_300_799),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn accepts_single_instant() {
        let range = TimeRange::new(1_600_000_000, 1_600_000_000).unwrap();
        assert_eq!(range.days(), 1);
    }

    // -- days ---

    #[test]
    fn days_rounds_partial_days_up() {
        let range = TimeRange::new(1592613323, 1593477323).unwrap();
        assert_eq!(range.days(), 10);

        let range = TimeRange::new(0, SECONDS_PER_DAY + 1).unwrap();
        assert_eq!(range.days(), 2);
    }

    // -- contains ---

    #[test]
    fn contains_is_closed_on_both_ends() {
        let range = TimeRange::new(100, 200).unwrap();
        assert!(range.contains(&Utc.timestamp_opt(100, 0).unwrap()));
        assert!(range.contains(&Utc.timestamp_opt(200, 0).unwrap()));
        assert!(!range.contains(&Utc.timestamp_opt(201, 0).unwrap()));
    }
}
