//! Calendar bucketing of per-day counts into dense day/week/month series.
//!
//! Sources count matching events per day in a single grouped pass; this
//! module fills every calendar period of the closed range (zero-count
//! periods included) and rolls the days up into ISO weeks (Monday start)
//! and calendar months. All dates are UTC.

use std::collections::BTreeMap;

use chrono::{Datelike, Days, Months, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::filter::field::Field;
use crate::profile::EventSource;
use crate::types::TimeRange;

/// Stack label for events without a value for the stack dimension.
pub const UNKNOWN_STACK: &str = "unknown";

// ---------------------------------------------------------------------------
// Granularity and stack dimensions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }

    /// First day of the period containing `date`.
    pub fn period_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => date
                .checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
                .unwrap_or(date),
            Granularity::Month => {
                NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
            }
        }
    }

    /// First day of the following period.
    pub fn next_period(self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => start.checked_add_days(Days::new(1)),
            Granularity::Week => start.checked_add_days(Days::new(7)),
            Granularity::Month => start.checked_add_months(Months::new(1)),
        }
    }

    pub fn label(self, start: NaiveDate) -> String {
        match self {
            Granularity::Day | Granularity::Week => start.format("%Y-%m-%d").to_string(),
            Granularity::Month => start.format("%Y-%m").to_string(),
        }
    }
}

/// Secondary dimension a series can be stacked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackKey {
    JobName,
    Project,
    RepoId,
    TriageRule,
    Branch,
    Creator,
}

impl StackKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StackKey::JobName => "job_name",
            StackKey::Project => "project",
            StackKey::RepoId => "repo_id",
            StackKey::TriageRule => "triage_rule",
            StackKey::Branch => "branch",
            StackKey::Creator => "creator",
        }
    }

    /// Attribute stacked on for a source, if the source has one.
    pub fn field_for(self, source: EventSource) -> Option<Field> {
        match (self, source) {
            (StackKey::JobName, EventSource::JobRun) => Some(Field::JobName),
            (StackKey::JobName, _) => None,
            (StackKey::Project, _) => Some(Field::Project),
            (StackKey::RepoId, EventSource::PullRequest | EventSource::Commit) => {
                Some(Field::RepoId)
            }
            (StackKey::RepoId, EventSource::JobRun) => {
                Some(Field::Metadata(crate::filter::field::MetadataKey::Repository))
            }
            (StackKey::RepoId, EventSource::Issue) => None,
            (StackKey::TriageRule, EventSource::JobRun) => Some(Field::TriageRule),
            (StackKey::TriageRule, _) => None,
            (StackKey::Branch, source) => Field::branch_for(source),
            (StackKey::Creator, source) => Some(Field::user_for(source)),
        }
    }

    /// Reject stack dimensions the source does not carry.
    pub fn validate_for(self, source: EventSource) -> Result<(), CoreError> {
        match self.field_for(source) {
            Some(_) => Ok(()),
            None => Err(CoreError::InvalidFilter(format!(
                "cannot stack {} by {}",
                source.as_str(),
                self.as_str()
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Rows and series
// ---------------------------------------------------------------------------

/// One grouped row produced by a source: count for the period starting at `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRow {
    pub start: NaiveDate,
    pub count: i64,
    #[serde(default)]
    pub stacks: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesBucket {
    /// Period start as epoch seconds (UTC midnight).
    pub key: i64,
    pub label: String,
    pub count: i64,
    /// Present when the series is stacked; values sum to `count`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacks: Option<BTreeMap<String, i64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub day: Vec<TimeSeriesBucket>,
    pub week: Vec<TimeSeriesBucket>,
    pub month: Vec<TimeSeriesBucket>,
}

impl TimeSeries {
    /// Total count across the range (sum of day buckets).
    pub fn total(&self) -> i64 {
        self.day.iter().map(|b| b.count).sum()
    }
}

/// Calendar periods of a granularity touched by the range, in order.
pub fn calendar_periods(range: &TimeRange, granularity: Granularity) -> Vec<NaiveDate> {
    let Some((first, last)) = range.calendar_days() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut current = Some(granularity.period_start(first));
    while let Some(start) = current {
        if start > last {
            break;
        }
        out.push(start);
        current = granularity.next_period(start);
    }
    out
}

/// Merge rows that share a period start.
pub fn fold_rows(rows: impl IntoIterator<Item = BucketRow>) -> BTreeMap<NaiveDate, BucketRow> {
    let mut out: BTreeMap<NaiveDate, BucketRow> = BTreeMap::new();
    for row in rows {
        let entry = out.entry(row.start).or_insert_with(|| BucketRow {
            start: row.start,
            count: 0,
            stacks: BTreeMap::new(),
        });
        entry.count += row.count;
        for (label, n) in row.stacks {
            *entry.stacks.entry(label).or_insert(0) += n;
        }
    }
    out
}

/// Build dense day/week/month series from per-day rows.
///
/// Rows outside the range's calendar days are ignored. When `stacked` is
/// set every bucket carries a stack map (empty for zero-count buckets).
pub fn build_time_series(range: &TimeRange, day_rows: Vec<BucketRow>, stacked: bool) -> TimeSeries {
    let days = fold_rows(day_rows);
    TimeSeries {
        day: series(range, Granularity::Day, &days, stacked),
        week: series(range, Granularity::Week, &days, stacked),
        month: series(range, Granularity::Month, &days, stacked),
    }
}

fn series(
    range: &TimeRange,
    granularity: Granularity,
    days: &BTreeMap<NaiveDate, BucketRow>,
    stacked: bool,
) -> Vec<TimeSeriesBucket> {
    let Some((first, last)) = range.calendar_days() else {
        return Vec::new();
    };
    calendar_periods(range, granularity)
        .into_iter()
        .map(|start| {
            let end = granularity.next_period(start);
            let mut count = 0;
            let mut stacks = BTreeMap::new();
            let in_period = days.range(start.max(first)..).take_while(|(day, _)| {
                **day <= last && end.map_or(true, |end| **day < end)
            });
            for (_, row) in in_period {
                count += row.count;
                for (label, n) in &row.stacks {
                    *stacks.entry(label.clone()).or_insert(0) += n;
                }
            }
            TimeSeriesBucket {
                key: start.and_time(NaiveTime::MIN).and_utc().timestamp(),
                label: granularity.label(start),
                count,
                stacks: stacked.then_some(stacks),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ts(y: i32, m: u32, d: u32) -> i64 {
        date(y, m, d).and_time(NaiveTime::MIN).and_utc().timestamp()
    }

    fn row(day: NaiveDate, count: i64, stacks: &[(&str, i64)]) -> BucketRow {
        BucketRow {
            start: day,
            count,
            stacks: stacks.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    // -- period_start ---

    #[test]
    fn weeks_start_on_monday_and_months_on_the_first() {
        // 2020-06-20 is a Saturday.
        assert_eq!(Granularity::Week.period_start(date(2020, 6, 20)), date(2020, 6, 15));
        assert_eq!(Granularity::Week.period_start(date(2020, 6, 15)), date(2020, 6, 15));
        assert_eq!(Granularity::Month.period_start(date(2020, 6, 20)), date(2020, 6, 1));
    }

    // -- calendar_periods (density) ---

    #[test]
    fn periods_cover_every_calendar_period_in_range() {
        // 2020-06-20 00:35:23 .. 2020-06-30 00:35:23 UTC
        let range = TimeRange::new(1592613323, 1593477323).unwrap();
        assert_eq!(calendar_periods(&range, Granularity::Day).len(), 11);
        assert_eq!(calendar_periods(&range, Granularity::Week).len(), 3);
        assert_eq!(calendar_periods(&range, Granularity::Month).len(), 1);
    }

    #[test]
    fn month_periods_span_year_boundary() {
        let range = TimeRange::new(ts(2019, 11, 30), ts(2020, 2, 1)).unwrap();
        let months = calendar_periods(&range, Granularity::Month);
        assert_eq!(months, vec![date(2019, 11, 1), date(2019, 12, 1), date(2020, 1, 1), date(2020, 2, 1)]);
    }

    // -- build_time_series ---

    #[test]
    fn series_are_dense_and_totals_agree() {
        let range = TimeRange::new(1592613323, 1593477323).unwrap();
        let rows = vec![
            row(date(2020, 6, 20), 2, &[]),
            row(date(2020, 6, 22), 1, &[]),
            row(date(2020, 6, 30), 3, &[]),
        ];
        let series = build_time_series(&range, rows, false);

        assert_eq!(series.day.len(), 11);
        assert_eq!(series.day.iter().filter(|b| b.count == 0).count(), 8);
        assert_eq!(series.total(), 6);
        assert_eq!(series.week.iter().map(|b| b.count).sum::<i64>(), 6);
        assert_eq!(series.month.iter().map(|b| b.count).sum::<i64>(), 6);

        assert_eq!(series.week[0].label, "2020-06-15");
        assert_eq!(series.week[0].count, 2);
        assert_eq!(series.week[1].count, 1);
        assert_eq!(series.week[2].count, 3);
        assert_eq!(series.month[0].label, "2020-06");
        assert_eq!(series.day[0].key, ts(2020, 6, 20));
        assert!(series.day.iter().all(|b| b.stacks.is_none()));
    }

    #[test]
    fn stacks_sum_to_bucket_counts() {
        let range = TimeRange::new(ts(2020, 6, 1), ts(2020, 6, 14)).unwrap();
        let rows = vec![
            row(date(2020, 6, 1), 3, &[("build", 2), ("deploy", 1)]),
            row(date(2020, 6, 2), 1, &[("deploy", 1)]),
            row(date(2020, 6, 9), 2, &[("build", 2)]),
        ];
        let series = build_time_series(&range, rows, true);

        for bucket in series.day.iter().chain(&series.week).chain(&series.month) {
            let stacks = bucket.stacks.as_ref().unwrap();
            assert_eq!(stacks.values().sum::<i64>(), bucket.count);
        }
        assert_eq!(series.week[0].stacks.as_ref().unwrap()["deploy"], 2);
    }

    #[test]
    fn rows_outside_range_are_ignored() {
        let range = TimeRange::new(ts(2020, 6, 10), ts(2020, 6, 12)).unwrap();
        let rows = vec![row(date(2020, 6, 8), 5, &[]), row(date(2020, 6, 11), 1, &[])];
        let series = build_time_series(&range, rows, false);
        assert_eq!(series.total(), 1);
        assert_eq!(series.week.iter().map(|b| b.count).sum::<i64>(), 1);
    }

    // -- StackKey ---

    #[test]
    fn job_name_stacks_only_apply_to_job_runs() {
        assert!(StackKey::JobName.validate_for(EventSource::JobRun).is_ok());
        assert!(StackKey::JobName.validate_for(EventSource::PullRequest).is_err());
        assert!(StackKey::Branch.validate_for(EventSource::Issue).is_err());
    }
}
