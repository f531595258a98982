//! Grouped count rows.

use chrono::NaiveDate;
use sqlx::FromRow;
use velocity_core::bucketing::BucketRow;

/// One `(period, stack)` group from a count query.
#[derive(Debug, Clone, FromRow)]
pub struct BucketCountRow {
    pub day: NaiveDate,
    pub stack: Option<String>,
    pub count: i64,
}

impl From<BucketCountRow> for BucketRow {
    fn from(row: BucketCountRow) -> Self {
        BucketRow {
            start: row.day,
            count: row.count,
            stacks: row.stack.into_iter().map(|s| (s, row.count)).collect(),
        }
    }
}
