//! Grouped counts over any event table.

use sqlx::PgPool;
use velocity_core::bucketing::{Granularity, StackKey};
use velocity_core::filter::CompiledPredicate;

use super::QueryError;
use crate::models::bucket::BucketCountRow;
use crate::sql;

/// Count queries shared by every event source.
pub struct AggregateRepo;

impl AggregateRepo {
    /// Matching rows grouped by period start and, optionally, stack label.
    pub async fn count_by_period(
        pool: &PgPool,
        predicate: &CompiledPredicate,
        granularity: Granularity,
        stack_by: Option<StackKey>,
    ) -> Result<Vec<BucketCountRow>, QueryError> {
        let mut qb = sql::count_query(predicate, granularity, stack_by)?;
        tracing::debug!(sql = qb.sql(), "Counting events");
        let rows = qb.build_query_as::<BucketCountRow>().fetch_all(pool).await?;
        Ok(rows)
    }

    /// Number of rows matching a predicate.
    pub async fn count_matching(
        pool: &PgPool,
        predicate: &CompiledPredicate,
    ) -> Result<i64, QueryError> {
        let mut qb = sql::total_query(predicate)?;
        let total = qb.build_query_scalar::<i64>().fetch_one(pool).await?;
        Ok(total)
    }
}
