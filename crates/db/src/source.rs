//! Postgres implementations of the engine's source and profile seams.

use std::sync::Arc;

use async_trait::async_trait;
use velocity_core::bucketing::{fold_rows, BucketRow, Granularity, StackKey};
use velocity_core::drilldown::{resolve_sort, DrillDownPage, DrillDownRequest};
use velocity_core::error::CoreError;
use velocity_core::event::EventRecord;
use velocity_core::filter::CompiledPredicate;
use velocity_core::profile::{EventSource, VelocityProfile};
use velocity_core::source::{ProfileStore, SourceAdapter, SourceRegistry};
use velocity_core::types::DbId;

use crate::repositories::{
    AggregateRepo, CommitRepo, IssueRepo, JobRunRepo, PullRequestRepo, QueryError,
    VelocityProfileRepo,
};
use crate::DbPool;

/// Event source backed by one event table.
#[derive(Clone)]
pub struct PgSource {
    pool: DbPool,
    source: EventSource,
}

impl PgSource {
    pub fn new(pool: DbPool, source: EventSource) -> Self {
        Self { pool, source }
    }
}

/// A registry with a Postgres adapter for every event source.
pub fn pg_sources(pool: &DbPool) -> SourceRegistry {
    [
        EventSource::PullRequest,
        EventSource::Commit,
        EventSource::Issue,
        EventSource::JobRun,
    ]
    .into_iter()
    .fold(SourceRegistry::new(), |registry, source| {
        registry.with(Arc::new(PgSource::new(pool.clone(), source)))
    })
}

fn source_error(err: QueryError) -> CoreError {
    match err {
        QueryError::Render(err) => err,
        QueryError::Database(err) => {
            tracing::error!(error = %err, "Event source query failed");
            CoreError::Source(err.to_string())
        }
    }
}

#[async_trait]
impl SourceAdapter for PgSource {
    fn source(&self) -> EventSource {
        self.source
    }

    async fn count(
        &self,
        predicate: &CompiledPredicate,
        granularity: Granularity,
        stack_by: Option<StackKey>,
    ) -> Result<Vec<BucketRow>, CoreError> {
        if predicate.is_unsatisfiable() {
            return Ok(Vec::new());
        }
        let rows = AggregateRepo::count_by_period(&self.pool, predicate, granularity, stack_by)
            .await
            .map_err(source_error)?;
        Ok(fold_rows(rows.into_iter().map(BucketRow::from))
            .into_values()
            .collect())
    }

    async fn list(
        &self,
        predicate: &CompiledPredicate,
        request: &DrillDownRequest,
    ) -> Result<DrillDownPage, CoreError> {
        let page = request.page();
        let page_size = request.page_size();
        if predicate.is_unsatisfiable() {
            return Ok(DrillDownPage {
                records: Vec::new(),
                total_count: 0,
                page,
                page_size,
            });
        }

        let sort = resolve_sort(
            predicate.source,
            predicate.timestamp_field,
            request.sort.as_ref(),
        );
        let offset = request.offset();
        let pool = &self.pool;

        let total_count = AggregateRepo::count_matching(pool, predicate)
            .await
            .map_err(source_error)?;
        let records: Vec<EventRecord> = match self.source {
            EventSource::PullRequest => {
                PullRequestRepo::list_page(pool, predicate, sort, page_size, offset)
                    .await
                    .map(|rows| rows.into_iter().map(EventRecord::PullRequest).collect())
            }
            EventSource::Commit => CommitRepo::list_page(pool, predicate, sort, page_size, offset)
                .await
                .map(|rows| rows.into_iter().map(EventRecord::Commit).collect()),
            EventSource::Issue => IssueRepo::list_page(pool, predicate, sort, page_size, offset)
                .await
                .map(|rows| rows.into_iter().map(EventRecord::Issue).collect()),
            EventSource::JobRun => JobRunRepo::list_page(pool, predicate, sort, page_size, offset)
                .await
                .map(|rows| rows.into_iter().map(EventRecord::JobRun).collect()),
        }
        .map_err(source_error)?;

        Ok(DrillDownPage {
            records,
            total_count,
            page,
            page_size,
        })
    }
}

/// Profile store over the `velocity_profiles` table.
#[derive(Clone)]
pub struct PgProfileStore {
    pool: DbPool,
}

impl PgProfileStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn get_profile(&self, id: DbId) -> Result<Option<VelocityProfile>, CoreError> {
        VelocityProfileRepo::find_by_id(&self.pool, id)
            .await
            .map(|row| row.map(VelocityProfile::from))
            .map_err(|err| source_error(err.into()))
    }

    async fn get_profile_for_ou(
        &self,
        ou_ref_id: DbId,
    ) -> Result<Option<VelocityProfile>, CoreError> {
        VelocityProfileRepo::find_by_ou_ref_id(&self.pool, ou_ref_id)
            .await
            .map(|row| row.map(VelocityProfile::from))
            .map_err(|err| source_error(err.into()))
    }
}
