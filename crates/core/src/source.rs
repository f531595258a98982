//! Narrow seams to the outside world: event sources and the profile store.
//!
//! The engine only depends on these traits. The database crate implements
//! them over Postgres; [`crate::memory`] implements them in memory.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bucketing::{BucketRow, Granularity, StackKey};
use crate::drilldown::{DrillDownPage, DrillDownRequest};
use crate::error::CoreError;
use crate::filter::CompiledPredicate;
use crate::profile::{EventSource, VelocityProfile};
use crate::types::DbId;

/// Executes compiled predicates against one event source.
///
/// Implementations must apply the predicate identically in `count` and
/// `list` so aggregate totals reconcile with drill-down totals.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source this adapter serves.
    fn source(&self) -> EventSource;

    /// Count matching events grouped by period (and stack label, if given).
    async fn count(
        &self,
        predicate: &CompiledPredicate,
        granularity: Granularity,
        stack_by: Option<StackKey>,
    ) -> Result<Vec<BucketRow>, CoreError>;

    /// One sorted page of matching events plus the full match count.
    async fn list(
        &self,
        predicate: &CompiledPredicate,
        request: &DrillDownRequest,
    ) -> Result<DrillDownPage, CoreError>;
}

/// Read access to tenant workflow profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, id: DbId) -> Result<Option<VelocityProfile>, CoreError>;

    async fn get_profile_for_ou(
        &self,
        ou_ref_id: DbId,
    ) -> Result<Option<VelocityProfile>, CoreError>;
}

/// One adapter per event source.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    adapters: HashMap<EventSource, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under the source it reports.
    pub fn with(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.insert(adapter.source(), adapter);
        self
    }

    pub fn get(&self, source: EventSource) -> Result<&Arc<dyn SourceAdapter>, CoreError> {
        self.adapters.get(&source).ok_or_else(|| {
            CoreError::Internal(format!("no adapter registered for {}", source.as_str()))
        })
    }
}
