//! In-memory event source and profile store.
//!
//! Used by tests and local runs. Evaluation goes through
//! [`CompiledPredicate::matches`], so counts and listings share one code path.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::bucketing::{fold_rows, BucketRow, Granularity, StackKey};
use crate::drilldown::{paginate, resolve_sort, DrillDownPage, DrillDownRequest};
use crate::error::CoreError;
use crate::event::EventRecord;
use crate::filter::CompiledPredicate;
use crate::profile::{EventSource, VelocityProfile};
use crate::source::{ProfileStore, SourceAdapter};
use crate::types::DbId;

/// Event source holding records in a shared vector.
#[derive(Clone)]
pub struct InMemorySource {
    source: EventSource,
    events: Arc<RwLock<Vec<EventRecord>>>,
}

impl InMemorySource {
    pub fn new(source: EventSource) -> Self {
        Self {
            source,
            events: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Add records; records of other sources are rejected.
    pub async fn insert(&self, records: impl IntoIterator<Item = EventRecord>) -> Result<(), CoreError> {
        let mut events = self.events.write().await;
        for record in records {
            if record.source() != self.source {
                return Err(CoreError::Validation(format!(
                    "cannot store a {} record in the {} source",
                    record.source().as_str(),
                    self.source.as_str()
                )));
            }
            events.push(record);
        }
        Ok(())
    }

    async fn matching(&self, predicate: &CompiledPredicate) -> Vec<EventRecord> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| predicate.matches(e))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SourceAdapter for InMemorySource {
    fn source(&self) -> EventSource {
        self.source
    }

    async fn count(
        &self,
        predicate: &CompiledPredicate,
        granularity: Granularity,
        stack_by: Option<StackKey>,
    ) -> Result<Vec<BucketRow>, CoreError> {
        let rows = self.matching(predicate).await.into_iter().filter_map(|event| {
            let day = event.timestamp(predicate.timestamp_field)?.date_naive();
            let mut stacks = BTreeMap::new();
            if let Some(key) = stack_by {
                stacks.insert(event.stack_label(key), 1);
            }
            Some(BucketRow {
                start: granularity.period_start(day),
                count: 1,
                stacks,
            })
        });
        Ok(fold_rows(rows).into_values().collect())
    }

    async fn list(
        &self,
        predicate: &CompiledPredicate,
        request: &DrillDownRequest,
    ) -> Result<DrillDownPage, CoreError> {
        let sort = resolve_sort(
            predicate.source,
            predicate.timestamp_field,
            request.sort.as_ref(),
        );
        Ok(paginate(self.matching(predicate).await, sort, request))
    }
}

/// Profile store keyed by profile id.
#[derive(Clone, Default)]
pub struct InMemoryProfileStore {
    profiles: Arc<RwLock<HashMap<DbId, VelocityProfile>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: VelocityProfile) {
        self.profiles.write().await.insert(profile.id, profile);
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, id: DbId) -> Result<Option<VelocityProfile>, CoreError> {
        Ok(self.profiles.read().await.get(&id).cloned())
    }

    async fn get_profile_for_ou(
        &self,
        ou_ref_id: DbId,
    ) -> Result<Option<VelocityProfile>, CoreError> {
        let profiles = self.profiles.read().await;
        let mut candidates: Vec<&VelocityProfile> = profiles
            .values()
            .filter(|p| p.ou_ref_ids.contains(&ou_ref_id))
            .collect();
        candidates.sort_by_key(|p| p.id);
        Ok(candidates.first().map(|p| (*p).clone()))
    }
}
