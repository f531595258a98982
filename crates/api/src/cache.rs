//! Read-through profile cache with a per-entry time to live.
//!
//! Profiles change rarely but are needed on every DORA request, so lookups
//! by profile id and by organisational unit are served from memory until the
//! entry expires. Misses are not cached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use velocity_core::error::CoreError;
use velocity_core::profile::VelocityProfile;
use velocity_core::source::ProfileStore;
use velocity_core::types::DbId;

#[derive(Clone)]
struct CacheEntry {
    profile: Arc<VelocityProfile>,
    loaded_at: Instant,
}

pub struct ProfileCache {
    store: Arc<dyn ProfileStore>,
    ttl: Duration,
    by_id: RwLock<HashMap<DbId, CacheEntry>>,
    by_ou: RwLock<HashMap<DbId, CacheEntry>>,
}

impl ProfileCache {
    pub fn new(store: Arc<dyn ProfileStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            by_id: RwLock::new(HashMap::new()),
            by_ou: RwLock::new(HashMap::new()),
        }
    }

    /// Profile by id, or `NotFound`.
    pub async fn by_id(&self, id: DbId) -> Result<Arc<VelocityProfile>, CoreError> {
        if let Some(profile) = self.fresh(&self.by_id, id).await {
            return Ok(profile);
        }
        let profile = self
            .store
            .get_profile(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "VelocityProfile",
                id,
            })?;
        Ok(self.remember(&self.by_id, id, profile).await)
    }

    /// Profile mapped to an organisational unit, or `NotFound`.
    pub async fn for_ou(&self, ou_ref_id: DbId) -> Result<Arc<VelocityProfile>, CoreError> {
        if let Some(profile) = self.fresh(&self.by_ou, ou_ref_id).await {
            return Ok(profile);
        }
        let profile = self
            .store
            .get_profile_for_ou(ou_ref_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "OrgUnitProfile",
                id: ou_ref_id,
            })?;
        Ok(self.remember(&self.by_ou, ou_ref_id, profile).await)
    }

    /// Number of cached entries across both lookups, fresh or expired.
    pub async fn entry_count(&self) -> usize {
        self.by_id.read().await.len() + self.by_ou.read().await.len()
    }

    /// Drop every cached entry.
    pub async fn clear(&self) {
        self.by_id.write().await.clear();
        self.by_ou.write().await.clear();
    }

    async fn fresh(
        &self,
        map: &RwLock<HashMap<DbId, CacheEntry>>,
        key: DbId,
    ) -> Option<Arc<VelocityProfile>> {
        let entries = map.read().await;
        let entry = entries.get(&key)?;
        if entry.loaded_at.elapsed() < self.ttl {
            tracing::debug!(key, "Profile cache hit");
            Some(Arc::clone(&entry.profile))
        } else {
            None
        }
    }

    async fn remember(
        &self,
        map: &RwLock<HashMap<DbId, CacheEntry>>,
        key: DbId,
        profile: VelocityProfile,
    ) -> Arc<VelocityProfile> {
        let profile = Arc::new(profile);
        map.write().await.insert(
            key,
            CacheEntry {
                profile: Arc::clone(&profile),
                loaded_at: Instant::now(),
            },
        );
        profile
    }
}
