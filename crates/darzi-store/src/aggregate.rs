//! # Aggregate Offline Snapshot Store
//!
//! Persists the whole-collection [`OfflineData`] record that powers full
//! offline browsing. Partial saves merge field-by-field (present arrays
//! replace wholesale) and always bump the sync timestamp; the merge itself
//! is the pure [`OfflineData::apply_patch`] in darzi-core.
//!
//! Deliberately separate from the per-key TTL cache; application code
//! relies on both representations, in distinct namespaces.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use darzi_core::{OfflineData, OfflineDataPatch};

use crate::error::{StoreError, StoreResult};
use crate::kv::DurableStore;

/// Storage key holding the aggregate record.
pub const AGGREGATE_KEY: &str = "offline_aggregate_data";

/// Repository for the aggregate offline snapshot.
#[derive(Clone)]
pub struct OfflineDataStore {
    store: Arc<dyn DurableStore>,
}

impl OfflineDataStore {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        OfflineDataStore { store }
    }

    /// Strict load: storage errors propagate, absence is `None`.
    pub async fn load(&self) -> StoreResult<Option<OfflineData>> {
        let raw = match self.store.get(AGGREGATE_KEY).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::serialization(AGGREGATE_KEY, e))
    }

    /// Lenient load for the offline read path: anything unreadable becomes an
    /// empty snapshot.
    pub async fn load_or_default(&self) -> OfflineData {
        match self.load().await {
            Ok(Some(data)) => data,
            Ok(None) => OfflineData::default(),
            Err(e) => {
                warn!(?e, "Aggregate record unreadable, using empty snapshot");
                OfflineData::default()
            }
        }
    }

    /// Applies a partial update and persists the merged snapshot.
    ///
    /// Present arrays wholesale-replace the stored ones; the sync timestamp
    /// is bumped to now on every save.
    pub async fn save(&self, patch: OfflineDataPatch) -> StoreResult<OfflineData> {
        let mut data = self.load_or_default().await;
        data.apply_patch(patch, Utc::now());
        self.persist(&data).await?;
        debug!(
            bills = data.bills.len(),
            customers = data.customers.len(),
            "Aggregate snapshot saved"
        );
        Ok(data)
    }

    /// Replaces the whole snapshot (used after a full server fetch).
    pub async fn replace(&self, data: &OfflineData) -> StoreResult<()> {
        self.persist(data).await
    }

    async fn persist(&self, data: &OfflineData) -> StoreResult<()> {
        let raw = serde_json::to_string(data)
            .map_err(|e| StoreError::serialization(AGGREGATE_KEY, e))?;
        self.store.set(AGGREGATE_KEY, &raw).await
    }
}
