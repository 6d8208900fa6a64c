//! Persisted sync status record, read by the host UI for its pending badge.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use darzi_core::SyncStatusRecord;

use crate::error::{StoreError, StoreResult};
use crate::kv::DurableStore;

/// Storage key holding the status record.
pub const SYNC_STATUS_KEY: &str = "offline_sync_status";

/// Repository for the sync status record.
#[derive(Clone)]
pub struct SyncStatusStore {
    store: Arc<dyn DurableStore>,
}

impl SyncStatusStore {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        SyncStatusStore { store }
    }

    /// Loads the record; absent or unreadable yields the default.
    pub async fn load(&self) -> SyncStatusRecord {
        match self.store.get(SYNC_STATUS_KEY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(?e, "Status record corrupted, resetting");
                SyncStatusRecord::default()
            }),
            Ok(None) => SyncStatusRecord::default(),
            Err(e) => {
                warn!(?e, "Status record unreadable");
                SyncStatusRecord::default()
            }
        }
    }

    /// Records the outcome of a drain attempt.
    ///
    /// `last_successful_sync` only advances when the drain delivered at least
    /// one action.
    pub async fn record_attempt(
        &self,
        synced_any: bool,
        pending: u32,
    ) -> StoreResult<SyncStatusRecord> {
        let mut record = self.load().await;
        let now = Utc::now();

        record.last_sync_attempt = Some(now);
        if synced_any {
            record.last_successful_sync = Some(now);
        }
        record.pending_actions = pending;

        self.persist(&record).await?;
        Ok(record)
    }

    /// Refreshes only the pending counter (called after enqueue).
    pub async fn record_pending(&self, pending: u32) -> StoreResult<()> {
        let mut record = self.load().await;
        record.pending_actions = pending;
        self.persist(&record).await
    }

    async fn persist(&self, record: &SyncStatusRecord) -> StoreResult<()> {
        let raw = serde_json::to_string(record)
            .map_err(|e| StoreError::serialization(SYNC_STATUS_KEY, e))?;
        self.store.set(SYNC_STATUS_KEY, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    #[tokio::test]
    async fn test_attempt_bookkeeping() {
        let store = Arc::new(MemoryStore::new());
        let repo = SyncStatusStore::new(store as Arc<dyn DurableStore>);

        // A drain that delivered nothing advances the attempt but not the success
        let record = repo.record_attempt(false, 3).await.unwrap();
        assert!(record.last_sync_attempt.is_some());
        assert!(record.last_successful_sync.is_none());
        assert_eq!(record.pending_actions, 3);

        let record = repo.record_attempt(true, 0).await.unwrap();
        assert!(record.last_successful_sync.is_some());
        assert_eq!(record.pending_actions, 0);
    }

    #[tokio::test]
    async fn test_record_pending_preserves_timestamps() {
        let store = Arc::new(MemoryStore::new());
        let repo = SyncStatusStore::new(store as Arc<dyn DurableStore>);

        repo.record_attempt(true, 0).await.unwrap();
        repo.record_pending(5).await.unwrap();

        let record = repo.load().await;
        assert_eq!(record.pending_actions, 5);
        assert!(record.last_successful_sync.is_some());
    }
}
