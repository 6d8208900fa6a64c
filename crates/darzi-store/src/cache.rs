//! # TTL Cache of Domain Snapshots
//!
//! Generic per-key cache with lazy expiry, plus thin per-entity wrappers with
//! fixed TTLs.
//!
//! ## Read/Write Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Cache Store Behavior                                │
//! │                                                                         │
//! │  set(key, data, ttl, status)                                           │
//! │    → offline_cache_<key> = { data, cachedAt, expiresAt?, syncStatus }  │
//! │                                                                         │
//! │  get(key)                                                              │
//! │    ├── absent record            → None                                 │
//! │    ├── undecodable record       → purge, None                          │
//! │    ├── now > expiresAt          → purge, None  (lazy eviction)         │
//! │    └── otherwise                → Some(entry)                          │
//! │                                                                         │
//! │  clear_all()                                                           │
//! │    → removes offline_cache_* ONLY. The action queue and the aggregate  │
//! │      snapshot live in other namespaces and are never touched.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use darzi_core::validation::validate_cache_key;
use darzi_core::{Bill, CacheEntry, CacheSyncStatus, Customer, MeasurementConfig};

use crate::error::{StoreError, StoreResult};
use crate::kv::DurableStore;

/// Namespace prefix for cache records.
pub const CACHE_PREFIX: &str = "offline_cache_";

// =============================================================================
// Entity TTLs
// =============================================================================

/// Bills change often (status flips, payments land): short TTL.
pub const BILLS_TTL: Duration = Duration::from_secs(5 * 60);

/// Customers are near-static during a work session.
pub const CUSTOMERS_TTL: Duration = Duration::from_secs(10 * 60);

/// Measurement configurations change rarely.
pub const MEASUREMENT_CONFIGS_TTL: Duration = Duration::from_secs(10 * 60);

// =============================================================================
// Cache Store
// =============================================================================

/// Generic TTL cache over the durable store.
#[derive(Clone)]
pub struct CacheStore {
    store: Arc<dyn DurableStore>,
}

impl CacheStore {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        CacheStore { store }
    }

    /// Writes a cache entry, stamping timestamps and the given sync status.
    ///
    /// `ttl = None` means the entry never expires. The sync status is decided
    /// by the caller (the engine stamps `Synced` online, `Pending` offline)
    /// so this layer stays network-agnostic.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        data: &T,
        ttl: Option<Duration>,
        status: CacheSyncStatus,
    ) -> StoreResult<()> {
        validate_cache_key(key)?;
        let storage_key = self.storage_key(key);
        let now = Utc::now();

        let entry = CacheEntry {
            data: serde_json::to_value(data)
                .map_err(|e| StoreError::serialization(&storage_key, e))?,
            cached_at: now,
            expires_at: ttl
                .and_then(|d| chrono::Duration::from_std(d).ok())
                .map(|d| now + d),
            last_sync_attempt: None,
            sync_status: status,
        };

        let raw = serde_json::to_string(&entry)
            .map_err(|e| StoreError::serialization(&storage_key, e))?;
        self.store.set(&storage_key, &raw).await?;

        debug!(key = %key, status = ?status, "Cache entry written");
        Ok(())
    }

    /// Reads a cache entry, lazily purging expired or undecodable records.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<CacheEntry<T>>> {
        validate_cache_key(key)?;
        let storage_key = self.storage_key(key);

        let raw = match self.store.get(&storage_key).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let entry: CacheEntry<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, ?e, "Cache record corrupted, purging");
                self.store.remove(&storage_key).await?;
                return Ok(None);
            }
        };

        if entry.is_expired(Utc::now()) {
            debug!(key = %key, "Cache entry expired, purging");
            self.store.remove(&storage_key).await?;
            return Ok(None);
        }

        // The payload may predate a schema change; treat a shape mismatch
        // like corruption rather than failing the read path
        match serde_json::from_value(entry.data) {
            Ok(data) => Ok(Some(CacheEntry {
                data,
                cached_at: entry.cached_at,
                expires_at: entry.expires_at,
                last_sync_attempt: entry.last_sync_attempt,
                sync_status: entry.sync_status,
            })),
            Err(e) => {
                warn!(key = %key, ?e, "Cache payload shape mismatch, purging");
                self.store.remove(&storage_key).await?;
                Ok(None)
            }
        }
    }

    /// Removes one cache entry.
    pub async fn remove(&self, key: &str) -> StoreResult<()> {
        validate_cache_key(key)?;
        self.store.remove(&self.storage_key(key)).await
    }

    /// Removes every record in the cache namespace.
    ///
    /// The action queue and the aggregate snapshot are separate namespaces
    /// and are left untouched.
    pub async fn clear_all(&self) -> StoreResult<()> {
        let keys = self.store.keys_with_prefix(CACHE_PREFIX).await?;
        let count = keys.len();
        for key in keys {
            self.store.remove(&key).await?;
        }
        debug!(count, "Cache namespace cleared");
        Ok(())
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{CACHE_PREFIX}{key}")
    }

    // -------------------------------------------------------------------------
    // Per-entity wrappers (thin projections with fixed TTLs)
    // -------------------------------------------------------------------------

    pub async fn cache_bills(&self, bills: &[Bill], status: CacheSyncStatus) -> StoreResult<()> {
        self.set("bills", &bills, Some(BILLS_TTL), status).await
    }

    pub async fn cached_bills(&self) -> StoreResult<Option<Vec<Bill>>> {
        Ok(self.get::<Vec<Bill>>("bills").await?.map(|e| e.data))
    }

    pub async fn cache_bill(&self, bill: &Bill, status: CacheSyncStatus) -> StoreResult<()> {
        self.set(&format!("bill_{}", bill.id), bill, Some(BILLS_TTL), status)
            .await
    }

    pub async fn cached_bill(&self, id: &str) -> StoreResult<Option<Bill>> {
        Ok(self
            .get::<Bill>(&format!("bill_{id}"))
            .await?
            .map(|e| e.data))
    }

    pub async fn cache_customers(
        &self,
        customers: &[Customer],
        status: CacheSyncStatus,
    ) -> StoreResult<()> {
        self.set("customers", &customers, Some(CUSTOMERS_TTL), status)
            .await
    }

    pub async fn cached_customers(&self) -> StoreResult<Option<Vec<Customer>>> {
        Ok(self.get::<Vec<Customer>>("customers").await?.map(|e| e.data))
    }

    pub async fn cache_customer(
        &self,
        customer: &Customer,
        status: CacheSyncStatus,
    ) -> StoreResult<()> {
        self.set(
            &format!("customer_{}", customer.id),
            customer,
            Some(CUSTOMERS_TTL),
            status,
        )
        .await
    }

    pub async fn cached_customer(&self, id: &str) -> StoreResult<Option<Customer>> {
        Ok(self
            .get::<Customer>(&format!("customer_{id}"))
            .await?
            .map(|e| e.data))
    }

    pub async fn cache_measurement_configs(
        &self,
        configs: &[MeasurementConfig],
        status: CacheSyncStatus,
    ) -> StoreResult<()> {
        self.set(
            "measurement_configs",
            &configs,
            Some(MEASUREMENT_CONFIGS_TTL),
            status,
        )
        .await
    }

    pub async fn cached_measurement_configs(&self) -> StoreResult<Option<Vec<MeasurementConfig>>> {
        Ok(self
            .get::<Vec<MeasurementConfig>>("measurement_configs")
            .await?
            .map(|e| e.data))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use crate::queue::QUEUE_KEY;
    use serde_json::json;

    fn cache() -> (Arc<MemoryStore>, CacheStore) {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheStore::new(store.clone() as Arc<dyn DurableStore>);
        (store, cache)
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (_, cache) = cache();
        cache
            .set("greeting", &json!({"hello": "world"}), None, CacheSyncStatus::Synced)
            .await
            .unwrap();

        let entry = cache
            .get::<serde_json::Value>("greeting")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.data["hello"], "world");
        assert_eq!(entry.sync_status, CacheSyncStatus::Synced);
        assert!(entry.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent_and_purged() {
        let (store, cache) = cache();
        cache
            .set(
                "short_lived",
                &json!(1),
                Some(Duration::from_millis(100)),
                CacheSyncStatus::Synced,
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(cache.get::<serde_json::Value>("short_lived").await.unwrap().is_none());
        // The record itself is gone from storage, not just hidden
        assert_eq!(
            store.get("offline_cache_short_lived").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_unexpired_entry_survives() {
        let (_, cache) = cache();
        cache
            .set(
                "fresh",
                &json!(2),
                Some(Duration::from_secs(300)),
                CacheSyncStatus::Pending,
            )
            .await
            .unwrap();

        let entry = cache.get::<serde_json::Value>("fresh").await.unwrap().unwrap();
        assert_eq!(entry.sync_status, CacheSyncStatus::Pending);
    }

    #[tokio::test]
    async fn test_corrupted_record_purged_on_read() {
        let (store, cache) = cache();
        store.set("offline_cache_bad", "not json").await.unwrap();

        assert!(cache.get::<serde_json::Value>("bad").await.unwrap().is_none());
        assert_eq!(store.get("offline_cache_bad").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_all_spares_other_namespaces() {
        let (store, cache) = cache();
        cache
            .set("bills", &json!([]), None, CacheSyncStatus::Synced)
            .await
            .unwrap();
        store.set(QUEUE_KEY, "[]").await.unwrap();
        store.set("offline_aggregate_data", "{}").await.unwrap();

        cache.clear_all().await.unwrap();

        assert!(cache.get::<serde_json::Value>("bills").await.unwrap().is_none());
        assert_eq!(store.get(QUEUE_KEY).await.unwrap().as_deref(), Some("[]"));
        assert_eq!(
            store.get("offline_aggregate_data").await.unwrap().as_deref(),
            Some("{}")
        );
    }

    #[tokio::test]
    async fn test_rejects_invalid_keys() {
        let (_, cache) = cache();
        let err = cache
            .set("has space", &json!(1), None, CacheSyncStatus::Synced)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
