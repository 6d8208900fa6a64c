//! # Durable Key/Value Store
//!
//! The persistence seam every other component sits on: string keys mapped to
//! JSON record strings, with atomic per-record replacement.
//!
//! ## Backends
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      DurableStore Backends                              │
//! │                                                                         │
//! │  SqliteStore (default)              MemoryStore                         │
//! │  ──────────────────────             ─────────────────────────           │
//! │  • SQLite via sqlx, WAL mode        • RwLock<HashMap> snapshot          │
//! │  • survives process restarts        • tests and throwaway hosts         │
//! │  • busy timeout for concurrent      • same contract, no durability      │
//! │    readers                          │                                   │
//! │                                                                         │
//! │  Hosts may supply their own backend (e.g. platform keychain, RN-style  │
//! │  async storage bridge) by implementing the trait; the engine only       │
//! │  requires that `set` replaces a record atomically.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::migrations;

// =============================================================================
// The Store Seam
// =============================================================================

/// Host-provided durable key/value persistence.
///
/// ## Contract
/// - `set` replaces the whole record atomically; readers never observe a
///   half-written value
/// - `get` of an absent key is `Ok(None)`, never an error
/// - `remove` of an absent key is a no-op
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Reads the record stored under `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Atomically replaces the record stored under `key`.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes the record stored under `key` (no-op when absent).
    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Lists every key starting with `prefix` (used for namespace sweeps).
    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

// =============================================================================
// SQLite Backend
// =============================================================================

/// Configuration for the SQLite-backed store.
///
/// ## Example
/// ```rust,ignore
/// let store = SqliteStore::connect(SqliteStoreConfig::new("/data/darzi.db")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 4 (sufficient for a single local app process)
    pub max_connections: u32,

    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl SqliteStoreConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        SqliteStoreConfig {
            database_path: database_path.into(),
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Durable store backed by a local SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database and applies the schema.
    pub async fn connect(config: SqliteStoreConfig) -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(true)
            // WAL: readers don't block the writer, better crash recovery
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        migrations::run(&pool).await?;

        info!(path = %config.database_path.display(), "SQLite store ready");
        Ok(SqliteStore { pool })
    }

    /// Opens a private in-memory database (tests, ephemeral hosts).
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // A single connection: each in-memory connection is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        migrations::run(&pool).await?;
        Ok(SqliteStore { pool })
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM kv_records WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_records (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(key = %key, bytes = value.len(), "Record written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM kv_records WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        // Escape LIKE wildcards so literal '_' in namespace prefixes doesn't
        // match arbitrary characters
        let pattern = format!("{}%", escape_like(prefix));
        let keys: Vec<String> =
            sqlx::query_scalar("SELECT key FROM kv_records WHERE key LIKE ?1 ESCAPE '\\'")
                .bind(pattern)
                .fetch_all(&self.pool)
                .await?;
        Ok(keys)
    }
}

/// Escapes `%`, `_`, and `\` for use in a LIKE pattern with `ESCAPE '\'`.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

// =============================================================================
// In-Memory Backend
// =============================================================================

/// Non-durable store for tests and throwaway hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.records
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .records
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn roundtrip(store: &dyn DurableStore) {
        assert_eq!(store.get("missing").await.unwrap(), None);

        store.set("k1", "v1").await.unwrap();
        assert_eq!(store.get("k1").await.unwrap().as_deref(), Some("v1"));

        store.set("k1", "v2").await.unwrap();
        assert_eq!(store.get("k1").await.unwrap().as_deref(), Some("v2"));

        store.remove("k1").await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), None);

        // Removing an absent key is a no-op
        store.remove("k1").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_roundtrip() {
        roundtrip(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_roundtrip() {
        let store = SqliteStore::in_memory().await.unwrap();
        roundtrip(&store).await;
    }

    #[tokio::test]
    async fn test_sqlite_prefix_listing_escapes_wildcards() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.set("offline_cache_bills", "a").await.unwrap();
        store.set("offline_cache_customers", "b").await.unwrap();
        store.set("offline_action_queue", "c").await.unwrap();
        // Would match "offline_cache_" if '_' were treated as a wildcard
        store.set("offlineXcacheXrogue", "d").await.unwrap();

        let mut keys = store.keys_with_prefix("offline_cache_").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["offline_cache_bills", "offline_cache_customers"]);
    }

    #[tokio::test]
    async fn test_memory_prefix_listing() {
        let store = MemoryStore::new();
        store.set("ns_a", "1").await.unwrap();
        store.set("ns_b", "2").await.unwrap();
        store.set("other", "3").await.unwrap();

        let mut keys = store.keys_with_prefix("ns_").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["ns_a", "ns_b"]);
    }
}
