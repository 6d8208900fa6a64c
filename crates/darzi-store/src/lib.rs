//! # darzi-store: Durable Store Layer for Darzi POS
//!
//! Persistence for the offline engine: a key/value store abstraction plus the
//! typed repositories built on top of it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Darzi POS Data Flow                               │
//! │                                                                         │
//! │  OfflineEngine (darzi-sync)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    darzi-store (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  DurableStore │    │ Repositories  │    │  Migrations  │  │   │
//! │  │   │   (kv.rs)     │    │ (queue.rs,    │    │  (embedded)  │  │   │
//! │  │   │               │    │  cache.rs,    │    │              │  │   │
//! │  │   │ SqliteStore   │◄───│  aggregate.rs,│    │ kv_records   │  │   │
//! │  │   │ MemoryStore   │    │  status.rs)   │    │ table DDL    │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL) or in-memory map                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`kv`] - The [`DurableStore`] seam and its SQLite/in-memory backends
//! - [`migrations`] - Embedded schema for the SQLite backend
//! - [`error`] - Store error types
//! - [`queue`] - The durable offline action queue
//! - [`cache`] - TTL cache of domain snapshots
//! - [`aggregate`] - Whole-collection offline snapshot
//! - [`status`] - Persisted sync status record
//!
//! ## The Atomicity Rule
//!
//! Every logical write is a full read-modify-write of one record (the whole
//! queue array, the whole cache entry, the whole aggregate). A reader never
//! observes a half-written record as long as the backend's `set` is atomic at
//! record granularity, the property any custom [`DurableStore`]
//! implementation must preserve.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregate;
pub mod cache;
pub mod error;
pub mod kv;
pub mod migrations;
pub mod queue;
pub mod status;

// =============================================================================
// Re-exports
// =============================================================================

pub use aggregate::OfflineDataStore;
pub use cache::CacheStore;
pub use error::{StoreError, StoreResult};
pub use kv::{DurableStore, MemoryStore, SqliteStore, SqliteStoreConfig};
pub use queue::ActionQueue;
pub use status::SyncStatusStore;
