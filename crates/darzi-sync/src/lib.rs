//! # darzi-sync: Offline Sync Engine for Darzi POS
//!
//! This crate lets the shop keep recording business actions (bills,
//! customers, measurement configurations, payments) while disconnected, and
//! reconciles the backlog with the backend once connectivity returns.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Offline Engine Architecture                        │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 OfflineEngine (engine.rs)                        │  │
//! │  │                                                                  │  │
//! │  │  One explicit instance per process, injected into consumers.     │  │
//! │  │  Public surface: enqueue, list_pending, drain_now, is_online,    │  │
//! │  │  subscribe_network, subscribe_sync, get/set_cached,              │  │
//! │  │  save/load_offline_data, resolve_conflict, execute_or_enqueue    │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ NetworkMonitor │  │SyncOrchestrator│  │   ConflictResolver     │    │
//! │  │                │  │                │  │                        │    │
//! │  │ State + pub/sub│  │ Single-flight  │  │ local/server/merge     │    │
//! │  │ reconnect push │─►│ FIFO drain,    │─►│ LWW-except-updatedAt   │    │
//! │  │ probe loop     │  │ retry ceiling  │  │                        │    │
//! │  └────────────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │                              │                                          │
//! │              ┌───────────────┴───────────────┐                         │
//! │              ▼                               ▼                          │
//! │  ┌────────────────────┐          ┌─────────────────────┐               │
//! │  │ darzi-store        │          │ RemoteApi (trait)   │               │
//! │  │ queue/cache/       │          │ host-provided       │               │
//! │  │ aggregate/status   │          │ backend client      │               │
//! │  └────────────────────┘          └─────────────────────┘               │
//! │                                                                         │
//! │  DATA FLOW                                                             │
//! │  app layer → queue (offline) or direct call (online, fallback queue)   │
//! │  → drain (reconnect push or manual) → remote API → conflict resolver   │
//! │  → cache/aggregate updated → listeners notified                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - The `OfflineEngine` facade and builder
//! - [`config`] - Engine configuration (TOML + env overrides)
//! - [`error`] - Engine error types
//! - [`network`] - Network monitor, connectivity probe, reconnect push
//! - [`orchestrator`] - The queue drain (single-flight, FIFO, bounded retry)
//! - [`remote`] - The opaque remote API seam and failure taxonomy
//! - [`resolver`] - Conflict resolution policies
//! - [`retry`] - Caller-level exponential backoff for direct calls
//!
//! ## Usage
//!
//! ```rust,ignore
//! use darzi_sync::{EngineConfig, OfflineEngineBuilder};
//! use darzi_store::SqliteStore;
//!
//! let store = Arc::new(SqliteStore::connect(store_config).await?);
//! let engine = OfflineEngineBuilder::new(EngineConfig::load_or_default(None))
//!     .with_store(store)
//!     .with_remote(api_client)
//!     .with_probe(platform_probe)
//!     .build()?;
//! engine.start().await?;
//!
//! // Record a bill; delivered now if online, queued otherwise
//! let outcome = engine.execute_or_enqueue(draft).await?;
//! ```
//!
//! ## Delivery Guarantees
//!
//! At-least-once, in enqueue order, with a bounded retry ceiling per action.
//! Exactly-once is explicitly not promised; the remote API is expected to
//! tolerate redelivery (client-generated ids make this cheap).

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod network;
pub mod orchestrator;
pub mod remote;
pub mod resolver;
pub mod retry;

// =============================================================================
// Re-exports
// =============================================================================

// Core engine types
pub use config::{DeviceConfig, EngineConfig, RemoteSettings, SyncSettings};
pub use engine::{DirectOutcome, OfflineEngine, OfflineEngineBuilder};
pub use error::{SyncError, SyncResult};
pub use network::{
    spawn_probe_loop, ConnectivityProbe, NetworkMonitor, NetworkState, NetworkTransport,
    ProbeError, ProbeFailurePolicy, ProbeLoopHandle, SubscriptionId,
};
pub use orchestrator::SyncOrchestrator;
pub use remote::{RemoteApi, RemoteError};
pub use resolver::ConflictResolver;
pub use retry::with_backoff;

// Re-export the data model so consumers need only this crate
pub use darzi_core::{
    ActionDraft, ActionKind, CacheEntry, CacheSyncStatus, ConflictResolution, EntityKind,
    OfflineAction, OfflineData, OfflineDataPatch, ResolutionChoice, SyncReport, SyncStatusRecord,
};
