//! # darzi-core: Pure Data Model for the Darzi POS Offline Engine
//!
//! This crate is the foundation of the offline-first sync engine. It holds
//! every data type the engine persists or exchanges, as plain structs with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Darzi POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  Application layer (host app)                   │   │
//! │  │     Billing screens ──► Customer screens ──► Config screens    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ OfflineEngine API                      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    darzi-sync (engine)                          │   │
//! │  │     Network monitor, orchestrator, conflict resolver            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ darzi-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  action   │  │   cache   │  │  report   │  │   │
//! │  │   │   Bill    │  │ Offline-  │  │ CacheEntry│  │ SyncReport│  │   │
//! │  │   │  Customer │  │  Action   │  │OfflineData│  │ Conflict  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Bill, Customer, MeasurementConfig, Payment)
//! - [`action`] - Queued offline mutations ([`action::OfflineAction`])
//! - [`cache`] - Cache entries and the aggregate offline snapshot
//! - [`report`] - Sync outcomes, conflicts, and the persisted status record
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation for drafts and keys
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every function is deterministic given its inputs
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: monetary values are paisa (i64), never floats
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod action;
pub mod cache;
pub mod error;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use darzi_core::Bill` instead of
// `use darzi_core::types::Bill`

pub use action::{ActionDraft, ActionKind, EntityKind, OfflineAction};
pub use cache::{CacheEntry, CacheSyncStatus, OfflineData, OfflineDataPatch};
pub use error::{CoreError, ValidationError};
pub use report::{ConflictResolution, ResolutionChoice, SyncReport, SyncStatusRecord};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default retry ceiling for a queued action.
///
/// ## Why 3?
/// An action that fails three delivery attempts across separate drains is
/// almost always rejected for a structural reason (stale schema, deleted
/// parent entity). Keeping it queued forever would block nothing (the queue
/// is FIFO-delivered and failures don't halt the drain) yet it would grow
/// the pending badge without bound.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Maximum accepted length for entity and cache identifiers.
pub const MAX_ID_LENGTH: usize = 128;
