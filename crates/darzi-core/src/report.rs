//! # Sync Outcomes
//!
//! Types describing what a drain accomplished: the per-run report, detected
//! conflicts awaiting resolution, and the persisted status record the UI
//! reads for its pending badge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::{EntityKind, OfflineAction};

// =============================================================================
// Conflict Resolution
// =============================================================================

/// How a conflict should be (or was) settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionChoice {
    /// Keep the local payload, overriding the server.
    Local,
    /// Accept the server's version, discarding the local edit.
    Server,
    /// Shallow field union with server precedence (latest `updatedAt` wins).
    Merge,
    /// Surface to a person; nothing resolved automatically.
    Manual,
}

/// A divergence between a queued local mutation and newer server state.
///
/// Built by the sync orchestrator when the server reports a version mismatch;
/// consumed by the UI or settled by the resolver's default policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolution {
    /// Queued action that hit the conflict (still queued until settled).
    pub action_id: String,

    pub entity: EntityKind,

    /// Id of the conflicted entity.
    pub entity_id: String,

    /// The payload the local action wanted to apply.
    pub local_data: Value,

    /// What the server currently holds.
    pub server_data: Value,

    /// Set once the conflict has been settled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionChoice>,

    /// The payload produced by the resolution, for the caller to persist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_data: Option<Value>,
}

// =============================================================================
// Sync Report
// =============================================================================

/// Outcome of one drain, broadcast to every sync listener.
///
/// `success` means the drain ran to completion without a top-level failure;
/// per-action failures and conflicts are reported in the counts so callers
/// can apply their own threshold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub success: bool,

    /// Actions delivered and removed from the queue.
    pub synced_actions: u32,

    /// Actions dropped after exhausting retries or being rejected outright.
    pub failed_actions: Vec<OfflineAction>,

    /// Version conflicts detected; their actions remain queued.
    pub conflicts: Vec<ConflictResolution>,
}

impl SyncReport {
    /// The no-op report returned when a drain cannot run (offline, or another
    /// drain is already in flight). Nothing was attempted, nothing changed.
    pub fn skipped() -> Self {
        SyncReport::default()
    }

    /// True when every queued action was delivered cleanly.
    pub fn is_clean(&self) -> bool {
        self.success && self.failed_actions.is_empty() && self.conflicts.is_empty()
    }
}

// =============================================================================
// Persisted Sync Status
// =============================================================================

/// Durable record of sync health, read by the UI for its status badge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_attempt: Option<DateTime<Utc>>,

    /// Last drain that delivered at least one action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful_sync: Option<DateTime<Utc>>,

    /// Queue depth at the time of the last update.
    #[serde(default)]
    pub pending_actions: u32,
}
