//! # Offline Actions
//!
//! The unit of work the offline queue stores: one mutation the server has not
//! seen yet.
//!
//! ## Action Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Offline Action Lifecycle                          │
//! │                                                                         │
//! │  ActionDraft (caller)                                                  │
//! │       │  enqueue: assign id, created_at, retry_count = 0               │
//! │       ▼                                                                 │
//! │  OfflineAction (queued, durable)                                       │
//! │       │  drain dispatches Create/Update/Delete to the remote API       │
//! │       ▼                                                                 │
//! │  ┌──────────────┬──────────────────┬────────────────────────────────┐  │
//! │  │   success    │ version conflict │     transient failure          │  │
//! │  │   removed    │ stays queued,    │ retry_count += 1;              │  │
//! │  │              │ conflict raised  │ removed once ceiling reached   │  │
//! │  └──────────────┴──────────────────┴────────────────────────────────┘  │
//! │                                                                         │
//! │  INVARIANTS                                                            │
//! │  • retry_count <= max_retries (except the instant before removal)      │
//! │  • queue order is insertion order = delivery order, no priorities      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Kind Enums
// =============================================================================

/// The mutation a queued action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl ActionKind {
    /// Stable uppercase name, used in logs and validation messages.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "CREATE",
            ActionKind::Update => "UPDATE",
            ActionKind::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain object types that can be mutated offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Bill,
    Customer,
    MeasurementConfig,
    Payment,
}

impl EntityKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Bill => "bill",
            EntityKind::Customer => "customer",
            EntityKind::MeasurementConfig => "measurementConfig",
            EntityKind::Payment => "payment",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Action Draft
// =============================================================================

/// What callers hand to the queue: a mutation without queue bookkeeping.
///
/// The queue assigns the id, timestamp, and retry counters on enqueue, so a
/// draft can never carry stale bookkeeping from a previous life.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDraft {
    pub kind: ActionKind,

    pub entity: EntityKind,

    /// Entity JSON in the remote API's wire shape.
    pub payload: Value,

    /// Id of the entity being mutated. Required for Update/Delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,
}

impl ActionDraft {
    /// Creates a Create draft for a new entity payload.
    pub fn create(entity: EntityKind, payload: Value) -> Self {
        ActionDraft {
            kind: ActionKind::Create,
            entity,
            payload,
            original_id: None,
        }
    }

    /// Creates an Update draft against an existing entity.
    pub fn update(entity: EntityKind, original_id: impl Into<String>, payload: Value) -> Self {
        ActionDraft {
            kind: ActionKind::Update,
            entity,
            payload,
            original_id: Some(original_id.into()),
        }
    }

    /// Creates a Delete draft against an existing entity.
    pub fn delete(entity: EntityKind, original_id: impl Into<String>) -> Self {
        ActionDraft {
            kind: ActionKind::Delete,
            entity,
            payload: Value::Null,
            original_id: Some(original_id.into()),
        }
    }
}

// =============================================================================
// Offline Action
// =============================================================================

/// A queued mutation awaiting delivery to the server.
///
/// Owned by the action queue; only the sync orchestrator mutates it (the
/// retry counter) and only via the queue's `update_retry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineAction {
    /// Unique id, time-ordered (UUID v7) so ids sort in enqueue order.
    pub id: String,

    pub kind: ActionKind,

    pub entity: EntityKind,

    /// Entity JSON in the remote API's wire shape.
    pub payload: Value,

    /// Id of the entity being mutated. Present for Update/Delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,

    /// When the action was enqueued.
    pub created_at: DateTime<Utc>,

    /// Delivery attempts so far.
    pub retry_count: u32,

    /// Ceiling after which the action is dropped and reported as failed.
    pub max_retries: u32,
}

impl OfflineAction {
    /// True once the retry counter has reached the ceiling.
    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}
