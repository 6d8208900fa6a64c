//! # Durable Action Queue
//!
//! The single source of truth for "what the server does not yet know".
//!
//! ## Queue Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Offline Action Queue                                 │
//! │                                                                         │
//! │  Record: offline_action_queue → JSON array of OfflineAction            │
//! │                                                                         │
//! │  enqueue ──► read array ──► append ──► write whole array               │
//! │  remove  ──► read array ──► filter ──► write whole array               │
//! │                                                                         │
//! │  ORDERING                                                              │
//! │  FIFO: insertion order is delivery order. Cross-entity dependencies    │
//! │  (a bill must exist before a payment against it) are preserved for     │
//! │  free because that is the order the operations happened on-device.     │
//! │  No priorities, no reordering.                                         │
//! │                                                                         │
//! │  DURABILITY                                                            │
//! │  The queue must survive process restarts: a closed app with three     │
//! │  unsent bills still has three unsent bills tomorrow.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use darzi_core::validation::validate_draft;
use darzi_core::{ActionDraft, OfflineAction, DEFAULT_MAX_RETRIES};

use crate::error::{StoreError, StoreResult};
use crate::kv::DurableStore;

/// Storage key holding the queue record.
pub const QUEUE_KEY: &str = "offline_action_queue";

// =============================================================================
// Action Queue
// =============================================================================

/// Durable, ordered queue of offline mutations.
#[derive(Clone)]
pub struct ActionQueue {
    store: Arc<dyn DurableStore>,

    /// Retry ceiling stamped onto newly enqueued actions.
    max_retries: u32,
}

impl ActionQueue {
    /// Creates a queue with the default retry ceiling.
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        ActionQueue::with_max_retries(store, DEFAULT_MAX_RETRIES)
    }

    /// Creates a queue stamping a custom retry ceiling onto new actions.
    pub fn with_max_retries(store: Arc<dyn DurableStore>, max_retries: u32) -> Self {
        ActionQueue { store, max_retries }
    }

    /// Validates and appends a draft, assigning queue bookkeeping.
    ///
    /// The id is a UUID v7: time-ordered with a random suffix, so ids from
    /// one device sort in enqueue order and never collide across devices.
    ///
    /// Persistence errors propagate: a caller must never believe an action
    /// is queued when it is not.
    pub async fn enqueue(&self, draft: ActionDraft) -> StoreResult<OfflineAction> {
        validate_draft(&draft)?;

        let action = OfflineAction {
            id: Uuid::now_v7().to_string(),
            kind: draft.kind,
            entity: draft.entity,
            payload: draft.payload,
            original_id: draft.original_id,
            created_at: Utc::now(),
            retry_count: 0,
            max_retries: self.max_retries,
        };

        let mut actions = self.load_lenient().await;
        actions.push(action.clone());
        self.persist(&actions).await?;

        debug!(
            id = %action.id,
            kind = %action.kind,
            entity = %action.entity,
            pending = actions.len(),
            "Action enqueued"
        );
        Ok(action)
    }

    /// Returns all pending actions in insertion order.
    ///
    /// A missing or undecodable record yields an empty list: callers that
    /// only need best-effort visibility must never be failed by a corrupted
    /// byte in storage.
    pub async fn list(&self) -> Vec<OfflineAction> {
        self.load_lenient().await
    }

    /// Removes an action by id. Removing an absent id is a no-op.
    pub async fn remove(&self, id: &str) -> StoreResult<()> {
        let mut actions = self.load_lenient().await;
        let before = actions.len();
        actions.retain(|action| action.id != id);

        if actions.len() == before {
            return Ok(());
        }
        self.persist(&actions).await
    }

    /// Patches the retry counter of a single queued action.
    pub async fn update_retry(&self, id: &str, retry_count: u32) -> StoreResult<()> {
        let mut actions = self.load_lenient().await;
        let mut changed = false;

        for action in &mut actions {
            if action.id == id {
                action.retry_count = retry_count;
                changed = true;
                break;
            }
        }

        if !changed {
            warn!(id = %id, "update_retry on absent action");
            return Ok(());
        }
        self.persist(&actions).await
    }

    /// Number of pending actions.
    pub async fn size(&self) -> usize {
        self.load_lenient().await.len()
    }

    /// True when at least one action awaits delivery.
    pub async fn has_pending(&self) -> bool {
        self.size().await > 0
    }

    // -------------------------------------------------------------------------
    // Record I/O
    // -------------------------------------------------------------------------

    async fn load_lenient(&self) -> Vec<OfflineAction> {
        let raw = match self.store.get(QUEUE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(?e, "Queue record unreadable, treating as empty");
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(actions) => actions,
            Err(e) => {
                warn!(?e, "Queue record corrupted, treating as empty");
                Vec::new()
            }
        }
    }

    async fn persist(&self, actions: &[OfflineAction]) -> StoreResult<()> {
        let raw = serde_json::to_string(actions)
            .map_err(|e| StoreError::serialization(QUEUE_KEY, e))?;
        self.store.set(QUEUE_KEY, &raw).await
    }
}

// =============================================================================
// Tests
// =============================================================================
