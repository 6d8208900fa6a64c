//! # Remote API Collaborator
//!
//! The engine never speaks a wire protocol of its own; the host supplies a
//! client for its backend (REST/JSON in production) behind this seam. The
//! engine only needs create/update/delete per entity kind, and a failure
//! taxonomy it can route on.
//!
//! ## Failure Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Remote Failure Routing                             │
//! │                                                                         │
//! │  Transient        → counts toward the action's retry ceiling           │
//! │  (network error,    (timeouts included; a timeout is just a slow       │
//! │   server 5xx)        transient failure)                                │
//! │                                                                         │
//! │  VersionConflict  → routed to conflict resolution; the action stays    │
//! │  (server holds      queued and the conflict is surfaced in the         │
//! │   newer state)      SyncReport. Not a retry.                           │
//! │                                                                         │
//! │  Rejected         → exhausted immediately: removed and reported in     │
//! │  (validation 4xx)   failed_actions without consuming retries. The      │
//! │                     payload will never become acceptable by retrying.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery is at-least-once: a success response lost to a dying connection
//! means the same action is delivered again on the next drain. Idempotency
//! (e.g. honoring client-generated ids) is the implementer's concern.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use darzi_core::EntityKind;

// =============================================================================
// Remote Error
// =============================================================================

/// Failure taxonomy for remote calls.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Retryable failure: network error, timeout, server 5xx.
    #[error("Transient remote failure: {0}")]
    Transient(String),

    /// The server holds a newer version than this mutation assumed.
    #[error("Version conflict: server holds newer state")]
    VersionConflict {
        /// The entity as the server currently has it.
        server: Value,
    },

    /// Permanent rejection (server-side validation, missing parent entity).
    #[error("Rejected by server: {0}")]
    Rejected(String),
}

impl RemoteError {
    /// Returns true if retrying the same call can possibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }
}

// =============================================================================
// Remote API Trait
// =============================================================================

/// The opaque backend collaborator.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Creates an entity; returns the server's stored representation.
    async fn create(&self, entity: EntityKind, payload: &Value) -> Result<Value, RemoteError>;

    /// Updates an entity by id; returns the server's stored representation.
    async fn update(
        &self,
        entity: EntityKind,
        id: &str,
        payload: &Value,
    ) -> Result<Value, RemoteError>;

    /// Deletes an entity by id.
    async fn delete(&self, entity: EntityKind, id: &str) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(RemoteError::Transient("connection reset".into()).is_retryable());
        assert!(!RemoteError::Rejected("unknown customerId".into()).is_retryable());
        assert!(!RemoteError::VersionConflict { server: json!({}) }.is_retryable());
    }
}
