//! # Store Error Types
//!
//! Error types for durable store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  Backend error (sqlx::Error, custom host backend)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← adds the record key and categorization     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError (darzi-sync) ← surfaced to whichever public method ran      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite backend failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A record could not be encoded or decoded.
    ///
    /// Raised only on write paths; read paths treat undecodable records as
    /// absent so a single corrupted record cannot wedge the engine.
    #[error("Serialization failed for record '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Input rejected before touching storage.
    #[error(transparent)]
    Validation(#[from] darzi_core::ValidationError),

    /// Failure reported by a host-provided backend.
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Wraps a serde failure with the record key it occurred on.
    pub(crate) fn serialization(key: &str, source: serde_json::Error) -> Self {
        StoreError::Serialization {
            key: key.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_error_names_the_key() {
        let source = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = StoreError::serialization("offline_action_queue", source);
        assert!(err.to_string().contains("offline_action_queue"));
    }
}
