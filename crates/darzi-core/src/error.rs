//! # Error Types
//!
//! Domain-specific error types for darzi-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  darzi-core errors (this file)                                         │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  darzi-store errors (separate crate)                                   │
//! │  └── StoreError       - Durable store read/write failures              │
//! │                                                                         │
//! │  darzi-sync errors (separate crate)                                    │
//! │  ├── SyncError        - Engine operation failures                      │
//! │  └── RemoteError      - Remote API failure taxonomy                    │
//! │                                                                         │
//! │  Flow: ValidationError → SyncError → host application                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (entity kind, ID, etc.)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An action payload could not be interpreted as the expected entity.
    #[error("Malformed {entity} payload: {reason}")]
    MalformedPayload { entity: String, reason: String },

    /// Input failed business-rule validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation failures.
///
/// These are raised before anything is persisted, so the caller can surface
/// them immediately at the point of data entry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// An identifier was empty.
    #[error("{field} must not be empty")]
    EmptyId { field: &'static str },

    /// An identifier exceeded the maximum accepted length.
    #[error("{field} exceeds {max} characters")]
    IdTooLong { field: &'static str, max: usize },

    /// Update/Delete drafts must reference the entity they mutate.
    #[error("{kind} actions require an original entity id")]
    MissingOriginalId { kind: &'static str },

    /// Create/Update payloads must be JSON objects.
    #[error("{kind} payload must be a JSON object")]
    PayloadNotObject { kind: &'static str },

    /// Cache keys must be usable as storage key suffixes.
    #[error("Cache key '{key}' contains whitespace")]
    InvalidCacheKey { key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_context() {
        let err = ValidationError::MissingOriginalId { kind: "UPDATE" };
        assert!(err.to_string().contains("UPDATE"));

        let err = CoreError::MalformedPayload {
            entity: "bill".into(),
            reason: "missing customerId".into(),
        };
        assert!(err.to_string().contains("bill"));
        assert!(err.to_string().contains("customerId"));
    }
}
