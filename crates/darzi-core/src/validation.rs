//! # Validation Module
//!
//! Business-rule validation applied before anything reaches the durable
//! store. The storage layer trusts its callers; this module is where that
//! trust is earned.
//!
//! ## Usage
//! ```rust
//! use darzi_core::validation::{validate_draft, validate_cache_key};
//! use darzi_core::{ActionDraft, EntityKind};
//! use serde_json::json;
//!
//! let draft = ActionDraft::create(EntityKind::Bill, json!({"customerId": "c1"}));
//! validate_draft(&draft).unwrap();
//!
//! validate_cache_key("customers").unwrap();
//! ```

use serde_json::Value;

use crate::action::{ActionDraft, ActionKind};
use crate::error::ValidationError;
use crate::MAX_ID_LENGTH;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates an entity identifier.
///
/// ## Rules
/// - Must not be empty
/// - Must not exceed [`MAX_ID_LENGTH`] characters
pub fn validate_entity_id(field: &'static str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::EmptyId { field });
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(ValidationError::IdTooLong {
            field,
            max: MAX_ID_LENGTH,
        });
    }
    Ok(())
}

/// Validates a cache key before it is joined into a storage key.
pub fn validate_cache_key(key: &str) -> ValidationResult<()> {
    if key.is_empty() {
        return Err(ValidationError::EmptyId { field: "cache key" });
    }
    if key.len() > MAX_ID_LENGTH {
        return Err(ValidationError::IdTooLong {
            field: "cache key",
            max: MAX_ID_LENGTH,
        });
    }
    if key.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidCacheKey { key: key.to_string() });
    }
    Ok(())
}

// =============================================================================
// Draft Validators
// =============================================================================

/// Validates an action draft before it is enqueued.
///
/// ## Rules
/// - Update/Delete must reference the entity they mutate (`original_id`)
/// - Create/Update payloads must be JSON objects (the wire shape the remote
///   API accepts); Delete carries no payload
pub fn validate_draft(draft: &ActionDraft) -> ValidationResult<()> {
    match draft.kind {
        ActionKind::Create => validate_object_payload("CREATE", &draft.payload)?,
        ActionKind::Update => {
            require_original_id("UPDATE", draft)?;
            validate_object_payload("UPDATE", &draft.payload)?;
        }
        ActionKind::Delete => require_original_id("DELETE", draft)?,
    }
    Ok(())
}

fn require_original_id(kind: &'static str, draft: &ActionDraft) -> ValidationResult<()> {
    match draft.original_id.as_deref() {
        Some(id) => validate_entity_id("originalId", id),
        None => Err(ValidationError::MissingOriginalId { kind }),
    }
}

fn validate_object_payload(kind: &'static str, payload: &Value) -> ValidationResult<()> {
    if payload.is_object() {
        Ok(())
    } else {
        Err(ValidationError::PayloadNotObject { kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityKind;
    use serde_json::json;

    #[test]
    fn test_entity_id_rules() {
        assert!(validate_entity_id("id", "bill-1").is_ok());
        assert_eq!(
            validate_entity_id("id", "  "),
            Err(ValidationError::EmptyId { field: "id" })
        );
        let long = "x".repeat(MAX_ID_LENGTH + 1);
        assert!(validate_entity_id("id", &long).is_err());
    }

    #[test]
    fn test_cache_key_rejects_whitespace() {
        assert!(validate_cache_key("customers").is_ok());
        assert!(validate_cache_key("bill_42").is_ok());
        assert!(matches!(
            validate_cache_key("all bills"),
            Err(ValidationError::InvalidCacheKey { .. })
        ));
        assert!(validate_cache_key("").is_err());
    }

    #[test]
    fn test_update_requires_original_id() {
        let mut draft = ActionDraft::create(EntityKind::Bill, json!({"a": 1}));
        draft.kind = ActionKind::Update;
        assert_eq!(
            validate_draft(&draft),
            Err(ValidationError::MissingOriginalId { kind: "UPDATE" })
        );
    }

    #[test]
    fn test_create_requires_object_payload() {
        let draft = ActionDraft::create(EntityKind::Customer, json!("not an object"));
        assert_eq!(
            validate_draft(&draft),
            Err(ValidationError::PayloadNotObject { kind: "CREATE" })
        );
    }

    #[test]
    fn test_delete_needs_no_payload() {
        let draft = ActionDraft::delete(EntityKind::Payment, "pay-1");
        assert!(validate_draft(&draft).is_ok());
    }
}
