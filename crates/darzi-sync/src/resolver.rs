//! # Conflict Resolver
//!
//! Settles a divergence between a queued local mutation and newer server
//! state.
//!
//! ## Resolution Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Conflict Resolution Strategy                          │
//! │                                                                         │
//! │  local   → keep the local payload, overriding the server               │
//! │  server  → accept the server's version, discard the local edit         │
//! │  merge   → shallow field union:                                        │
//! │              • server fields take precedence                           │
//! │              • fields only the local edit has are kept                 │
//! │              • updatedAt: the chronologically LATER of the two wins    │
//! │  manual  → nothing resolved; surfaced to a person                      │
//! │                                                                         │
//! │  Deliberately simple (no field-level CRDT): one shopkeeper device per  │
//! │  business, multi-device edits are rare, and the retry machinery, not  │
//! │  this resolver, is what catches racing writes.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use darzi_core::{ConflictResolution, ResolutionChoice};

/// Field given chronological (not server-wins) precedence during merge.
const UPDATED_AT_FIELD: &str = "updatedAt";

/// Epoch values at or above this are treated as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

// =============================================================================
// Conflict Resolver
// =============================================================================

/// Applies a resolution choice to a detected conflict.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        ConflictResolver
    }

    /// Settles the conflict: records the choice and resolved payload on the
    /// conflict and returns the payload for the caller to persist.
    ///
    /// For `Merge` without an explicit `merged` payload, the default policy
    /// above is applied. `Manual` records the choice but resolves nothing.
    pub fn resolve(
        &self,
        conflict: &mut ConflictResolution,
        choice: ResolutionChoice,
        merged: Option<Value>,
    ) -> Value {
        let resolved = match choice {
            ResolutionChoice::Local => conflict.local_data.clone(),
            ResolutionChoice::Server => conflict.server_data.clone(),
            ResolutionChoice::Merge => merged
                .unwrap_or_else(|| merge_payloads(&conflict.local_data, &conflict.server_data)),
            ResolutionChoice::Manual => Value::Null,
        };

        debug!(
            action_id = %conflict.action_id,
            entity = %conflict.entity,
            entity_id = %conflict.entity_id,
            choice = ?choice,
            "Conflict settled"
        );

        conflict.resolution = Some(choice);
        conflict.resolved_data = match choice {
            ResolutionChoice::Manual => None,
            _ => Some(resolved.clone()),
        };
        resolved
    }
}

// =============================================================================
// Default Merge
// =============================================================================

/// Shallow field union with server precedence, except `updatedAt` where the
/// later of the two timestamps wins.
fn merge_payloads(local: &Value, server: &Value) -> Value {
    let (Some(local_map), Some(server_map)) = (local.as_object(), server.as_object()) else {
        // Non-object payloads can't be field-merged; server precedence
        return if server.is_null() {
            local.clone()
        } else {
            server.clone()
        };
    };

    let mut merged: Map<String, Value> = local_map.clone();
    for (key, value) in server_map {
        merged.insert(key.clone(), value.clone());
    }

    if let Some(later) = later_updated_at(local_map, server_map) {
        merged.insert(UPDATED_AT_FIELD.to_string(), later);
    }

    Value::Object(merged)
}

/// Picks the chronologically later `updatedAt` of the two payloads.
fn later_updated_at(local: &Map<String, Value>, server: &Map<String, Value>) -> Option<Value> {
    match (
        local.get(UPDATED_AT_FIELD).and_then(parse_timestamp),
        server.get(UPDATED_AT_FIELD).and_then(parse_timestamp),
    ) {
        (Some(local_ts), Some(server_ts)) => {
            let source = if local_ts > server_ts { local } else { server };
            source.get(UPDATED_AT_FIELD).cloned()
        }
        (Some(_), None) => local.get(UPDATED_AT_FIELD).cloned(),
        _ => server.get(UPDATED_AT_FIELD).cloned(),
    }
}

/// Parses an RFC 3339 string or an epoch number (seconds or milliseconds).
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(num) => {
            let epoch = num.as_i64()?;
            if epoch >= EPOCH_MILLIS_THRESHOLD {
                Utc.timestamp_millis_opt(epoch).single()
            } else {
                Utc.timestamp_opt(epoch, 0).single()
            }
        }
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use darzi_core::EntityKind;
    use serde_json::json;

    fn conflict(local: Value, server: Value) -> ConflictResolution {
        ConflictResolution {
            action_id: "act-1".into(),
            entity: EntityKind::Bill,
            entity_id: "bill-1".into(),
            local_data: local,
            server_data: server,
            resolution: None,
            resolved_data: None,
        }
    }

    #[test]
    fn test_merge_server_precedence_with_later_server_updated_at() {
        let mut c = conflict(
            json!({
                "totalAmount": 100,
                "localOnly": "kept",
                "updatedAt": "2026-08-01T10:00:00Z"
            }),
            json!({
                "totalAmount": 250,
                "serverOnly": "also kept",
                "updatedAt": "2026-08-02T10:00:00Z"
            }),
        );

        let resolver = ConflictResolver::new();
        let resolved = resolver.resolve(&mut c, ResolutionChoice::Merge, None);

        // Server fields win on overlap
        assert_eq!(resolved["totalAmount"], 250);
        // Local-only fields survive
        assert_eq!(resolved["localOnly"], "kept");
        assert_eq!(resolved["serverOnly"], "also kept");
        // Later timestamp wins (server's)
        assert_eq!(resolved["updatedAt"], "2026-08-02T10:00:00Z");
        assert_eq!(c.resolution, Some(ResolutionChoice::Merge));
        assert_eq!(c.resolved_data.as_ref().unwrap(), &resolved);
    }

    #[test]
    fn test_merge_keeps_later_local_updated_at() {
        let mut c = conflict(
            json!({"status": "paid", "updatedAt": "2026-08-03T09:00:00Z"}),
            json!({"status": "issued", "updatedAt": "2026-08-01T09:00:00Z"}),
        );

        let resolved = ConflictResolver::new().resolve(&mut c, ResolutionChoice::Merge, None);

        // Server still wins ordinary fields, but the later (local) timestamp
        // is preserved
        assert_eq!(resolved["status"], "issued");
        assert_eq!(resolved["updatedAt"], "2026-08-03T09:00:00Z");
    }

    #[test]
    fn test_merge_with_epoch_millis_timestamps() {
        let mut c = conflict(
            json!({"updatedAt": 1_754_000_000_000i64, "a": 1}),
            json!({"updatedAt": 1_753_000_000_000i64, "b": 2}),
        );

        let resolved = ConflictResolver::new().resolve(&mut c, ResolutionChoice::Merge, None);
        assert_eq!(resolved["updatedAt"], 1_754_000_000_000i64);
        assert_eq!(resolved["a"], 1);
        assert_eq!(resolved["b"], 2);
    }

    #[test]
    fn test_explicit_merged_payload_overrides_policy() {
        let mut c = conflict(json!({"a": 1}), json!({"a": 2}));
        let resolved = ConflictResolver::new().resolve(
            &mut c,
            ResolutionChoice::Merge,
            Some(json!({"a": 99})),
        );
        assert_eq!(resolved["a"], 99);
    }

    #[test]
    fn test_local_and_server_choices() {
        let resolver = ConflictResolver::new();

        let mut c = conflict(json!({"v": "local"}), json!({"v": "server"}));
        assert_eq!(
            resolver.resolve(&mut c, ResolutionChoice::Local, None)["v"],
            "local"
        );

        let mut c = conflict(json!({"v": "local"}), json!({"v": "server"}));
        assert_eq!(
            resolver.resolve(&mut c, ResolutionChoice::Server, None)["v"],
            "server"
        );
    }

    #[test]
    fn test_manual_resolves_nothing() {
        let mut c = conflict(json!({"v": 1}), json!({"v": 2}));
        let resolved = ConflictResolver::new().resolve(&mut c, ResolutionChoice::Manual, None);

        assert!(resolved.is_null());
        assert_eq!(c.resolution, Some(ResolutionChoice::Manual));
        assert!(c.resolved_data.is_none());
    }
}
