//! # Cache Entries and the Aggregate Offline Snapshot
//!
//! Two deliberately separate representations of offline data coexist:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Two Offline Representations (kept distinct)                │
//! │                                                                         │
//! │  PER-KEY CACHE (CacheEntry<T>)          AGGREGATE SNAPSHOT (OfflineData)│
//! │  ─────────────────────────────          ────────────────────────────── │
//! │  • one record per cache key             • one record for the whole shop│
//! │  • TTL-based expiry                     • no expiry, replaced on sync  │
//! │  • tagged with a sync status            • single lastSyncTimestamp     │
//! │  • read-through fallback for lists      • powers full offline browsing │
//! │                                                                         │
//! │  Application code relies on BOTH; they live in separate storage         │
//! │  namespaces and neither write path touches the other.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Bill, BillingConfigItem, Customer, ReceivedItemTemplate};

// =============================================================================
// Cache Entry
// =============================================================================

/// Whether the cached value has been reconciled with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSyncStatus {
    /// Written while online, server agrees.
    Synced,
    /// Written while offline, not yet delivered.
    Pending,
    /// Last delivery attempt failed.
    Failed,
}

/// A cached snapshot of domain data with expiry and sync bookkeeping.
///
/// Entries are replaced wholesale, never patched; the only merge path in the
/// engine is the aggregate snapshot below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub data: T,

    /// When the entry was written.
    pub cached_at: DateTime<Utc>,

    /// Expiry instant; `None` means the entry never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// When the engine last tried to deliver related pending work.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_attempt: Option<DateTime<Utc>>,

    pub sync_status: CacheSyncStatus,
}

impl<T> CacheEntry<T> {
    /// True once `now` has passed the expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires) if now > expires)
    }
}

// =============================================================================
// Aggregate Offline Snapshot
// =============================================================================

/// Whole-collection snapshot used for full offline browsing.
///
/// Distinct from the per-key cache: one denormalized record holding every
/// collection the app needs to render its screens with no connectivity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineData {
    #[serde(default)]
    pub bills: Vec<Bill>,

    #[serde(default)]
    pub billing_config_items: Vec<BillingConfigItem>,

    #[serde(default)]
    pub received_item_templates: Vec<ReceivedItemTemplate>,

    #[serde(default)]
    pub customers: Vec<Customer>,

    /// When any part of the snapshot was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_timestamp: Option<DateTime<Utc>>,
}

/// Partial update of the aggregate snapshot.
///
/// A present array field wholesale-replaces the stored one; absent fields are
/// left untouched. Every apply bumps `last_sync_timestamp`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineDataPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bills: Option<Vec<Bill>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_config_items: Option<Vec<BillingConfigItem>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_item_templates: Option<Vec<ReceivedItemTemplate>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customers: Option<Vec<Customer>>,
}

impl OfflineData {
    /// Applies a partial update: present arrays replace, absent keep.
    ///
    /// Pure so the merge semantics are testable without storage.
    pub fn apply_patch(&mut self, patch: OfflineDataPatch, now: DateTime<Utc>) {
        if let Some(bills) = patch.bills {
            self.bills = bills;
        }
        if let Some(items) = patch.billing_config_items {
            self.billing_config_items = items;
        }
        if let Some(templates) = patch.received_item_templates {
            self.received_item_templates = templates;
        }
        if let Some(customers) = patch.customers {
            self.customers = customers;
        }
        self.last_sync_timestamp = Some(now);
    }
}
