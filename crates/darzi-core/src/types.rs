//! # Domain Types
//!
//! Core domain entities for Darzi POS: the objects a shop keeps editing
//! while offline.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Bill       │   │    Customer     │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  id             │       │
//! │  │  bill_number    │   │  customer_number│   │  bill_id (FK)   │       │
//! │  │  customer_id    │   │  name / phone   │   │  method         │       │
//! │  │  total paisa    │   │  comments       │   │  amount paisa   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌──────────────────────┐ │
//! │  │MeasurementConfig│   │BillingConfigItem │   │ReceivedItemTemplate  │ │
//! │  │  ─────────────  │   │  ──────────────  │   │  ──────────────────  │ │
//! │  │  garment_type   │   │  name            │   │  garment_type        │ │
//! │  │  fields[]       │   │  default_price   │   │  item_names[]        │ │
//! │  └─────────────────┘   └──────────────────┘   └──────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Every entity serializes with camelCase field names: the JSON shape the
//! remote REST API produces and consumes. Persisted cache records reuse the
//! same shape so a cached entity can be replayed against the API verbatim.
//!
//! ## Dual-Key Identity Pattern
//! Entities carry both:
//! - `id`: immutable identifier used for relations and sync
//! - a business number (`bill_number`, `customer_number`) shown to people

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Bill
// =============================================================================

/// Lifecycle status of a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    /// Bill is being prepared (items still being added).
    Draft,
    /// Bill handed to the customer, payment outstanding.
    Issued,
    /// Fully paid.
    Paid,
    /// Cancelled before payment.
    Cancelled,
}

impl Default for BillStatus {
    fn default() -> Self {
        BillStatus::Draft
    }
}

/// A bill for tailoring work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    /// Unique identifier.
    pub id: String,

    /// Human-readable bill number shown on the printed bill.
    pub bill_number: String,

    /// Customer this bill belongs to.
    pub customer_id: String,

    /// Line items (garments and services).
    pub items: Vec<BillItem>,

    /// Total in paisa (smallest currency unit, never floats).
    pub total_amount: i64,

    /// Current lifecycle status.
    pub status: BillStatus,

    /// Business date of the bill (may differ from created_at for backdating).
    pub bill_date: DateTime<Utc>,

    /// When the bill was created.
    pub created_at: DateTime<Utc>,

    /// When the bill was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A line item on a bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillItem {
    pub id: String,

    /// Garment or service this line charges for (e.g. "shalwar kameez").
    pub garment_type: String,

    pub quantity: u32,

    /// Unit price in paisa.
    pub unit_price: i64,
}

impl Bill {
    /// Sum of line totals in paisa.
    pub fn line_total(&self) -> i64 {
        self.items
            .iter()
            .map(|item| item.unit_price * i64::from(item.quantity))
            .sum()
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer of the shop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Unique identifier.
    pub id: String,

    /// Business identifier quoted by the customer ("book number").
    pub customer_number: String,

    pub name: String,

    pub phone: Option<String>,

    /// Free-form notes (fit preferences, fabric notes).
    pub comments: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Measurement Configuration
// =============================================================================

/// A single measurement field within a garment's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementField {
    /// Stable key used in stored measurements (e.g. "chest").
    pub name: String,

    /// Display label (e.g. "Chest / چھاتی").
    pub label: String,

    /// Measurement unit ("in", "cm").
    pub unit: String,
}

/// The set of measurements recorded for one garment type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementConfig {
    pub id: String,

    /// Garment this configuration applies to.
    pub garment_type: String,

    /// Ordered measurement fields shown on the measurement form.
    pub fields: Vec<MeasurementField>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Payment
// =============================================================================

/// How a payment was tendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Bank transfer / mobile wallet.
    BankTransfer,
    /// Card payment on an external terminal.
    ExternalCard,
}

/// A payment towards a bill.
/// A bill can receive multiple payments (advance + balance on delivery).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,

    /// Bill this payment settles (fully or partially).
    pub bill_id: String,

    pub method: PaymentMethod,

    /// Amount paid in paisa.
    pub amount: i64,

    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Billing Configuration
// =============================================================================

/// A billable service with its default price (e.g. "stitching - suit").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingConfigItem {
    pub id: String,

    pub name: String,

    pub description: Option<String>,

    /// Default price in paisa, editable per bill line.
    pub default_price: i64,

    pub updated_at: DateTime<Utc>,
}

/// Template describing the items customers typically hand over for a garment
/// (e.g. "fabric", "buttons", "sample garment").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedItemTemplate {
    pub id: String,

    pub garment_type: String,

    /// Item names offered as checkboxes when receiving an order.
    pub item_names: Vec<String>,

    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
