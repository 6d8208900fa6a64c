//! # Sync Error Types
//!
//! Error types for engine operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Storage      │  │     Remote (remote.rs)  │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Storage        │  │  Transient              │ │
//! │  │  ConfigLoad     │  │  Serialization  │  │  VersionConflict        │ │
//! │  │  ConfigSave     │  │                 │  │  Rejected               │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  PROPAGATION POLICY                                                    │
//! │  Remote failures are handled entirely inside the orchestrator and      │
//! │  never surface as errors: only the aggregate SyncReport is visible.   │
//! │  Storage errors surface as rejected operations to whichever public     │
//! │  method triggered them.                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use darzi_core::ValidationError;
use darzi_store::StoreError;

/// Result type alias for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Engine error type covering all engine operation failures.
///
/// ## Design Principles
/// - Each variant includes enough context for debugging
/// - Errors are categorized for different handling strategies
/// - All errors are `Send + Sync` for async compatibility
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Durable store read/write failure.
    #[error(transparent)]
    Storage(#[from] StoreError),

    // =========================================================================
    // Input Errors
    // =========================================================================
    /// Input rejected before touching storage or the network.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Failed to serialize or deserialize a payload.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Engine is shutting down.
    #[error("Offline engine is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if this error came from the durable store.
    pub fn is_storage_error(&self) -> bool {
        matches!(self, SyncError::Storage(_))
    }
}
