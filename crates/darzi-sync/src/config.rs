//! # Engine Configuration
//!
//! Configuration management for the offline engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DARZI_REMOTE_URL=https://api.example.com                           │
//! │     DARZI_MAX_RETRIES=5                                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/darzi-pos/engine.toml (Linux)                            │
//! │     ~/Library/Application Support/com.darzi.darzi-pos/engine.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     max_retries = 3, auto-generated device id                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # engine.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Shop Counter"
//!
//! [remote]
//! base_url = "https://api.darzi.example/v1"
//! direct_attempts = 3
//! initial_backoff_ms = 500
//! max_backoff_secs = 30
//!
//! [sync]
//! max_retries = 3
//! probe_interval_secs = 15
//! probe_failure = "assume_online"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::network::ProbeFailurePolicy;

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    pub id: String,

    /// Human-readable device name (e.g. "Shop Counter", "Back Room").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "Darzi Terminal".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Remote Settings
// =============================================================================

/// Settings for talking to the remote API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL of the remote API (informational for the host's client;
    /// validated here so a typo fails at startup, not mid-sale).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Attempts for a direct (non-queued) call before falling back to the
    /// queue. The orchestrator's per-action ceiling is independent of this.
    #[serde(default = "default_direct_attempts")]
    pub direct_attempts: u32,

    /// Initial backoff delay between direct-call attempts (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_direct_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    30
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            base_url: None,
            direct_attempts: default_direct_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Delivery attempts per queued action before it is dropped and reported
    /// as failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Interval between connectivity probe samples (seconds).
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// What to assume when the connectivity probe itself fails.
    #[serde(default)]
    pub probe_failure: ProbeFailurePolicy,
}

fn default_max_retries() -> u32 {
    darzi_core::DEFAULT_MAX_RETRIES
}

fn default_probe_interval() -> u64 {
    15
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            max_retries: default_max_retries(),
            probe_interval_secs: default_probe_interval(),
            probe_failure: ProbeFailurePolicy::default(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Full engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub sync: SyncSettings,
}

impl EngineConfig {
    /// Loads configuration from the given path, falling back to the platform
    /// config directory, falling back to defaults. Environment overrides are
    /// applied last. Never fails: a broken config file logs a warning and
    /// yields defaults so the app still starts.
    pub fn load_or_default(path: Option<PathBuf>) -> Self {
        let path = path.or_else(Self::default_config_path);

        let mut config = match path {
            Some(ref p) if p.exists() => match Self::load(p) {
                Ok(config) => {
                    info!(path = %p.display(), "Loaded engine config");
                    config
                }
                Err(e) => {
                    warn!(path = %p.display(), ?e, "Config unreadable, using defaults");
                    EngineConfig::default()
                }
            },
            _ => {
                debug!("No config file, using defaults");
                EngineConfig::default()
            }
        };

        config.apply_env_overrides();
        config
    }

    /// Loads and parses a config file.
    pub fn load(path: &PathBuf) -> SyncResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Saves the configuration (used to persist a generated device id).
    pub fn save(&self, path: &PathBuf) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path, raw).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))
    }

    /// Platform config file location.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "darzi", "darzi-pos")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    /// Applies `DARZI_*` environment overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DARZI_REMOTE_URL") {
            self.remote.base_url = Some(url);
        }
        if let Ok(raw) = std::env::var("DARZI_MAX_RETRIES") {
            match raw.parse() {
                Ok(n) => self.sync.max_retries = n,
                Err(_) => warn!(value = %raw, "Ignoring non-numeric DARZI_MAX_RETRIES"),
            }
        }
        if let Ok(id) = std::env::var("DARZI_DEVICE_ID") {
            self.device.id = id;
        }
    }

    /// Validates the configuration before the engine starts.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("Device id must not be empty".into()));
        }
        if self.remote.direct_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "remote.direct_attempts must be at least 1".into(),
            ));
        }
        if self.sync.max_retries == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.max_retries must be at least 1".into(),
            ));
        }
        if let Some(ref base_url) = self.remote.base_url {
            url::Url::parse(base_url).map_err(|e| {
                SyncError::InvalidConfig(format!("remote.base_url '{base_url}': {e}"))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.remote.direct_attempts, 3);
        assert_eq!(config.sync.probe_failure, ProbeFailurePolicy::AssumeOnline);
        // Generated device id is a parseable UUID
        assert!(Uuid::parse_str(&config.device.id).is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            [device]
            id = "dev-1"
            name = "Counter"

            [sync]
            max_retries = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.device.id, "dev-1");
        assert_eq!(config.sync.max_retries, 5);
        // Unspecified sections fall back to defaults
        assert_eq!(config.remote.direct_attempts, 3);
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = EngineConfig::default();
        config.remote.base_url = Some("not a url".into());
        assert!(config.validate().is_err());

        config.remote.base_url = Some("https://api.darzi.example/v1".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = EngineConfig::default();
        config.remote.direct_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.sync.max_retries = 0;
        assert!(config.validate().is_err());
    }
}
