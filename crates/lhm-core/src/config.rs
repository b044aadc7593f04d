//! Configuration types for the server registry
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Where the registry is persisted
    #[serde(default)]
    pub storage: StorageConfig,

    /// How reachability is probed
    #[serde(default)]
    pub probe: ProbeConfig,
}

impl ManagerConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.storage.validate()?;
        self.probe.validate()?;
        Ok(())
    }
}

/// Persistence port configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// JSON file on disk
    File {
        /// Path to the storage file
        path: String,
    },

    /// In-memory storage (not persistent)
    #[default]
    Memory,

    /// Custom persistence port
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StorageConfig {
    /// Validate the storage configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StorageConfig::File { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("Storage file path cannot be empty"));
                }
                Ok(())
            }
            StorageConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom storage factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom storage config cannot be null"));
                }
                Ok(())
            }
            StorageConfig::Memory => Ok(()),
        }
    }

    /// Get the storage type name
    pub fn type_name(&self) -> &str {
        match self {
            StorageConfig::File { .. } => "file",
            StorageConfig::Memory => "memory",
            StorageConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Upper bound for [`ProbeConfig::timeout_secs`]
pub const MAX_PROBE_TIMEOUT_SECS: u64 = 120;

/// Reachability probe configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Probe backend name
    #[serde(default = "default_probe_backend")]
    pub backend: String,

    /// Transport timeout for a single probe (in seconds)
    ///
    /// The registry itself never times probes out; this is handed to the
    /// transport.
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProbeConfig {
    /// Validate the probe configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.backend.is_empty() {
            return Err(crate::Error::config("Probe backend cannot be empty"));
        }
        if !(1..=MAX_PROBE_TIMEOUT_SECS).contains(&self.timeout_secs) {
            return Err(crate::Error::config(format!(
                "Probe timeout must be between 1 and {} seconds",
                MAX_PROBE_TIMEOUT_SECS
            )));
        }
        Ok(())
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            backend: default_probe_backend(),
            timeout_secs: default_probe_timeout_secs(),
        }
    }
}

fn default_probe_backend() -> String {
    "http".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    5
}
