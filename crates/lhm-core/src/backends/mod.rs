//! Plugin-based backend registry
//!
//! The registry lets persistence ports and reachability probes be registered
//! by name at runtime, so the binary never hardcodes which implementation
//! backs which configuration value.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lhm_core::backends::BackendRegistry;
//! use lhm_core::config::StorageConfig;
//!
//! let registry = BackendRegistry::with_builtin_storage();
//! lhm_probe_http::register(&registry);
//!
//! let port = registry.create_storage(&StorageConfig::Memory).await?;
//! let probe = registry.create_probe(&Default::default())?;
//! ```

use crate::config::{ProbeConfig, StorageConfig};
use crate::error::{Error, Result};
use crate::persistence::{FilePortFactory, MemoryPortFactory};
use crate::traits::{
    PersistencePort, PersistencePortFactory, ReachabilityProbe, ReachabilityProbeFactory,
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Backend registry
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct BackendRegistry {
    /// Registered persistence port factories
    storages: RwLock<HashMap<String, Arc<dyn PersistencePortFactory>>>,

    /// Registered reachability probe factories
    probes: RwLock<HashMap<String, Box<dyn ReachabilityProbeFactory>>>,
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `file` and `memory` storage types
    pub fn with_builtin_storage() -> Self {
        let registry = Self::new();
        registry.register_storage("file", Box::new(FilePortFactory));
        registry.register_storage("memory", Box::new(MemoryPortFactory));
        registry
    }

    /// Register a persistence port factory
    ///
    /// # Parameters
    ///
    /// - `name`: Storage type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating port instances
    pub fn register_storage(
        &self,
        name: impl Into<String>,
        factory: Box<dyn PersistencePortFactory>,
    ) {
        let mut storages = self.storages.write().unwrap_or_else(PoisonError::into_inner);
        storages.insert(name.into(), Arc::from(factory));
    }

    /// Register a reachability probe factory
    ///
    /// # Parameters
    ///
    /// - `name`: Probe backend name (e.g., "http")
    /// - `factory`: Factory object for creating probe instances
    pub fn register_probe(&self, name: impl Into<String>, factory: Box<dyn ReachabilityProbeFactory>) {
        let mut probes = self.probes.write().unwrap_or_else(PoisonError::into_inner);
        probes.insert(name.into(), factory);
    }

    /// Create a persistence port from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn PersistencePort>)`: Created port instance
    /// - `Err(Error)`: If the storage type is not registered or creation fails
    pub async fn create_storage(&self, config: &StorageConfig) -> Result<Box<dyn PersistencePort>> {
        config.validate()?;
        let storage_type = config.type_name();

        let factory = {
            let storages = self.storages.read().unwrap_or_else(PoisonError::into_inner);
            storages
                .get(storage_type)
                .ok_or_else(|| Error::config(format!("Unknown storage type: {}", storage_type)))?
                .clone()
        };

        let config_json = serde_json::to_value(config)?;

        // The lock is released before the async create
        factory.create(&config_json).await
    }

    /// Create a reachability probe from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ReachabilityProbe>)`: Created probe instance
    /// - `Err(Error)`: If the backend is not registered or creation fails
    pub fn create_probe(&self, config: &ProbeConfig) -> Result<Box<dyn ReachabilityProbe>> {
        config.validate()?;
        let probes = self.probes.read().unwrap_or_else(PoisonError::into_inner);

        let factory = probes
            .get(&config.backend)
            .ok_or_else(|| Error::config(format!("Unknown probe backend: {}", config.backend)))?;

        factory.create(config)
    }

    /// List all registered storage types
    pub fn list_storages(&self) -> Vec<String> {
        let storages = self.storages.read().unwrap_or_else(PoisonError::into_inner);
        storages.keys().cloned().collect()
    }

    /// List all registered probe backends
    pub fn list_probes(&self) -> Vec<String> {
        let probes = self.probes.read().unwrap_or_else(PoisonError::into_inner);
        probes.keys().cloned().collect()
    }

    /// Check if a storage type is registered
    pub fn has_storage(&self, name: &str) -> bool {
        let storages = self.storages.read().unwrap_or_else(PoisonError::into_inner);
        storages.contains_key(name)
    }

    /// Check if a probe backend is registered
    pub fn has_probe(&self, name: &str) -> bool {
        let probes = self.probes.read().unwrap_or_else(PoisonError::into_inner);
        probes.contains_key(name)
    }
}
