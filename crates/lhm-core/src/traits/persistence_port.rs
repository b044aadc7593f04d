// # Persistence Port Trait
//
// Defines the interface for durable key-value storage of the registry.
//
// ## Purpose
//
// The registry keeps its authoritative state in memory. The persistence port
// holds a durable mirror under a single key (`"servers"`), overwritten
// wholesale after every mutation. There are no partial writes, no versioning
// and no migrations.
//
// ## Implementations
//
// - In-memory: `MemoryPort` (tests, throwaway sessions)
// - File-based: `FilePort` (JSON document with atomic writes)
//
// ## Usage
//
// ```rust,ignore
// use lhm_core::PersistencePort;
// use serde_json::json;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let port = /* PersistencePort implementation */;
//
//     port.set("servers", json!([])).await?;
//     let stored = port.get("servers").await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde_json::Value;

/// Key under which the whole registry is stored
pub const SERVERS_KEY: &str = "servers";

/// Trait for persistence port implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Responsibilities
///
/// - ✅ Store and return opaque JSON values by key
/// - ✅ Perform I/O for durability (files, databases, browser storage, ...)
/// - ❌ Interpret the stored values (owned by `RegistryStore`)
/// - ❌ Merge or diff values: every `set` replaces the previous value
#[async_trait]
pub trait PersistencePort: Send + Sync {
    /// Read the value stored under `key`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))`: The stored value
    /// - `Ok(None)`: Nothing stored under this key
    /// - `Err(Error)`: Storage error
    async fn get(&self, key: &str) -> Result<Option<Value>, crate::Error>;

    /// Replace the value stored under `key`
    ///
    /// Returns once the write is durable for this implementation.
    async fn set(&self, key: &str, value: Value) -> Result<(), crate::Error>;

    /// Short name used in logs
    fn port_name(&self) -> &'static str;
}

/// Helper trait for constructing persistence ports from configuration
#[async_trait]
pub trait PersistencePortFactory: Send + Sync {
    /// Create a PersistencePort instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Serialized `StorageConfig` for this port
    async fn create(&self, config: &Value) -> Result<Box<dyn PersistencePort>, crate::Error>;
}
