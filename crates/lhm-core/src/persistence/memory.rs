// # Memory Persistence Port
//
// In-memory implementation of PersistencePort.
//
// ## Purpose
//
// Keeps the durable mirror in a HashMap. Nothing survives a restart.
//
// ## When to Use
//
// - Tests
// - Throwaway sessions (`LHM_STORAGE_TYPE=memory`)

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::persistence_port::{PersistencePort, PersistencePortFactory};

/// In-memory persistence port
///
/// Clones share the same underlying map, so a test can keep a handle while
/// the registry owns another.
///
/// # Example
///
/// ```rust,no_run
/// use lhm_core::persistence::MemoryPort;
/// use lhm_core::traits::PersistencePort;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let port = MemoryPort::new();
///
///     port.set("servers", serde_json::json!([])).await?;
///     assert_eq!(port.get("servers").await?, Some(serde_json::json!([])));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryPort {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryPort {
    /// Create a new empty memory port
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory port pre-populated with one key
    pub fn with_value(key: impl Into<String>, value: Value) -> Self {
        let mut map = HashMap::new();
        map.insert(key.into(), value);
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Get the number of keys in the port
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the port is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl PersistencePort for MemoryPort {
    async fn get(&self, key: &str) -> Result<Option<Value>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(key.to_string(), value);
        Ok(())
    }

    fn port_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for the `memory` storage type
pub struct MemoryPortFactory;

#[async_trait]
impl PersistencePortFactory for MemoryPortFactory {
    async fn create(&self, _config: &Value) -> Result<Box<dyn PersistencePort>, Error> {
        Ok(Box::new(MemoryPort::new()))
    }
}
