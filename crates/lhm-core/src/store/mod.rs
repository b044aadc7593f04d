//! Registry store
//!
//! The RegistryStore is responsible for:
//! - Owning the ordered, in-memory list of servers
//! - Validating and applying mutations (add, remove, replace)
//! - Mirroring the whole list to the persistence port after each mutation
//! - Signalling the presentation layer that it should re-render
//!
//! ## Mutation Flow
//!
//! ```text
//!  caller ──► validate ──► mutate memory ──► RegistryEvent ──► PersistencePort::set
//!                 │              (visible to list())   (re-render)      (awaited last)
//!                 └── Error::Validation, nothing changed
//! ```
//!
//! Mutations go through a write gate, so the durable mirror is written in
//! the same order as the in-memory changes. Reads never wait on the gate.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::id::IdGenerator;
use crate::model::{DEFAULT_HOST, ServerId, ServerRecord, default_label, parse_port};
use crate::traits::{PersistencePort, SERVERS_KEY};

/// Capacity of the event channel returned by [`RegistryStore::new`]
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Events emitted by the RegistryStore
///
/// Every event means "the list changed, render it again", with enough detail
/// for a presentation layer that wants to do less than a full re-render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// Registry loaded from the persistence port
    Loaded { count: usize },

    /// Server appended
    Added { id: ServerId },

    /// Server removed
    Removed { id: ServerId },

    /// Whole registry replaced (bulk import)
    Replaced { count: usize },

    /// The durable mirror could not be written; memory is ahead of storage
    PersistFailed { error: String },
}

/// Registry store
///
/// Cheap to clone; all clones share the same registry.
#[derive(Clone)]
pub struct RegistryStore {
    inner: Arc<Inner>,
}

struct Inner {
    /// Ordered registry, the single source of truth
    records: RwLock<Vec<ServerRecord>>,

    /// Durable mirror
    port: Box<dyn PersistencePort>,

    /// Identifier source for new servers
    ids: IdGenerator,

    /// Serializes mutations and their durable writes
    write_gate: Mutex<()>,

    /// Event sender for the presentation layer
    event_tx: mpsc::Sender<RegistryEvent>,
}

impl RegistryStore {
    /// Create an empty registry backed by `port`
    ///
    /// Call [`RegistryStore::load`] before use to pick up the stored state.
    ///
    /// # Returns
    ///
    /// A tuple of (store, event_receiver) where event_receiver yields registry events
    pub fn new(port: Box<dyn PersistencePort>) -> (Self, mpsc::Receiver<RegistryEvent>) {
        Self::with_event_capacity(port, DEFAULT_EVENT_CAPACITY)
    }

    /// Same as [`RegistryStore::new`] with a custom event channel capacity
    pub fn with_event_capacity(
        port: Box<dyn PersistencePort>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<RegistryEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let store = Self {
            inner: Arc::new(Inner {
                records: RwLock::new(Vec::new()),
                port,
                ids: IdGenerator::new(),
                write_gate: Mutex::new(()),
                event_tx: tx,
            }),
        };

        (store, rx)
    }

    /// Read the registry from the persistence port
    ///
    /// A missing key yields an empty registry. The in-memory list is replaced
    /// wholesale.
    ///
    /// # Returns
    ///
    /// - `Ok(count)`: Number of servers loaded
    /// - `Err(Error::Persistence)`: The port failed or the stored value is not a server list
    pub async fn load(&self) -> Result<usize> {
        let _gate = self.inner.write_gate.lock().await;

        let stored = self.inner.port.get(SERVERS_KEY).await?;
        let records: Vec<ServerRecord> = match stored {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value).map_err(|e| {
                Error::persistence(format!("Stored server list is invalid: {}", e))
            })?,
        };

        let records = ensure_unique_ids(records, &self.inner.ids);
        let count = records.len();
        *self.write_records() = records;

        info!(
            "Loaded {} server(s) from {} storage",
            count,
            self.inner.port.port_name()
        );
        self.emit_event(RegistryEvent::Loaded { count });
        Ok(count)
    }

    /// Add a server
    ///
    /// # Parameters
    ///
    /// - `host`: Host name; empty means `localhost`
    /// - `label`: Display label; empty means `Port {port}`
    /// - `port_text`: Port as typed by the user, must be in `1..=65535`
    /// - `is_secure`: `https` when true, `http` otherwise
    ///
    /// # Returns
    ///
    /// - `Ok(record)`: The appended record
    /// - `Err(Error::Validation)`: Bad or missing port; registry unchanged
    /// - `Err(Error::Persistence)`: Added in memory, but not durably
    pub async fn add(
        &self,
        host: &str,
        label: &str,
        port_text: &str,
        is_secure: bool,
    ) -> Result<ServerRecord> {
        let port = parse_port(port_text)?;

        let host = match host.trim() {
            "" => DEFAULT_HOST,
            trimmed => trimmed,
        };
        let label = match label.trim() {
            "" => default_label(port),
            trimmed => trimmed.to_string(),
        };

        let record = ServerRecord::new(self.inner.ids.next_id(), host, label, port, is_secure)?;

        let _gate = self.inner.write_gate.lock().await;
        let snapshot = {
            let mut records = self.write_records();
            records.push(record.clone());
            records.clone()
        };

        debug!("Added server {} ({})", record.id(), record.url());
        self.emit_event(RegistryEvent::Added {
            id: record.id().clone(),
        });

        self.persist(&snapshot).await?;
        Ok(record)
    }

    /// Remove the server with `id`
    ///
    /// Removing an id that is not present is a no-op.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: A server was removed
    /// - `Ok(false)`: No server had this id; nothing was written
    pub async fn remove(&self, id: &ServerId) -> Result<bool> {
        let _gate = self.inner.write_gate.lock().await;

        let snapshot = {
            let mut records = self.write_records();
            let Some(index) = records.iter().position(|r| r.id() == id) else {
                trace!("Remove of unknown server {} ignored", id);
                return Ok(false);
            };
            records.remove(index);
            records.clone()
        };

        debug!("Removed server {}", id);
        self.emit_event(RegistryEvent::Removed { id: id.clone() });

        self.persist(&snapshot).await?;
        Ok(true)
    }

    /// Replace the whole registry
    ///
    /// Servers not present in `records` are discarded. Duplicate ids within
    /// `records` are resolved by giving later duplicates a fresh id.
    pub async fn replace_all(&self, records: Vec<ServerRecord>) -> Result<()> {
        let records = ensure_unique_ids(records, &self.inner.ids);

        let _gate = self.inner.write_gate.lock().await;
        let count = records.len();
        *self.write_records() = records.clone();

        info!("Registry replaced with {} server(s)", count);
        self.emit_event(RegistryEvent::Replaced { count });

        self.persist(&records).await
    }

    /// Snapshot of the registry in display order
    pub fn list(&self) -> Vec<ServerRecord> {
        self.read_records().clone()
    }

    /// The server with `id`, if present
    pub fn get(&self, id: &ServerId) -> Option<ServerRecord> {
        self.read_records().iter().find(|r| r.id() == id).cloned()
    }

    /// Whether a server with `id` is currently registered
    pub fn contains(&self, id: &ServerId) -> bool {
        self.read_records().iter().any(|r| r.id() == id)
    }

    /// Number of registered servers
    pub fn len(&self) -> usize {
        self.read_records().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.read_records().is_empty()
    }

    /// Identifier source shared with bulk import
    pub fn id_generator(&self) -> &IdGenerator {
        &self.inner.ids
    }

    /// Write the durable mirror
    async fn persist(&self, snapshot: &[ServerRecord]) -> Result<()> {
        let value = serde_json::to_value(snapshot)?;

        if let Err(e) = self.inner.port.set(SERVERS_KEY, value).await {
            error!("Failed to persist registry: {}", e);
            self.emit_event(RegistryEvent::PersistFailed {
                error: e.to_string(),
            });
            return Err(e);
        }

        trace!("Persisted {} server(s)", snapshot.len());
        Ok(())
    }

    pub(crate) fn read_records(&self) -> RwLockReadGuard<'_, Vec<ServerRecord>> {
        self.inner
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_records(&self) -> RwLockWriteGuard<'_, Vec<ServerRecord>> {
        self.inner
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Emit a registry event
    fn emit_event(&self, event: RegistryEvent) {
        match self.inner.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Registry event channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                trace!("No registry event listener");
            }
        }
    }
}

/// Make every id in `records` unique
///
/// All integer ids are first reported to `ids`, so fresh ids handed to later
/// duplicates cannot collide with any id in the list.
pub(crate) fn ensure_unique_ids(
    records: Vec<ServerRecord>,
    ids: &IdGenerator,
) -> Vec<ServerRecord> {
    ids.observe_all(records.iter().map(ServerRecord::id));

    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .map(|record| {
            if seen.insert(record.id().clone()) {
                return record;
            }
            let fresh = ids.next_id();
            warn!(
                "Duplicate server id {} for '{}', assigning {}",
                record.id(),
                record.label(),
                fresh
            );
            seen.insert(fresh.clone());
            record.with_id(fresh)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPort;
    use serde_json::json;

    fn store_with(port: MemoryPort) -> (RegistryStore, mpsc::Receiver<RegistryEvent>) {
        RegistryStore::new(Box::new(port))
    }

    #[tokio::test]
    async fn test_load_missing_key_is_empty() {
        let (store, mut events) = store_with(MemoryPort::new());

        assert_eq!(store.load().await.unwrap(), 0);
        assert!(store.is_empty());
        assert_eq!(events.recv().await, Some(RegistryEvent::Loaded { count: 0 }));
    }

    #[tokio::test]
    async fn test_load_rejects_non_list() {
        let port = MemoryPort::with_value(SERVERS_KEY, json!({"host": "a"}));
        let (store, _events) = store_with(port);

        assert!(matches!(store.load().await, Err(Error::Persistence(_))));
    }

    #[tokio::test]
    async fn test_add_applies_defaults() {
        let (store, _events) = store_with(MemoryPort::new());

        let record = store.add("  ", "", "3000", false).await.unwrap();

        assert_eq!(record.host(), "localhost");
        assert_eq!(record.label(), "Port 3000");
        assert_eq!(record.url(), "http://localhost:3000");
    }

    #[tokio::test]
    async fn test_add_persists_whole_list() {
        let port = MemoryPort::new();
        let (store, _events) = store_with(port.clone());

        store.add("localhost", "A", "3000", false).await.unwrap();
        store.add("localhost", "B", "4000", true).await.unwrap();

        let stored = port.get(SERVERS_KEY).await.unwrap().unwrap();
        let labels: Vec<_> = stored
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["label"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(labels, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_ids_unique_for_rapid_adds() {
        let (store, _events) = store_with(MemoryPort::new());

        for port in 1..=50 {
            store.add("", "", &port.to_string(), false).await.unwrap();
        }

        let ids: HashSet<_> = store.list().iter().map(|r| r.id().clone()).collect();
        assert_eq!(ids.len(), 50);
    }

    #[tokio::test]
    async fn test_load_resolves_duplicate_ids() {
        let port = MemoryPort::with_value(
            SERVERS_KEY,
            json!([
                {"id": 5, "host": "a", "label": "A", "port": 1},
                {"id": 5, "host": "b", "label": "B", "port": 2}
            ]),
        );
        let (store, _events) = store_with(port);

        store.load().await.unwrap();

        let records = store.list();
        assert_eq!(records[0].id(), &ServerId::Int(5));
        assert_ne!(records[1].id(), &ServerId::Int(5));
        assert_eq!(records[1].host(), "b");
    }

    #[tokio::test]
    async fn test_events_without_listener_are_ignored() {
        let (store, events) = store_with(MemoryPort::new());
        drop(events);

        assert!(store.add("", "", "80", false).await.is_ok());
    }
}
