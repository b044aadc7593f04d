//! Status monitor
//!
//! Runs reachability probes for registered servers and keeps the latest
//! advisory status per server id.
//!
//! ## Correlation
//!
//! Probes are fire-and-forget: each one runs on its own task, and results
//! arrive in any order. A result is keyed by the server id it was issued for,
//! never by position, and is only applied when
//!
//! 1. the id is still present in the [`RegistryStore`], and
//! 2. no newer probe has been issued for the same id since (generation token).
//!
//! Anything else is discarded, so a probe that outlives a deletion cannot
//! bring a status entry back for the deleted server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::model::{ServerId, ServerRecord};
use crate::store::RegistryStore;
use crate::traits::{Reachability, ReachabilityProbe};

/// Advisory status of a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProbeStatus {
    /// No probe result yet
    #[default]
    Unknown,
    /// Something answered
    Online,
    /// The request did not complete
    Offline,
}

impl ProbeStatus {
    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown status",
            Self::Online => "Server accessible",
            Self::Offline => "Server not accessible",
        }
    }
}

impl From<Reachability> for ProbeStatus {
    fn from(reachability: Reachability) -> Self {
        match reachability {
            Reachability::Reachable => Self::Online,
            Reachability::Unreachable => Self::Offline,
        }
    }
}

/// A probe result that was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub id: ServerId,
    pub url: String,
    pub status: ProbeStatus,
}

/// What happened to a single probe result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Result stored and announced
    Applied { id: ServerId, status: ProbeStatus },
    /// A newer probe for the same server was issued in the meantime
    Superseded { id: ServerId },
    /// The server was removed while the probe was in flight
    Removed { id: ServerId },
}

/// Handle to a set of in-flight probes
///
/// Dropping the batch detaches the probes; they still run to completion.
#[derive(Debug)]
pub struct ProbeBatch {
    handles: Vec<JoinHandle<ProbeOutcome>>,
}

impl ProbeBatch {
    /// Number of probes in the batch
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every probe in the batch
    ///
    /// Outcomes are returned in issue order. Probes whose task panicked are
    /// left out.
    pub async fn join(self) -> Vec<ProbeOutcome> {
        let mut outcomes = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => debug!("Probe task did not complete: {}", e),
            }
        }
        outcomes
    }
}

/// Status monitor
///
/// Cheap to clone; all clones share the same status table.
#[derive(Clone)]
pub struct StatusMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    store: RegistryStore,
    probe: Arc<dyn ReachabilityProbe>,
    state: Mutex<MonitorState>,
    update_tx: mpsc::UnboundedSender<StatusUpdate>,
}

#[derive(Default)]
struct MonitorState {
    statuses: HashMap<ServerId, ProbeStatus>,
    /// Generation of the newest probe issued per server
    generations: HashMap<ServerId, u64>,
    next_generation: u64,
}

impl StatusMonitor {
    /// Create a monitor for `store` using `probe`
    ///
    /// # Returns
    ///
    /// A tuple of (monitor, update_receiver) where update_receiver yields
    /// every applied [`StatusUpdate`]
    pub fn new(
        store: RegistryStore,
        probe: Box<dyn ReachabilityProbe>,
    ) -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let monitor = Self {
            inner: Arc::new(MonitorInner {
                store,
                probe: Arc::from(probe),
                state: Mutex::new(MonitorState::default()),
                update_tx: tx,
            }),
        };

        (monitor, rx)
    }

    /// Probe every server in `records` concurrently
    ///
    /// Must be called from within a tokio runtime. Returns immediately.
    pub fn probe_all(&self, records: &[ServerRecord]) -> ProbeBatch {
        let handles = records
            .iter()
            .map(|record| self.spawn_probe(record))
            .collect();

        ProbeBatch { handles }
    }

    /// Probe every server currently in the registry
    pub fn probe_registry(&self) -> ProbeBatch {
        self.probe_all(&self.inner.store.list())
    }

    /// Latest applied status of `id`
    pub fn status(&self, id: &ServerId) -> ProbeStatus {
        let state = self.lock_state();
        if !self.inner.store.contains(id) {
            return ProbeStatus::Unknown;
        }
        state.statuses.get(id).copied().unwrap_or_default()
    }

    /// Snapshot of applied statuses for servers still registered
    pub fn statuses(&self) -> HashMap<ServerId, ProbeStatus> {
        let state = self.lock_state();
        let records = self.inner.store.read_records();
        state
            .statuses
            .iter()
            .filter(|(id, _)| records.iter().any(|r| r.id() == *id))
            .map(|(id, status)| (id.clone(), *status))
            .collect()
    }

    /// Forget statuses of servers that are no longer registered
    pub fn retain_present(&self) {
        let store = &self.inner.store;
        let mut state = self.lock_state();
        state.statuses.retain(|id, _| store.contains(id));
        state.generations.retain(|id, _| store.contains(id));
    }

    fn spawn_probe(&self, record: &ServerRecord) -> JoinHandle<ProbeOutcome> {
        let id = record.id().clone();
        let url = record.url().to_string();
        let generation = self.issue_generation(&id);
        let monitor = self.clone();

        trace!("Probing {} ({}), generation {}", id, url, generation);

        tokio::spawn(async move {
            let reachability = monitor.inner.probe.probe(&url).await;
            monitor.apply(id, url, generation, reachability)
        })
    }

    fn issue_generation(&self, id: &ServerId) -> u64 {
        let mut state = self.lock_state();
        state.next_generation += 1;
        let generation = state.next_generation;
        state.generations.insert(id.clone(), generation);
        generation
    }

    fn apply(
        &self,
        id: ServerId,
        url: String,
        generation: u64,
        reachability: Reachability,
    ) -> ProbeOutcome {
        let mut state = self.lock_state();
        // A removal waits on this guard, so it lands before the check or after the insert.
        let records = self.inner.store.read_records();

        if !records.iter().any(|r| r.id() == &id) {
            debug!("Discarding probe result for removed server {}", id);
            state.statuses.remove(&id);
            state.generations.remove(&id);
            return ProbeOutcome::Removed { id };
        }

        if state.generations.get(&id) != Some(&generation) {
            debug!("Discarding superseded probe result for server {}", id);
            return ProbeOutcome::Superseded { id };
        }

        let status = ProbeStatus::from(reachability);
        state.statuses.insert(id.clone(), status);
        drop(records);
        drop(state);

        debug!(
            "Server {} is {} via {}",
            id,
            status.description(),
            self.inner.probe.probe_name()
        );
        // A closed receiver only means nobody renders updates.
        let _ = self.inner.update_tx.send(StatusUpdate {
            id: id.clone(),
            url,
            status,
        });

        ProbeOutcome::Applied { id, status }
    }

    fn lock_state(&self) -> MutexGuard<'_, MonitorState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPort;
    use async_trait::async_trait;

    /// Reachable iff the port is even
    struct EvenPortProbe;

    #[async_trait]
    impl ReachabilityProbe for EvenPortProbe {
        async fn probe(&self, url: &str) -> Reachability {
            let port: u16 = url.rsplit(':').next().unwrap().parse().unwrap();
            Reachability::from(port % 2 == 0)
        }

        fn probe_name(&self) -> &'static str {
            "even-port"
        }
    }

    async fn setup() -> (RegistryStore, StatusMonitor, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (store, _events) = RegistryStore::new(Box::new(MemoryPort::new()));
        store.add("", "even", "8000", false).await.unwrap();
        store.add("", "odd", "8001", false).await.unwrap();
        let (monitor, updates) = StatusMonitor::new(store.clone(), Box::new(EvenPortProbe));
        (store, monitor, updates)
    }

    #[tokio::test]
    async fn test_statuses_follow_probe() {
        let (store, monitor, mut updates) = setup().await;
        let records = store.list();

        let outcomes = monitor.probe_registry().join().await;
        assert_eq!(outcomes.len(), 2);

        assert_eq!(monitor.status(records[0].id()), ProbeStatus::Online);
        assert_eq!(monitor.status(records[1].id()), ProbeStatus::Offline);

        let mut received = vec![updates.recv().await.unwrap(), updates.recv().await.unwrap()];
        received.sort_by(|a, b| a.url.cmp(&b.url));
        assert_eq!(received[0].url, "http://localhost:8000");
        assert_eq!(received[0].status, ProbeStatus::Online);
    }

    #[tokio::test]
    async fn test_unknown_before_probe() {
        let (store, monitor, _updates) = setup().await;
        let id = store.list()[0].id().clone();

        assert_eq!(monitor.status(&id), ProbeStatus::Unknown);
        assert_eq!(ProbeStatus::Unknown.description(), "Unknown status");
    }

    #[tokio::test]
    async fn test_retain_present_drops_removed() {
        let (store, monitor, _updates) = setup().await;
        monitor.probe_registry().join().await;
        let removed = store.list()[0].id().clone();

        store.remove(&removed).await.unwrap();
        monitor.retain_present();

        assert_eq!(monitor.statuses().len(), 1);
        assert_eq!(monitor.status(&removed), ProbeStatus::Unknown);
    }
}
