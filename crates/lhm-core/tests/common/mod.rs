//! Test doubles and common utilities for registry contract tests
//!
//! This module provides minimal test doubles for the registry's external
//! collaborators: a persistence port that counts (and can stall or fail)
//! writes, and a reachability probe whose answers the test releases by hand.

#![allow(dead_code)]

use async_trait::async_trait;
use lhm_core::error::{Error, Result};
use lhm_core::traits::{PersistencePort, Reachability, ReachabilityProbe};
use lhm_core::{MemoryPort, RegistryEvent, RegistryStore};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc, oneshot};

/// A persistence port that tracks calls
///
/// Writes can be made to fail, or to stall until the test releases them.
#[derive(Clone)]
pub struct CountingPort {
    inner: MemoryPort,
    get_call_count: Arc<AtomicUsize>,
    set_call_count: Arc<AtomicUsize>,
    fail_sets: Arc<AtomicBool>,
    /// When present, every set waits for one permit
    gate: Option<Arc<Semaphore>>,
}

impl CountingPort {
    pub fn new() -> Self {
        Self::wrapping(MemoryPort::new())
    }

    /// Count calls on top of an existing memory port
    pub fn wrapping(inner: MemoryPort) -> Self {
        Self {
            inner,
            get_call_count: Arc::new(AtomicUsize::new(0)),
            set_call_count: Arc::new(AtomicUsize::new(0)),
            fail_sets: Arc::new(AtomicBool::new(false)),
            gate: None,
        }
    }

    /// A port whose writes stall until [`CountingPort::release_set`]
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new()
        }
    }

    /// Let one stalled write through
    pub fn release_set(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Make subsequent writes fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.fail_sets.store(failing, Ordering::SeqCst);
    }

    /// Get the number of times get() was called
    pub fn get_call_count(&self) -> usize {
        self.get_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times set() was called
    pub fn set_call_count(&self) -> usize {
        self.set_call_count.load(Ordering::SeqCst)
    }

    /// The value the registry last wrote, parsed back into labels
    pub async fn stored_labels(&self) -> Vec<String> {
        match self.inner.get(lhm_core::traits::SERVERS_KEY).await.unwrap() {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item["label"].as_str().unwrap_or_default().to_string())
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl PersistencePort for CountingPort {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.get_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.set_call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .expect("gate semaphore is never closed")
                .forget();
        }

        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(Error::persistence("simulated write failure"));
        }

        self.inner.set(key, value).await
    }

    fn port_name(&self) -> &'static str {
        "counting"
    }
}

/// A probe that answers only when the test says so
///
/// Each call registers a pending answer for its URL; [`ProbeGate::release`]
/// resolves the oldest pending call for that URL.
pub struct GatedProbe {
    pending: Arc<std::sync::Mutex<HashMap<String, VecDeque<oneshot::Sender<Reachability>>>>>,
    calls: Arc<AtomicUsize>,
}

/// Test-side handle of a [`GatedProbe`]
#[derive(Clone)]
pub struct ProbeGate {
    pending: Arc<std::sync::Mutex<HashMap<String, VecDeque<oneshot::Sender<Reachability>>>>>,
    calls: Arc<AtomicUsize>,
}

impl GatedProbe {
    pub fn new() -> (Self, ProbeGate) {
        let pending = Arc::new(std::sync::Mutex::new(HashMap::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let probe = Self {
            pending: Arc::clone(&pending),
            calls: Arc::clone(&calls),
        };
        (probe, ProbeGate { pending, calls })
    }
}

#[async_trait]
impl ReachabilityProbe for GatedProbe {
    async fn probe(&self, url: &str) -> Reachability {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(tx);

        // A dropped gate counts as a failed request.
        rx.await.unwrap_or(Reachability::Unreachable)
    }

    fn probe_name(&self) -> &'static str {
        "gated"
    }
}

impl ProbeGate {
    /// Number of probe calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of unanswered probes for `url`
    pub fn pending_for(&self, url: &str) -> usize {
        self.pending
            .lock()
            .unwrap()
            .get(url)
            .map_or(0, VecDeque::len)
    }

    /// Wait until `count` probes for `url` are in flight
    pub async fn wait_pending(&self, url: &str, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.pending_for(url) < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("probes should be issued within 5s");
    }

    /// Answer the oldest pending probe for `url`
    pub fn release(&self, url: &str, reachability: Reachability) {
        let sender = self
            .pending
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .expect("a pending probe for this url");
        let _ = sender.send(reachability);
    }
}

/// A probe that answers immediately with a fixed result
pub struct FixedProbe(pub Reachability);

#[async_trait]
impl ReachabilityProbe for FixedProbe {
    async fn probe(&self, _url: &str) -> Reachability {
        self.0
    }

    fn probe_name(&self) -> &'static str {
        "fixed"
    }
}

/// Create a store over `port`, already loaded
pub async fn loaded_store(port: CountingPort) -> (RegistryStore, mpsc::Receiver<RegistryEvent>) {
    let (store, events) = RegistryStore::new(Box::new(port));
    store.load().await.expect("load succeeds");
    (store, events)
}

/// Drain all events currently queued
pub fn drain_events(events: &mut mpsc::Receiver<RegistryEvent>) -> Vec<RegistryEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
