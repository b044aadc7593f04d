//! Contract Test: Probe Correlation
//!
//! This test verifies that probe results are keyed by server id and never
//! outlive the server they were issued for.
//!
//! Constraints verified:
//! - Concurrent probes resolve independently, in any order
//! - A result for a removed server is discarded and creates no entry
//! - Only the newest probe per server may set its status
//! - A removal racing a result never leaves a status behind
//!
//! If this test fails, the status view can show stale or phantom entries.

mod common;

use common::*;
use lhm_core::{ProbeOutcome, ProbeStatus, Reachability, StatusMonitor};

#[tokio::test]
async fn concurrent_probes_resolve_independently() {
    let (store, _events) = loaded_store(CountingPort::new()).await;
    let a = store.add("", "a", "3000", false).await.unwrap();
    let b = store.add("", "b", "3001", false).await.unwrap();
    let (probe, gate) = GatedProbe::new();
    let (monitor, mut updates) = StatusMonitor::new(store.clone(), Box::new(probe));

    let batch = monitor.probe_registry();
    assert_eq!(batch.len(), 2);
    gate.wait_pending(a.url(), 1).await;
    gate.wait_pending(b.url(), 1).await;

    // Second server answers first
    gate.release(b.url(), Reachability::Reachable);
    let update = updates.recv().await.unwrap();
    assert_eq!(&update.id, b.id());
    assert_eq!(update.status, ProbeStatus::Online);
    assert_eq!(monitor.status(a.id()), ProbeStatus::Unknown);

    gate.release(a.url(), Reachability::Unreachable);
    let update = updates.recv().await.unwrap();
    assert_eq!(&update.id, a.id());
    assert_eq!(update.status, ProbeStatus::Offline);

    let outcomes = batch.join().await;
    assert_eq!(
        outcomes,
        vec![
            ProbeOutcome::Applied {
                id: a.id().clone(),
                status: ProbeStatus::Offline
            },
            ProbeOutcome::Applied {
                id: b.id().clone(),
                status: ProbeStatus::Online
            },
        ]
    );
    assert_eq!(gate.call_count(), 2);
}

#[tokio::test]
async fn result_for_removed_server_is_discarded() {
    let (store, _events) = loaded_store(CountingPort::new()).await;
    let gone = store.add("", "gone", "4000", false).await.unwrap();
    let kept = store.add("", "kept", "4001", false).await.unwrap();
    let (probe, gate) = GatedProbe::new();
    let (monitor, mut updates) = StatusMonitor::new(store.clone(), Box::new(probe));

    let batch = monitor.probe_registry();
    gate.wait_pending(gone.url(), 1).await;
    gate.wait_pending(kept.url(), 1).await;

    store.remove(gone.id()).await.unwrap();
    gate.release(gone.url(), Reachability::Reachable);
    gate.release(kept.url(), Reachability::Reachable);

    let outcomes = batch.join().await;
    assert_eq!(outcomes[0], ProbeOutcome::Removed { id: gone.id().clone() });
    assert!(matches!(outcomes[1], ProbeOutcome::Applied { .. }));

    let statuses = monitor.statuses();
    assert!(!statuses.contains_key(gone.id()), "no phantom entry");
    assert_eq!(statuses.get(kept.id()), Some(&ProbeStatus::Online));

    let update = updates.try_recv().unwrap();
    assert_eq!(&update.id, kept.id());
    assert!(updates.try_recv().is_err(), "removed server is never announced");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn removal_racing_a_result_leaves_no_status() {
    let (store, _events) = loaded_store(CountingPort::new()).await;
    let (monitor, mut updates) =
        StatusMonitor::new(store.clone(), Box::new(FixedProbe(Reachability::Reachable)));

    for round in 0..100 {
        let server = store
            .add("", &format!("racer {}", round), "7000", false)
            .await
            .unwrap();

        let batch = monitor.probe_registry();
        let remover = {
            let store = store.clone();
            let id = server.id().clone();
            tokio::spawn(async move { store.remove(&id).await })
        };
        let outcomes = batch.join().await;
        assert!(remover.await.unwrap().unwrap());

        assert!(!monitor.statuses().contains_key(server.id()), "round {}", round);
        assert_eq!(monitor.status(server.id()), ProbeStatus::Unknown);

        let announced = std::iter::from_fn(|| updates.try_recv().ok())
            .filter(|update| &update.id == server.id())
            .count();
        match &outcomes[..] {
            [ProbeOutcome::Applied { .. }] => assert_eq!(announced, 1, "round {}", round),
            [ProbeOutcome::Removed { .. }] => assert_eq!(announced, 0, "round {}", round),
            other => panic!("unexpected outcome in round {}: {:?}", round, other),
        }
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn newer_probe_supersedes_older_one() {
    let (store, _events) = loaded_store(CountingPort::new()).await;
    let server = store.add("", "flaky", "5000", false).await.unwrap();
    let (probe, gate) = GatedProbe::new();
    let (monitor, _updates) = StatusMonitor::new(store.clone(), Box::new(probe));

    let first = monitor.probe_registry();
    gate.wait_pending(server.url(), 1).await;
    let second = monitor.probe_registry();
    gate.wait_pending(server.url(), 2).await;

    // The stale probe answers first and must not win
    gate.release(server.url(), Reachability::Reachable);
    assert_eq!(
        first.join().await,
        vec![ProbeOutcome::Superseded {
            id: server.id().clone()
        }]
    );
    assert_eq!(monitor.status(server.id()), ProbeStatus::Unknown);

    gate.release(server.url(), Reachability::Unreachable);
    second.join().await;
    assert_eq!(monitor.status(server.id()), ProbeStatus::Offline);
}

#[tokio::test]
async fn retain_present_forgets_removed_servers() {
    let (store, _events) = loaded_store(CountingPort::new()).await;
    let a = store.add("", "a", "6000", false).await.unwrap();
    let b = store.add("", "b", "6001", false).await.unwrap();
    let (monitor, _updates) =
        StatusMonitor::new(store.clone(), Box::new(FixedProbe(Reachability::Reachable)));

    monitor.probe_registry().join().await;
    assert_eq!(monitor.statuses().len(), 2);

    store.remove(a.id()).await.unwrap();
    monitor.retain_present();

    let statuses = monitor.statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses.get(b.id()), Some(&ProbeStatus::Online));
}

#[tokio::test]
async fn empty_registry_issues_no_probes() {
    let (store, _events) = loaded_store(CountingPort::new()).await;
    let (probe, gate) = GatedProbe::new();
    let (monitor, _updates) = StatusMonitor::new(store, Box::new(probe));

    let batch = monitor.probe_registry();

    assert!(batch.is_empty());
    assert!(batch.join().await.is_empty());
    assert_eq!(gate.call_count(), 0);
}
