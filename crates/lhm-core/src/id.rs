// # Identifier Generation
//
// Server ids are integers taken from a monotonic counter that starts at the
// wall clock in milliseconds. Each call returns `max(now_ms, last + 1)`, so
// two records created in the same millisecond (a bulk import does this
// routinely) still get distinct ids.
//
// The generator is told about every integer id already present in the
// registry (`observe`), which keeps fresh ids from colliding with loaded or
// imported ones.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::ServerId;

/// Monotonic, clock-seeded id generator
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    /// Create a generator that has not issued any id yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh id
    pub fn next_id(&self) -> ServerId {
        let now = now_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);

        ServerId::Int(now.max(previous.saturating_add(1)))
    }

    /// Record an id that exists elsewhere so it is never issued again
    pub fn observe(&self, id: &ServerId) {
        if let Some(int) = id.as_int() {
            self.last.fetch_max(int, Ordering::SeqCst);
        }
    }

    /// Observe every id in `ids`
    pub fn observe_all<'a>(&self, ids: impl IntoIterator<Item = &'a ServerId>) {
        for id in ids {
            self.observe(id);
        }
    }
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
