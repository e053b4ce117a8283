use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use am_core::types::StatsSnapshot;

/// Process-wide orchestrator counters, incremented concurrently by every
/// cycle runner. Counters are monotonic; only `last_cycle_time` is replaced.
#[derive(Debug, Default)]
pub struct CycleStats {
    cycles_completed: AtomicU64,
    patches_applied: AtomicU64,
    errors_detected: AtomicU64,
    last_cycle_time: Mutex<Option<DateTime<Utc>>>,
}

impl CycleStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// One iteration finished (successfully or not).
    pub fn record_cycle_completed(&self, at: DateTime<Utc>) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        *self
            .last_cycle_time
            .lock()
            .expect("last_cycle_time lock poisoned") = Some(at);
    }

    pub fn add_patches_applied(&self, count: u64) {
        if count > 0 {
            self.patches_applied.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn add_errors_detected(&self, count: u64) {
        if count > 0 {
            self.errors_detected.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            patches_applied: self.patches_applied.load(Ordering::Relaxed),
            errors_detected: self.errors_detected.load(Ordering::Relaxed),
            last_cycle_time: *self
                .last_cycle_time
                .lock()
                .expect("last_cycle_time lock poisoned"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
