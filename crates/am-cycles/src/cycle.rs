use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use am_core::types::CycleKind;

// ---------------------------------------------------------------------------
// CyclePhase
// ---------------------------------------------------------------------------

/// Where a cycle's runner currently is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    /// Registered but never started.
    Idle,
    /// Blocked in the interruptible timed wait.
    Waiting,
    /// Executing its handler.
    Running,
    /// Runner exited.
    Stopped,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Waiting => "waiting",
            CyclePhase::Running => "running",
            CyclePhase::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// CycleShared
// ---------------------------------------------------------------------------

/// Live per-cycle state, shared between the registry and the runner task.
///
/// The registry flips `active` on start/stop; the runner re-checks it after
/// every wake and maintains the phase and run timestamps. Everything here is
/// independently synchronized so neither side ever holds the registry lock
/// while touching it.
#[derive(Debug)]
pub struct CycleShared {
    active: AtomicBool,
    phase: Mutex<CyclePhase>,
    last_run: Mutex<Option<DateTime<Utc>>>,
    next_run: Mutex<Option<DateTime<Utc>>>,
}

impl CycleShared {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            phase: Mutex::new(CyclePhase::Idle),
            last_run: Mutex::new(None),
            next_run: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn phase(&self) -> CyclePhase {
        *self.phase.lock().expect("cycle phase lock poisoned")
    }

    pub(crate) fn set_phase(&self, phase: CyclePhase) {
        *self.phase.lock().expect("cycle phase lock poisoned") = phase;
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        *self.last_run.lock().expect("cycle last_run lock poisoned")
    }

    pub(crate) fn set_last_run(&self, at: DateTime<Utc>) {
        *self.last_run.lock().expect("cycle last_run lock poisoned") = Some(at);
    }

    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        *self.next_run.lock().expect("cycle next_run lock poisoned")
    }

    pub(crate) fn set_next_run(&self, at: DateTime<Utc>) {
        *self.next_run.lock().expect("cycle next_run lock poisoned") = Some(at);
    }
}

impl Default for CycleShared {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// CycleInfo
// ---------------------------------------------------------------------------

/// Serializable point-in-time snapshot of one registered cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleInfo {
    pub id: Uuid,
    pub kind: CycleKind,
    pub interval_secs: u64,
    pub active: bool,
    pub phase: CyclePhase,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
