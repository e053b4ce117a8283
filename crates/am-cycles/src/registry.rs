use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use am_core::types::CycleKind;

use crate::clock::CancelToken;
use crate::cycle::{CycleInfo, CyclePhase, CycleShared};
use crate::runner::{run_cycle, CycleContext};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("cycle interval must be greater than zero")]
    InvalidInterval,
}

// ---------------------------------------------------------------------------
// Tuning
// ---------------------------------------------------------------------------

/// Default bounded wait for a stopping runner task to exit.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle tuning knobs, injected at construction.
#[derive(Debug, Clone)]
pub struct CycleTuning {
    /// How long `stop` waits for a runner task before giving up on the join.
    pub join_timeout: Duration,
    /// Loop iteration cap for test harnesses. Never set in production.
    pub max_iterations: Option<u64>,
}

impl Default for CycleTuning {
    fn default() -> Self {
        Self {
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            max_iterations: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ManagedCycle
// ---------------------------------------------------------------------------

struct ManagedCycle {
    kind: CycleKind,
    interval: Duration,
    shared: Arc<CycleShared>,
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl ManagedCycle {
    fn info(&self, id: Uuid) -> CycleInfo {
        CycleInfo {
            id,
            kind: self.kind,
            interval_secs: self.interval.as_secs(),
            active: self.shared.is_active(),
            phase: self.shared.phase(),
            last_run: self.shared.last_run(),
            next_run: self.shared.next_run(),
        }
    }
}

// ---------------------------------------------------------------------------
// CycleRegistry
// ---------------------------------------------------------------------------

/// Thread-safe map of every registered cycle and its runner task.
///
/// The registry lock guards map mutation only. Runner loops execute entirely
/// outside it, so a long handler iteration never blocks registration, stop
/// requests, or reconciliation. Misuse (unknown id, double start, double
/// stop) is a logged no-op returning `false`, never an error.
pub struct CycleRegistry {
    cycles: Mutex<HashMap<Uuid, ManagedCycle>>,
    ctx: CycleContext,
    tuning: CycleTuning,
}

impl CycleRegistry {
    pub fn new(ctx: CycleContext) -> Self {
        Self::with_tuning(ctx, CycleTuning::default())
    }

    pub fn with_tuning(ctx: CycleContext, tuning: CycleTuning) -> Self {
        Self {
            cycles: Mutex::new(HashMap::new()),
            ctx,
            tuning,
        }
    }

    /// Create a cycle in the inactive state. Does not start it.
    pub async fn register(
        &self,
        kind: CycleKind,
        interval: Duration,
    ) -> Result<Uuid, RegistryError> {
        if interval.is_zero() {
            return Err(RegistryError::InvalidInterval);
        }
        let id = Uuid::new_v4();
        let managed = ManagedCycle {
            kind,
            interval,
            shared: Arc::new(CycleShared::new()),
            cancel: CancelToken::new(),
            handle: None,
        };
        let mut cycles = self.cycles.lock().await;
        cycles.insert(id, managed);
        info!(
            cycle_id = %id,
            kind = %kind,
            interval_secs = interval.as_secs(),
            "cycle registered"
        );
        Ok(id)
    }

    /// Activate a registered cycle and spawn its runner task.
    pub async fn start(&self, id: Uuid) -> bool {
        let mut cycles = self.cycles.lock().await;
        let Some(cycle) = cycles.get_mut(&id) else {
            warn!(cycle_id = %id, "start requested for unknown cycle");
            return false;
        };
        if cycle.shared.is_active() {
            debug!(cycle_id = %id, kind = %cycle.kind, "cycle already active");
            return false;
        }

        // Fresh token per activation; a previous run's fired token must not
        // poison the new runner.
        cycle.cancel = CancelToken::new();
        cycle.shared.set_active(true);
        cycle.shared.set_phase(CyclePhase::Waiting);
        cycle.shared.set_next_run(Utc::now());

        let handle = tokio::spawn(run_cycle(
            id,
            cycle.kind,
            cycle.interval,
            cycle.shared.clone(),
            cycle.cancel.clone(),
            self.ctx.clone(),
            self.tuning.max_iterations,
        ));
        cycle.handle = Some(handle);
        info!(cycle_id = %id, kind = %cycle.kind, "cycle started");
        true
    }

    /// Deactivate a cycle and wait (bounded) for its runner to exit.
    ///
    /// A join timeout is logged and still returns `true`: the cycle is
    /// deactivated either way, and the runner observes the fired token at
    /// its next check.
    pub async fn stop(&self, id: Uuid) -> bool {
        // Flip state and take the handle under the lock; join outside it.
        let (kind, handle) = {
            let mut cycles = self.cycles.lock().await;
            let Some(cycle) = cycles.get_mut(&id) else {
                warn!(cycle_id = %id, "stop requested for unknown cycle");
                return false;
            };
            if !cycle.shared.is_active() {
                debug!(cycle_id = %id, kind = %cycle.kind, "cycle already inactive");
                return false;
            }
            cycle.shared.set_active(false);
            cycle.cancel.cancel();
            (cycle.kind, cycle.handle.take())
        };

        if let Some(handle) = handle {
            match tokio::time::timeout(self.tuning.join_timeout, handle).await {
                Ok(Ok(())) => debug!(cycle_id = %id, kind = %kind, "cycle runner joined"),
                Ok(Err(e)) => warn!(cycle_id = %id, error = %e, "cycle runner panicked"),
                Err(_) => warn!(
                    cycle_id = %id,
                    kind = %kind,
                    timeout_secs = self.tuning.join_timeout.as_secs(),
                    "cycle runner did not exit within the join timeout"
                ),
            }
        }
        info!(cycle_id = %id, kind = %kind, "cycle stopped");
        true
    }

    /// Start every registered cycle. Returns how many actually started.
    pub async fn start_all(&self) -> usize {
        let ids: Vec<Uuid> = self.cycles.lock().await.keys().copied().collect();
        let mut started = 0;
        for id in ids {
            if self.start(id).await {
                started += 1;
            }
        }
        debug!(started, "start_all complete");
        started
    }

    /// Stop every registered cycle. Returns how many actually stopped.
    pub async fn stop_all(&self) -> usize {
        let ids: Vec<Uuid> = self.cycles.lock().await.keys().copied().collect();
        let mut stopped = 0;
        for id in ids {
            if self.stop(id).await {
                stopped += 1;
            }
        }
        debug!(stopped, "stop_all complete");
        stopped
    }

    pub async fn is_active(&self, id: Uuid) -> bool {
        let cycles = self.cycles.lock().await;
        cycles.get(&id).map(|c| c.shared.is_active()).unwrap_or(false)
    }

    pub async fn get(&self, id: Uuid) -> Option<CycleInfo> {
        let cycles = self.cycles.lock().await;
        cycles.get(&id).map(|c| c.info(id))
    }

    /// Snapshot of every registered cycle, ordered by kind for stable output.
    pub async fn list(&self) -> Vec<CycleInfo> {
        let cycles = self.cycles.lock().await;
        let mut infos: Vec<CycleInfo> = cycles.iter().map(|(id, c)| c.info(*id)).collect();
        infos.sort_by_key(|info| info.kind.as_str());
        infos
    }

    pub async fn count(&self) -> usize {
        self.cycles.lock().await.len()
    }

    /// The registered cycle of `kind`, if any. Reconciliation keeps at most
    /// one cycle per kind.
    pub async fn find_by_kind(&self, kind: CycleKind) -> Option<Uuid> {
        let cycles = self.cycles.lock().await;
        cycles.iter().find(|(_, c)| c.kind == kind).map(|(id, _)| *id)
    }

    /// Replace a cycle's interval. Takes effect the next time it starts.
    pub async fn set_interval(&self, id: Uuid, interval: Duration) -> bool {
        if interval.is_zero() {
            warn!(cycle_id = %id, "refusing zero interval");
            return false;
        }
        let mut cycles = self.cycles.lock().await;
        match cycles.get_mut(&id) {
            Some(cycle) => {
                cycle.interval = interval;
                true
            }
            None => false,
        }
    }

    /// Drop a cycle from the registry. Callers stop it first; reconciliation
    /// is the expected caller.
    pub async fn remove(&self, id: Uuid) -> bool {
        let mut cycles = self.cycles.lock().await;
        match cycles.remove(&id) {
            Some(cycle) => {
                info!(cycle_id = %id, kind = %cycle.kind, "cycle removed");
                true
            }
            None => false,
        }
    }
}
