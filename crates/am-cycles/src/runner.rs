use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info};
use uuid::Uuid;

use am_core::config::Config;
use am_core::types::{CycleKind, CycleReport};

use crate::clock::{CancelToken, CycleClock, WaitOutcome};
use crate::collaborators::Collaborators;
use crate::cycle::{CyclePhase, CycleShared};
use crate::handlers;
use crate::observer::ReportBus;
use crate::stats::CycleStats;

// ---------------------------------------------------------------------------
// CycleContext
// ---------------------------------------------------------------------------

/// Everything a runner needs besides its own cycle state: collaborator
/// handles, the shared counters, the observer bus, and the config snapshot
/// channel.
#[derive(Clone)]
pub struct CycleContext {
    pub collaborators: Collaborators,
    pub stats: Arc<CycleStats>,
    pub reports: ReportBus,
    pub config: watch::Receiver<Arc<Config>>,
}

impl CycleContext {
    pub fn new(
        collaborators: Collaborators,
        stats: Arc<CycleStats>,
        reports: ReportBus,
        config: watch::Receiver<Arc<Config>>,
    ) -> Self {
        Self { collaborators, stats, reports, config }
    }
}

// ---------------------------------------------------------------------------
// Runner loop
// ---------------------------------------------------------------------------

/// Drive one cycle: wait out the interval, re-check liveness, dispatch the
/// handler, record timing, publish a report. Repeats until cancelled.
///
/// A handler error marks the iteration failed but still counts it as
/// completed; the loop itself never dies to a handler failure.
/// `max_iterations` bounds the loop for test harnesses; production passes
/// `None` and the loop runs until the cancel token fires.
pub(crate) async fn run_cycle(
    id: Uuid,
    kind: CycleKind,
    interval: Duration,
    shared: Arc<CycleShared>,
    cancel: CancelToken,
    ctx: CycleContext,
    max_iterations: Option<u64>,
) {
    let clock = CycleClock::new(interval);
    let mut iterations: u64 = 0;
    info!(
        cycle_id = %id,
        kind = %kind,
        interval_secs = interval.as_secs(),
        "cycle runner started"
    );

    loop {
        if let Some(cap) = max_iterations {
            if iterations >= cap {
                debug!(cycle_id = %id, iterations, "iteration cap reached");
                break;
            }
        }

        shared.set_phase(CyclePhase::Waiting);
        if clock.wait(&cancel).await == WaitOutcome::Cancelled {
            info!(cycle_id = %id, kind = %kind, "cancelled during wait");
            break;
        }
        // Closes the race where a stop lands right as the timer fires.
        if !shared.is_active() {
            debug!(cycle_id = %id, "deactivated between wake and dispatch");
            break;
        }

        shared.set_phase(CyclePhase::Running);
        let started_at = Utc::now();
        let timer = std::time::Instant::now();
        let config = ctx.config.borrow().clone();

        let mut iteration_error = None;
        match handlers::run(kind, &ctx.collaborators, &config, &cancel).await {
            Ok(outcome) => {
                ctx.stats.add_errors_detected(outcome.events_processed);
                ctx.stats.add_patches_applied(outcome.patches_applied);
                debug!(
                    cycle_id = %id,
                    kind = %kind,
                    events = outcome.events_processed,
                    delivered = outcome.proposals_delivered,
                    applied = outcome.patches_applied,
                    skipped = outcome.proposals_skipped,
                    "cycle iteration complete"
                );
            }
            Err(e) => {
                error!(cycle_id = %id, kind = %kind, error = %e, "cycle handler failed");
                iteration_error = Some(e.to_string());
            }
        }

        shared.set_last_run(started_at);
        shared.set_next_run(
            started_at + chrono::Duration::milliseconds(interval.as_millis() as i64),
        );
        ctx.stats.record_cycle_completed(Utc::now());

        ctx.reports.publish(CycleReport {
            cycle_id: id,
            kind,
            started_at,
            duration_ms: timer.elapsed().as_millis() as u64,
            stats: ctx.stats.snapshot(),
            error: iteration_error,
        });

        iterations += 1;
    }

    shared.set_phase(CyclePhase::Stopped);
    info!(cycle_id = %id, kind = %kind, "cycle runner exited");
}
