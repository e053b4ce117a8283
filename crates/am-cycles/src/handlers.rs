use tracing::{debug, warn};

use am_core::config::Config;
use am_core::types::CycleKind;

use crate::clock::CancelToken;
use crate::collaborators::{CollaboratorError, Collaborators};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// A handler failure that aborted the iteration's work.
///
/// Only front-door collaborator calls (fetching the batch) abort; per-item
/// failures are logged inside the handler and the batch continues.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

pub type Result<T> = std::result::Result<T, HandlerError>;

// ---------------------------------------------------------------------------
// HandlerReport
// ---------------------------------------------------------------------------

/// Stats delta produced by one handler invocation. The runner folds this
/// into the process-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerReport {
    pub events_processed: u64,
    pub proposals_delivered: u64,
    pub patches_applied: u64,
    pub proposals_skipped: u64,
    pub backups_pruned: u64,
    /// True when the batch stopped early because the cancel token fired.
    pub cancelled: bool,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run one iteration of the handler for `kind`.
pub async fn run(
    kind: CycleKind,
    collab: &Collaborators,
    config: &Config,
    cancel: &CancelToken,
) -> Result<HandlerReport> {
    match kind {
        CycleKind::ErrorDetection => error_detection(collab, config, cancel).await,
        CycleKind::PatchApplication => patch_application(collab, config, cancel).await,
        CycleKind::SystemOptimization => system_optimization(collab, config).await,
    }
}

// ---------------------------------------------------------------------------
// error_detection
// ---------------------------------------------------------------------------

/// Drain pending events, analyze each, and route the resulting proposals.
///
/// Events are processed strictly in collector order. A cancel fired
/// mid-batch stops the batch early and leaves the collector's pending set
/// uncleared, so the full set is retried next cycle.
async fn error_detection(
    collab: &Collaborators,
    config: &Config,
    cancel: &CancelToken,
) -> Result<HandlerReport> {
    let limit = config.cycles.error_detection.max_events_per_cycle;
    let events = collab.collector.get_pending_events(limit).await?;
    if events.is_empty() {
        debug!("no pending events");
        return Ok(HandlerReport::default());
    }

    let mut report = HandlerReport::default();
    for event in &events {
        if cancel.is_cancelled() {
            debug!(
                processed = report.events_processed,
                total = events.len(),
                "cancelled mid-batch, leaving events for the next cycle"
            );
            report.cancelled = true;
            return Ok(report);
        }
        match collab.analyzer.analyze_error(event).await {
            Ok(proposals) => {
                for proposal in proposals {
                    let proposal_id = proposal.id;
                    match collab.router.deliver(proposal).await {
                        Ok(()) => report.proposals_delivered += 1,
                        Err(e) => warn!(
                            event_id = %event.id,
                            proposal_id = %proposal_id,
                            error = %e,
                            "proposal delivery failed"
                        ),
                    }
                }
            }
            Err(e) => warn!(event_id = %event.id, error = %e, "analysis failed"),
        }
        report.events_processed += 1;
    }

    if let Err(e) = collab.collector.clear_events().await {
        warn!(error = %e, "failed to clear processed events");
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// patch_application
// ---------------------------------------------------------------------------

/// Apply routed proposals that clear the auto-apply confidence bar.
///
/// Proposals run strictly in arrival order; one failed patch never aborts
/// the remaining candidates. Below-threshold proposals are skipped, not
/// discarded: their disposition stays with the router.
async fn patch_application(
    collab: &Collaborators,
    config: &Config,
    cancel: &CancelToken,
) -> Result<HandlerReport> {
    let settings = &config.cycles.patch_application;
    let mut proposals = collab.router.get_pending_proposals().await?;
    if proposals.is_empty() {
        debug!("no pending proposals");
        return Ok(HandlerReport::default());
    }
    proposals.truncate(settings.max_patches_per_cycle);

    let mut report = HandlerReport::default();
    for proposal in &proposals {
        if cancel.is_cancelled() {
            debug!(
                applied = report.patches_applied,
                "cancelled mid-batch, leaving remaining proposals queued"
            );
            report.cancelled = true;
            return Ok(report);
        }
        if proposal.confidence < settings.auto_apply_threshold {
            debug!(
                proposal_id = %proposal.id,
                confidence = proposal.confidence,
                threshold = settings.auto_apply_threshold,
                "below auto-apply threshold, skipping"
            );
            report.proposals_skipped += 1;
            continue;
        }
        match collab.executor.apply_patch(proposal).await {
            Ok(outcome) => {
                if outcome.applied {
                    report.patches_applied += 1;
                }
                if let Err(e) = collab.router.record_resolution_outcome(&outcome).await {
                    warn!(
                        proposal_id = %proposal.id,
                        error = %e,
                        "failed to record resolution outcome"
                    );
                }
            }
            Err(e) => {
                warn!(proposal_id = %proposal.id, error = %e, "patch application failed");
            }
        }
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// system_optimization
// ---------------------------------------------------------------------------

/// Fire-and-forget maintenance: prune aged backups, reset approval history.
/// Failures are logged and never escalate to a cycle failure.
async fn system_optimization(collab: &Collaborators, config: &Config) -> Result<HandlerReport> {
    let retention_days = config.cycles.system_optimization.backup_retention_days;
    let mut report = HandlerReport::default();

    match collab.executor.cleanup_old_backups(retention_days).await {
        Ok(removed) => {
            report.backups_pruned = removed as u64;
            debug!(removed, retention_days, "pruned old backups");
        }
        Err(e) => warn!(error = %e, "backup cleanup failed"),
    }

    if let Err(e) = collab.guardrails.clear_approval_history().await {
        warn!(error = %e, "approval history clear failed");
    }

    Ok(report)
}
