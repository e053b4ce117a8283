//! In-memory collaborator backend.
//!
//! Gives the daemon a fully working standalone mode with no external
//! services attached: events are seeded programmatically, proposals come
//! from a severity heuristic, and patches are "applied" as backup entries.
//! Tests lean on the same types as a realistic fixture.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, info};

use am_core::types::{
    ApprovalRecord, BackupEntry, Event, EventSeverity, EventSummary, PatchOutcome, Proposal,
    RouterStatus,
};
use am_cycles::collaborators::{
    Analyzer, CollabResult, Collector, Executor, Guardrails, Integration, Router,
};

// ---------------------------------------------------------------------------
// InMemoryCollector
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CollectorState {
    pending: Vec<Event>,
    total_collected: u64,
    cleared: u64,
}

/// Collector holding seeded events until a cycle drains them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCollector {
    state: Arc<Mutex<CollectorState>>,
}

impl InMemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for the next error-detection cycle.
    pub fn record(&self, event: Event) {
        let mut state = self.state.lock().expect("collector lock poisoned");
        state.total_collected += 1;
        state.pending.push(event);
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().expect("collector lock poisoned").pending.len()
    }
}

#[async_trait]
impl Collector for InMemoryCollector {
    async fn get_pending_events(&self, limit: usize) -> CollabResult<Vec<Event>> {
        let state = self.state.lock().expect("collector lock poisoned");
        Ok(state.pending.iter().take(limit).cloned().collect())
    }

    async fn clear_events(&self) -> CollabResult<()> {
        let mut state = self.state.lock().expect("collector lock poisoned");
        state.cleared += state.pending.len() as u64;
        state.pending.clear();
        Ok(())
    }

    async fn get_event_summary(&self) -> CollabResult<EventSummary> {
        let state = self.state.lock().expect("collector lock poisoned");
        Ok(EventSummary {
            pending: state.pending.len(),
            total_collected: state.total_collected,
            cleared: state.cleared,
        })
    }
}

// ---------------------------------------------------------------------------
// HeuristicAnalyzer
// ---------------------------------------------------------------------------

/// Stateless analyzer that grades confidence off the event severity.
///
/// Severe events get confident proposals (they tend to have obvious causes
/// worth auto-applying); informational noise stays below any sane threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicAnalyzer;

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn confidence_for(severity: EventSeverity) -> f64 {
        match severity {
            EventSeverity::Critical => 0.95,
            EventSeverity::Error => 0.85,
            EventSeverity::Warning => 0.6,
            EventSeverity::Info => 0.3,
        }
    }
}

#[async_trait]
impl Analyzer for HeuristicAnalyzer {
    async fn analyze_error(&self, event: &Event) -> CollabResult<Vec<Proposal>> {
        let confidence = Self::confidence_for(event.severity);
        let proposal = Proposal::for_event(
            event.id,
            format!("remediate {}: {}", event.source, event.message),
            confidence,
        );
        debug!(event_id = %event.id, confidence, "heuristic proposal generated");
        Ok(vec![proposal])
    }
}

// ---------------------------------------------------------------------------
// InMemoryRouter
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RouterState {
    pending: Vec<Proposal>,
    delivered: u64,
    resolutions: Vec<PatchOutcome>,
}

/// Router queueing proposals between the detection and application cycles.
///
/// A recorded resolution retires the proposal from the pending queue;
/// skipped proposals stay queued for a later cycle or manual review.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRouter {
    state: Arc<Mutex<RouterState>>,
}

impl InMemoryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolutions(&self) -> Vec<PatchOutcome> {
        self.state.lock().expect("router lock poisoned").resolutions.clone()
    }
}

#[async_trait]
impl Router for InMemoryRouter {
    async fn get_pending_proposals(&self) -> CollabResult<Vec<Proposal>> {
        let state = self.state.lock().expect("router lock poisoned");
        Ok(state.pending.clone())
    }

    async fn deliver(&self, proposal: Proposal) -> CollabResult<()> {
        let mut state = self.state.lock().expect("router lock poisoned");
        state.delivered += 1;
        state.pending.push(proposal);
        Ok(())
    }

    async fn record_resolution_outcome(&self, outcome: &PatchOutcome) -> CollabResult<()> {
        let mut state = self.state.lock().expect("router lock poisoned");
        state.pending.retain(|p| p.id != outcome.proposal_id);
        state.resolutions.push(outcome.clone());
        Ok(())
    }

    async fn get_router_status(&self) -> CollabResult<RouterStatus> {
        let state = self.state.lock().expect("router lock poisoned");
        Ok(RouterStatus {
            pending: state.pending.len(),
            delivered: state.delivered,
            resolutions_recorded: state.resolutions.len() as u64,
        })
    }
}

// ---------------------------------------------------------------------------
// InMemoryGuardrails
// ---------------------------------------------------------------------------

/// Approval ledger for patches that needed a human call.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGuardrails {
    history: Arc<Mutex<Vec<ApprovalRecord>>>,
}

impl InMemoryGuardrails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_approval(&self, record: ApprovalRecord) {
        self.history.lock().expect("guardrails lock poisoned").push(record);
    }
}

#[async_trait]
impl Guardrails for InMemoryGuardrails {
    async fn get_approval_history(&self) -> CollabResult<Vec<ApprovalRecord>> {
        Ok(self.history.lock().expect("guardrails lock poisoned").clone())
    }

    async fn clear_approval_history(&self) -> CollabResult<()> {
        self.history.lock().expect("guardrails lock poisoned").clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InMemoryExecutor
// ---------------------------------------------------------------------------

/// Executor that applies every patch it is handed, leaving one backup entry
/// per apply so the optimization cycle has something real to prune.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExecutor {
    backups: Arc<Mutex<Vec<BackupEntry>>>,
}

impl InMemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backup_count(&self) -> usize {
        self.backups.lock().expect("executor lock poisoned").len()
    }

    /// Insert a backup entry directly, for seeding retention scenarios.
    pub fn seed_backup(&self, entry: BackupEntry) {
        self.backups.lock().expect("executor lock poisoned").push(entry);
    }
}

#[async_trait]
impl Executor for InMemoryExecutor {
    async fn apply_patch(&self, proposal: &Proposal) -> CollabResult<PatchOutcome> {
        let entry = BackupEntry {
            path: format!("backups/{}.bak", proposal.id),
            created_at: Utc::now(),
        };
        self.backups.lock().expect("executor lock poisoned").push(entry);
        Ok(PatchOutcome::applied(proposal.id, proposal.summary.clone()))
    }

    async fn cleanup_old_backups(&self, retention_days: u32) -> CollabResult<usize> {
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        let mut backups = self.backups.lock().expect("executor lock poisoned");
        let before = backups.len();
        backups.retain(|b| b.created_at >= cutoff);
        Ok(before - backups.len())
    }

    async fn get_backup_list(&self) -> CollabResult<Vec<BackupEntry>> {
        Ok(self.backups.lock().expect("executor lock poisoned").clone())
    }
}

// ---------------------------------------------------------------------------
// LoggingIntegration
// ---------------------------------------------------------------------------

/// Stand-in integration client: the handshake just announces itself.
/// Real deployments swap in clients that reach the actual endpoints.
#[derive(Debug, Clone)]
pub struct LoggingIntegration {
    name: String,
}

impl LoggingIntegration {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Integration for LoggingIntegration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handshake(&self) -> CollabResult<()> {
        info!(integration = %self.name, "handshake acknowledged locally");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
