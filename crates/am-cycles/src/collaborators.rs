use std::sync::Arc;

use async_trait::async_trait;

use am_core::types::{
    ApprovalRecord, BackupEntry, Event, EventSummary, PatchOutcome, Proposal, RouterStatus,
};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors surfaced by collaborator calls.
///
/// Collaborators are external components; any call may fail. The orchestrator
/// never crashes on one of these: handlers log, skip the affected work, and
/// the cycle proceeds to its next scheduled wait.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The collaborator could not be reached at all.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    /// The collaborator answered but the operation failed.
    #[error("{0}")]
    Failed(String),
}

pub type CollabResult<T> = std::result::Result<T, CollaboratorError>;

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// Source of problem observations. The error-detection cycle drains it.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Up to `limit` pending events, oldest first.
    async fn get_pending_events(&self, limit: usize) -> CollabResult<Vec<Event>>;

    /// Drop the pending set after a batch has been fully processed.
    async fn clear_events(&self) -> CollabResult<()>;

    async fn get_event_summary(&self) -> CollabResult<EventSummary>;
}

/// Turns one event into zero or more fix proposals.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze_error(&self, event: &Event) -> CollabResult<Vec<Proposal>>;
}

/// Queues proposals between the detection and application cycles and owns
/// their disposition (including proposals the orchestrator skips).
#[async_trait]
pub trait Router: Send + Sync {
    /// Pending proposals in arrival order.
    async fn get_pending_proposals(&self) -> CollabResult<Vec<Proposal>>;

    async fn deliver(&self, proposal: Proposal) -> CollabResult<()>;

    /// Report the executor's verdict on a proposal back to the router.
    async fn record_resolution_outcome(&self, outcome: &PatchOutcome) -> CollabResult<()>;

    async fn get_router_status(&self) -> CollabResult<RouterStatus>;
}

/// Approval policy bookkeeping.
#[async_trait]
pub trait Guardrails: Send + Sync {
    async fn get_approval_history(&self) -> CollabResult<Vec<ApprovalRecord>>;

    async fn clear_approval_history(&self) -> CollabResult<()>;
}

/// Materializes proposals as actual changes, with backup support.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn apply_patch(&self, proposal: &Proposal) -> CollabResult<PatchOutcome>;

    /// Prune backups older than `retention_days`. Returns how many went.
    async fn cleanup_old_backups(&self, retention_days: u32) -> CollabResult<usize>;

    async fn get_backup_list(&self) -> CollabResult<Vec<BackupEntry>>;
}

/// Best-effort startup handshake with a surrounding system (self-improvement
/// hub, IDE feedback channel). A failed handshake is logged, never fatal.
#[async_trait]
pub trait Integration: Send + Sync {
    fn name(&self) -> &str;

    async fn handshake(&self) -> CollabResult<()>;
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// One handle per contract, shared with every cycle runner.
#[derive(Clone)]
pub struct Collaborators {
    pub collector: Arc<dyn Collector>,
    pub analyzer: Arc<dyn Analyzer>,
    pub router: Arc<dyn Router>,
    pub guardrails: Arc<dyn Guardrails>,
    pub executor: Arc<dyn Executor>,
}

impl Collaborators {
    pub fn new(
        collector: Arc<dyn Collector>,
        analyzer: Arc<dyn Analyzer>,
        router: Arc<dyn Router>,
        guardrails: Arc<dyn Guardrails>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            collector,
            analyzer,
            router,
            guardrails,
            executor,
        }
    }
}
