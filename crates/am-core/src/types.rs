use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// CycleKind
// ---------------------------------------------------------------------------

/// The closed set of improvement cycles the orchestrator knows how to run.
///
/// Dispatch is a `match` over this enum; an unknown kind is unrepresentable,
/// so a cycle can never be registered without a handler to serve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    /// Drain pending error events, analyze them, and route fix proposals.
    ErrorDetection,
    /// Apply routed proposals that clear the auto-apply confidence bar.
    PatchApplication,
    /// Periodic housekeeping: prune old backups, reset approval history.
    SystemOptimization,
}

impl CycleKind {
    /// Every kind, in scheduling order. Reconciliation iterates this.
    pub const ALL: [CycleKind; 3] = [
        CycleKind::ErrorDetection,
        CycleKind::PatchApplication,
        CycleKind::SystemOptimization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CycleKind::ErrorDetection => "error_detection",
            CycleKind::PatchApplication => "patch_application",
            CycleKind::SystemOptimization => "system_optimization",
        }
    }
}

impl std::fmt::Display for CycleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// A problem observation pulled from the collector, fed to the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    /// Subsystem or component the event originated from.
    pub source: String,
    pub severity: EventSeverity,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
    /// Collector-specific payload (stack trace, offending input, ...).
    pub details: Option<serde_json::Value>,
}

impl Event {
    pub fn new(source: impl Into<String>, severity: EventSeverity, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            severity,
            message: message.into(),
            occurred_at: Utc::now(),
            details: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Proposal
// ---------------------------------------------------------------------------

/// A candidate fix produced by the analyzer and queued on the router.
///
/// `confidence` is the analyzer's self-assessment in `[0, 1]`; the
/// patch-application cycle only auto-applies proposals at or above the
/// configured threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    /// Event that motivated this proposal, when there is one.
    pub event_id: Option<Uuid>,
    pub summary: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl Proposal {
    pub fn new(summary: impl Into<String>, confidence: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id: None,
            summary: summary.into(),
            confidence,
            created_at: Utc::now(),
        }
    }

    pub fn for_event(event_id: Uuid, summary: impl Into<String>, confidence: f64) -> Self {
        Self {
            event_id: Some(event_id),
            ..Self::new(summary, confidence)
        }
    }
}

// ---------------------------------------------------------------------------
// Patch outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Applied,
    Skipped,
    Failed,
    RolledBack,
}

impl std::fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResolutionStatus::Applied => "applied",
            ResolutionStatus::Skipped => "skipped",
            ResolutionStatus::Failed => "failed",
            ResolutionStatus::RolledBack => "rolled_back",
        };
        f.write_str(s)
    }
}

/// The executor's verdict on one proposal, reported back to the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchOutcome {
    pub proposal_id: Uuid,
    pub applied: bool,
    pub status: ResolutionStatus,
    pub details: String,
    pub error: Option<String>,
}

impl PatchOutcome {
    pub fn applied(proposal_id: Uuid, details: impl Into<String>) -> Self {
        Self {
            proposal_id,
            applied: true,
            status: ResolutionStatus::Applied,
            details: details.into(),
            error: None,
        }
    }

    pub fn failed(proposal_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            proposal_id,
            applied: false,
            status: ResolutionStatus::Failed,
            details: String::new(),
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Guardrails / executor records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub proposal_id: Uuid,
    pub approved: bool,
    pub reason: String,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    pub path: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Collaborator summaries
// ---------------------------------------------------------------------------

/// Point-in-time collector state, merged into the orchestrator status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub pending: usize,
    pub total_collected: u64,
    pub cleared: u64,
}

/// Point-in-time router state, merged into the orchestrator status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterStatus {
    pub pending: usize,
    pub delivered: u64,
    pub resolutions_recorded: u64,
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Monotonic orchestrator counters at one point in time.
///
/// Counters only ever increase for the life of the process; `last_cycle_time`
/// is the completion timestamp of the most recent iteration across all cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub cycles_completed: u64,
    pub patches_applied: u64,
    pub errors_detected: u64,
    pub last_cycle_time: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// CycleReport
// ---------------------------------------------------------------------------

/// Per-iteration observer notification. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub kind: CycleKind,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Counters as of the end of this iteration.
    pub stats: StatsSnapshot,
    /// Handler failure message for completed-but-failed iterations.
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
