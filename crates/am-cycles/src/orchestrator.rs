use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use am_core::config::{Config, ConfigError};
use am_core::types::{CycleReport, EventSummary, RouterStatus, StatsSnapshot};

use crate::collaborators::{Collaborators, Integration};
use crate::cycle::CycleInfo;
use crate::manager::ConfigManager;
use crate::observer::ReportBus;
use crate::registry::{CycleRegistry, CycleTuning};
use crate::runner::CycleContext;
use crate::stats::CycleStats;

// ---------------------------------------------------------------------------
// OrchestratorStatus
// ---------------------------------------------------------------------------

/// Process counters plus a snapshot pulled live from every collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub enabled: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_secs: Option<u64>,
    pub stats: StatsSnapshot,
    pub cycles: Vec<CycleInfo>,
    pub events: EventSummary,
    pub router: RouterStatus,
    pub approvals_recorded: usize,
    pub backups_retained: usize,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Top-level facade composing the config manager, the cycle registry, and
/// the collaborator handles.
///
/// Explicitly constructed and owned by the composition root. There is no
/// global instance; tests build as many as they like.
pub struct Orchestrator {
    manager: ConfigManager,
    registry: CycleRegistry,
    collaborators: Collaborators,
    stats: Arc<CycleStats>,
    reports: ReportBus,
    integrations: Vec<Arc<dyn Integration>>,
    started_at: Mutex<Option<DateTime<Utc>>>,
}

impl Orchestrator {
    pub fn new(manager: ConfigManager, collaborators: Collaborators) -> Self {
        Self::with_tuning(manager, collaborators, CycleTuning::default())
    }

    /// Construction with explicit lifecycle tuning, used by test harnesses
    /// to cap runner iterations and shrink the join timeout.
    pub fn with_tuning(
        manager: ConfigManager,
        collaborators: Collaborators,
        tuning: CycleTuning,
    ) -> Self {
        let stats = Arc::new(CycleStats::new());
        let reports = ReportBus::new();
        let ctx = CycleContext::new(
            collaborators.clone(),
            stats.clone(),
            reports.clone(),
            manager.subscribe(),
        );
        let registry = CycleRegistry::with_tuning(ctx, tuning);
        Self {
            manager,
            registry,
            collaborators,
            stats,
            reports,
            integrations: Vec::new(),
            started_at: Mutex::new(None),
        }
    }

    /// Attach best-effort integration clients, replacing any prior set.
    pub fn with_integrations(mut self, integrations: Vec<Arc<dyn Integration>>) -> Self {
        self.integrations = integrations;
        self
    }

    pub fn config(&self) -> Arc<Config> {
        self.manager.config()
    }

    pub fn registry(&self) -> &CycleRegistry {
        &self.registry
    }

    /// Start the orchestrator.
    ///
    /// Refuses (returns `false`) when globally disabled. Integration
    /// handshakes are best-effort: a failure is logged and never blocks
    /// startup. Cycles are then reconciled from config and started.
    pub async fn start(&self) -> bool {
        let config = self.manager.config();
        if !config.general.enabled {
            info!("orchestrator disabled by config, refusing to start");
            return false;
        }

        for integration in &self.integrations {
            match integration.handshake().await {
                Ok(()) => info!(integration = integration.name(), "integration handshake ok"),
                Err(e) => warn!(
                    integration = integration.name(),
                    error = %e,
                    "integration handshake failed, continuing without it"
                ),
            }
        }

        self.manager.reconcile(&self.registry).await;
        self.registry.start_all().await;

        {
            let mut started_at = self.started_at.lock().expect("started_at lock poisoned");
            if started_at.is_none() {
                *started_at = Some(Utc::now());
            }
        }
        let cycles = self.registry.count().await;
        info!(
            instance = %config.general.instance_name,
            cycles,
            "orchestrator started"
        );
        true
    }

    /// Stop every cycle unconditionally.
    pub async fn stop(&self) {
        let stopped = self.registry.stop_all().await;
        info!(stopped, "orchestrator stopped");
    }

    /// Replace the configuration and reconcile the running cycles against it.
    pub async fn update_config(&self, new_config: Config) -> Result<(), ConfigError> {
        self.manager.update(new_config, &self.registry).await
    }

    /// Register a report observer. Every cycle runner publishes one
    /// `CycleReport` per iteration; observers registered after some activity
    /// see only what comes next. Append-only for the process lifetime.
    pub fn register_observer(&self) -> flume::Receiver<CycleReport> {
        self.reports.subscribe()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Counters plus live collaborator summaries. Collaborator state is
    /// pulled fresh on every call, never cached; a failing collaborator
    /// contributes its default instead of failing the whole status.
    pub async fn status(&self) -> OrchestratorStatus {
        let config = self.manager.config();
        let started_at = *self.started_at.lock().expect("started_at lock poisoned");

        let events = match self.collaborators.collector.get_event_summary().await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "collector summary unavailable");
                EventSummary::default()
            }
        };
        let router = match self.collaborators.router.get_router_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "router status unavailable");
                RouterStatus::default()
            }
        };
        let approvals_recorded = match self.collaborators.guardrails.get_approval_history().await {
            Ok(history) => history.len(),
            Err(e) => {
                warn!(error = %e, "approval history unavailable");
                0
            }
        };
        let backups_retained = match self.collaborators.executor.get_backup_list().await {
            Ok(backups) => backups.len(),
            Err(e) => {
                warn!(error = %e, "backup list unavailable");
                0
            }
        };

        OrchestratorStatus {
            enabled: config.general.enabled,
            started_at,
            uptime_secs: started_at.map(|t| (Utc::now() - t).num_seconds().max(0) as u64),
            stats: self.stats.snapshot(),
            cycles: self.registry.list().await,
            events,
            router,
            approvals_recorded,
            backups_retained,
        }
    }
}
