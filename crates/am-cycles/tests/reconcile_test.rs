//! ConfigManager tests: defaults fallback, persistence, snapshot publishing,
//! and registry reconciliation on enable/disable/interval changes.

use std::sync::Arc;

use am_core::config::Config;
use am_core::types::{
    ApprovalRecord, BackupEntry, CycleKind, Event, EventSummary, PatchOutcome, Proposal,
    RouterStatus,
};
use am_cycles::collaborators::{
    Analyzer, CollabResult, Collaborators, Collector, Executor, Guardrails, Router,
};
use am_cycles::manager::ConfigManager;
use am_cycles::observer::ReportBus;
use am_cycles::registry::CycleRegistry;
use am_cycles::runner::CycleContext;
use am_cycles::stats::CycleStats;
use tempfile::TempDir;

// ===========================================================================
// Mocks
// ===========================================================================

struct NullCollector;

#[async_trait::async_trait]
impl Collector for NullCollector {
    async fn get_pending_events(&self, _limit: usize) -> CollabResult<Vec<Event>> {
        Ok(Vec::new())
    }

    async fn clear_events(&self) -> CollabResult<()> {
        Ok(())
    }

    async fn get_event_summary(&self) -> CollabResult<EventSummary> {
        Ok(EventSummary::default())
    }
}

struct NullAnalyzer;

#[async_trait::async_trait]
impl Analyzer for NullAnalyzer {
    async fn analyze_error(&self, _event: &Event) -> CollabResult<Vec<Proposal>> {
        Ok(Vec::new())
    }
}

struct NullRouter;

#[async_trait::async_trait]
impl Router for NullRouter {
    async fn get_pending_proposals(&self) -> CollabResult<Vec<Proposal>> {
        Ok(Vec::new())
    }

    async fn deliver(&self, _proposal: Proposal) -> CollabResult<()> {
        Ok(())
    }

    async fn record_resolution_outcome(&self, _outcome: &PatchOutcome) -> CollabResult<()> {
        Ok(())
    }

    async fn get_router_status(&self) -> CollabResult<RouterStatus> {
        Ok(RouterStatus::default())
    }
}

struct NullGuardrails;

#[async_trait::async_trait]
impl Guardrails for NullGuardrails {
    async fn get_approval_history(&self) -> CollabResult<Vec<ApprovalRecord>> {
        Ok(Vec::new())
    }

    async fn clear_approval_history(&self) -> CollabResult<()> {
        Ok(())
    }
}

struct NullExecutor;

#[async_trait::async_trait]
impl Executor for NullExecutor {
    async fn apply_patch(&self, proposal: &Proposal) -> CollabResult<PatchOutcome> {
        Ok(PatchOutcome::applied(proposal.id, "ok"))
    }

    async fn cleanup_old_backups(&self, _retention_days: u32) -> CollabResult<usize> {
        Ok(0)
    }

    async fn get_backup_list(&self) -> CollabResult<Vec<BackupEntry>> {
        Ok(Vec::new())
    }
}

// ===========================================================================
// Helpers
// ===========================================================================

/// Manager + registry wired over null collaborators, persisting into a
/// temp dir that lives as long as the rig.
struct TestRig {
    manager: ConfigManager,
    registry: CycleRegistry,
    _dir: TempDir,
}

fn rig_with(config: Config) -> TestRig {
    let dir = tempfile::tempdir().expect("create temp dir");
    let manager = ConfigManager::with_config(dir.path().join("config.toml"), config);
    let collaborators = Collaborators::new(
        Arc::new(NullCollector),
        Arc::new(NullAnalyzer),
        Arc::new(NullRouter),
        Arc::new(NullGuardrails),
        Arc::new(NullExecutor),
    );
    let ctx = CycleContext::new(
        collaborators,
        Arc::new(CycleStats::new()),
        ReportBus::new(),
        manager.subscribe(),
    );
    TestRig {
        manager,
        registry: CycleRegistry::new(ctx),
        _dir: dir,
    }
}

fn default_rig() -> TestRig {
    rig_with(Config::default())
}

// ===========================================================================
// Loading and persistence
// ===========================================================================

#[tokio::test]
async fn load_falls_back_to_defaults_when_file_missing() {
    let dir = tempfile::tempdir().unwrap();
    let manager = ConfigManager::load(dir.path().join("nope").join("config.toml"));

    let config = manager.config();
    assert!(config.general.enabled);
    assert_eq!(config.general.instance_name, "automend");
    assert_eq!(config.cycles.error_detection.interval_secs, 300);
    assert_eq!(config.cycles.patch_application.auto_apply_threshold, 0.8);
}

#[tokio::test]
async fn update_persists_to_disk() {
    let rig = default_rig();
    let mut config = Config::default();
    config.general.instance_name = "automend-staging".into();
    config.cycles.system_optimization.backup_retention_days = 7;

    rig.manager.update(config, &rig.registry).await.unwrap();
    rig.registry.stop_all().await;

    let reloaded = Config::load_from(rig.manager.path()).expect("persisted config parses");
    assert_eq!(reloaded.general.instance_name, "automend-staging");
    assert_eq!(reloaded.cycles.system_optimization.backup_retention_days, 7);
}

#[tokio::test]
async fn update_survives_an_unwritable_path() {
    // Parent of the config path is a regular file, so persisting must fail.
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let manager = ConfigManager::with_config(blocker.join("config.toml"), Config::default());
    let collaborators = Collaborators::new(
        Arc::new(NullCollector),
        Arc::new(NullAnalyzer),
        Arc::new(NullRouter),
        Arc::new(NullGuardrails),
        Arc::new(NullExecutor),
    );
    let ctx = CycleContext::new(
        collaborators,
        Arc::new(CycleStats::new()),
        ReportBus::new(),
        manager.subscribe(),
    );
    let registry = CycleRegistry::new(ctx);

    let mut config = Config::default();
    config.general.instance_name = "memory-only".into();
    manager
        .update(config, &registry)
        .await
        .expect("in-memory update proceeds past a failed persist");
    registry.stop_all().await;

    assert_eq!(manager.config().general.instance_name, "memory-only");
}

#[tokio::test]
async fn update_rejects_invalid_config_and_keeps_the_old_one() {
    let rig = default_rig();
    let mut config = Config::default();
    config.cycles.patch_application.auto_apply_threshold = 1.5;

    let result = rig.manager.update(config, &rig.registry).await;
    assert!(result.is_err(), "threshold outside [0, 1] must be rejected");
    assert_eq!(
        rig.manager.config().cycles.patch_application.auto_apply_threshold,
        0.8,
        "rejected update leaves the previous config live"
    );
    assert_eq!(rig.registry.count().await, 0, "rejected update never reconciles");
}

#[tokio::test]
async fn subscribers_see_the_new_snapshot() {
    let rig = default_rig();
    let receiver = rig.manager.subscribe();

    let mut config = Config::default();
    config.general.instance_name = "renamed".into();
    rig.manager.update(config, &rig.registry).await.unwrap();
    rig.registry.stop_all().await;

    assert_eq!(receiver.borrow().general.instance_name, "renamed");
}

// ===========================================================================
// Reconciliation
// ===========================================================================

#[tokio::test]
async fn reconcile_registers_and_starts_enabled_kinds() {
    let rig = default_rig();
    rig.manager.reconcile(&rig.registry).await;

    assert_eq!(rig.registry.count().await, 3);
    for info in rig.registry.list().await {
        assert!(info.active, "{} should start active", info.kind);
    }
    rig.registry.stop_all().await;
}

#[tokio::test]
async fn reconcile_skips_disabled_kinds() {
    let mut config = Config::default();
    config.cycles.system_optimization.enabled = false;
    let rig = rig_with(config);

    rig.manager.reconcile(&rig.registry).await;

    assert_eq!(rig.registry.count().await, 2);
    assert!(rig
        .registry
        .find_by_kind(CycleKind::SystemOptimization)
        .await
        .is_none());
    rig.registry.stop_all().await;
}

#[tokio::test]
async fn disabling_a_kind_stops_and_removes_its_cycle() {
    let rig = default_rig();
    rig.manager.reconcile(&rig.registry).await;
    assert_eq!(rig.registry.count().await, 3);

    let mut config = Config::default();
    config.cycles.error_detection.enabled = false;
    rig.manager.update(config, &rig.registry).await.unwrap();

    assert_eq!(rig.registry.count().await, 2);
    assert!(rig.registry.find_by_kind(CycleKind::ErrorDetection).await.is_none());
    for info in rig.registry.list().await {
        assert!(info.active, "surviving {} cycle stays active", info.kind);
    }
    rig.registry.stop_all().await;
}

#[tokio::test]
async fn re_enabling_a_kind_recreates_its_cycle() {
    let mut config = Config::default();
    config.cycles.patch_application.enabled = false;
    let rig = rig_with(config);
    rig.manager.reconcile(&rig.registry).await;
    assert_eq!(rig.registry.count().await, 2);

    rig.manager.update(Config::default(), &rig.registry).await.unwrap();

    let id = rig
        .registry
        .find_by_kind(CycleKind::PatchApplication)
        .await
        .expect("re-enabled kind is registered");
    assert!(rig.registry.is_active(id).await, "re-enabled kind starts running");
    rig.registry.stop_all().await;
}

#[tokio::test]
async fn interval_change_restarts_an_active_cycle() {
    let rig = default_rig();
    rig.manager.reconcile(&rig.registry).await;
    let id = rig
        .registry
        .find_by_kind(CycleKind::PatchApplication)
        .await
        .unwrap();
    assert_eq!(rig.registry.get(id).await.unwrap().interval_secs, 600);

    let mut config = Config::default();
    config.cycles.patch_application.interval_secs = 900;
    rig.manager.update(config, &rig.registry).await.unwrap();

    let info = rig.registry.get(id).await.expect("cycle identity survives the change");
    assert_eq!(info.interval_secs, 900);
    assert!(info.active, "previously active cycle is running again");
    rig.registry.stop_all().await;
}

#[tokio::test]
async fn interval_change_does_not_resurrect_a_stopped_cycle() {
    let rig = default_rig();
    rig.manager.reconcile(&rig.registry).await;
    let id = rig
        .registry
        .find_by_kind(CycleKind::ErrorDetection)
        .await
        .unwrap();
    assert!(rig.registry.stop(id).await, "deliberately stop the cycle");

    let mut config = Config::default();
    config.cycles.error_detection.interval_secs = 120;
    rig.manager.update(config, &rig.registry).await.unwrap();

    let info = rig.registry.get(id).await.unwrap();
    assert_eq!(info.interval_secs, 120);
    assert!(!info.active, "interval change must preserve the stopped state");
    rig.registry.stop_all().await;
}

#[tokio::test]
async fn reconcile_is_idempotent() {
    let rig = default_rig();
    rig.manager.reconcile(&rig.registry).await;
    let before: Vec<_> = rig.registry.list().await.iter().map(|c| c.id).collect();

    rig.manager.reconcile(&rig.registry).await;
    let after: Vec<_> = rig.registry.list().await.iter().map(|c| c.id).collect();

    assert_eq!(before, after, "a no-change reconcile must not churn cycles");
    rig.registry.stop_all().await;
}
