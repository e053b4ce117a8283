//! End-to-end tests over the in-memory backend: seeded events flow through
//! detection into routed proposals, confident proposals get applied and
//! resolved, and the optimization cycle prunes aged backups.

use std::sync::Arc;
use std::time::{Duration, Instant};

use am_core::config::Config;
use am_core::types::{BackupEntry, CycleKind, Event, EventSeverity};
use am_cycles::collaborators::{Collaborators, Collector, Integration, Router};
use am_cycles::manager::ConfigManager;
use am_cycles::orchestrator::Orchestrator;
use am_cycles::registry::CycleTuning;
use am_daemon::memory::{
    HeuristicAnalyzer, InMemoryCollector, InMemoryExecutor, InMemoryGuardrails, InMemoryRouter,
    LoggingIntegration,
};
use chrono::Utc;
use tempfile::TempDir;

// ===========================================================================
// Helpers
// ===========================================================================

/// The in-memory backend handles, kept alongside the orchestrator so tests
/// can seed and inspect them directly.
struct Backend {
    collector: InMemoryCollector,
    router: InMemoryRouter,
    executor: InMemoryExecutor,
}

struct TestRig {
    orchestrator: Orchestrator,
    backend: Backend,
    _dir: TempDir,
}

/// Orchestrator over the in-memory backend, with single-iteration runners.
fn rig() -> TestRig {
    let dir = tempfile::tempdir().expect("create temp dir");
    let manager = ConfigManager::with_config(dir.path().join("config.toml"), Config::default());

    let collector = InMemoryCollector::new();
    let router = InMemoryRouter::new();
    let executor = InMemoryExecutor::new();
    let collaborators = Collaborators::new(
        Arc::new(collector.clone()),
        Arc::new(HeuristicAnalyzer::new()),
        Arc::new(router.clone()),
        Arc::new(InMemoryGuardrails::new()),
        Arc::new(executor.clone()),
    );
    let tuning = CycleTuning {
        max_iterations: Some(1),
        ..Default::default()
    };
    TestRig {
        orchestrator: Orchestrator::with_tuning(manager, collaborators, tuning),
        backend: Backend {
            collector,
            router,
            executor,
        },
        _dir: dir,
    }
}

/// Register and start one capped cycle with a tiny interval, then wait for
/// the orchestrator's completion counter to reach `completed`.
async fn run_cycle_once(rig: &TestRig, kind: CycleKind, completed: u64) {
    let id = rig
        .orchestrator
        .registry()
        .register(kind, Duration::from_millis(10))
        .await
        .expect("register cycle");
    assert!(rig.orchestrator.registry().start(id).await);

    let deadline = Instant::now() + Duration::from_secs(2);
    while rig.orchestrator.stats().cycles_completed < completed {
        assert!(
            Instant::now() < deadline,
            "{kind} cycle never completed iteration {completed}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ===========================================================================
// Pipeline
// ===========================================================================

#[tokio::test]
async fn seeded_errors_become_applied_patches() {
    let rig = rig();
    rig.backend
        .collector
        .record(Event::new("parser", EventSeverity::Error, "unexpected token"));
    rig.backend
        .collector
        .record(Event::new("io", EventSeverity::Critical, "lost socket"));

    // Detection: both events analyzed, proposals routed, pending set cleared.
    run_cycle_once(&rig, CycleKind::ErrorDetection, 1).await;

    let summary = rig.backend.collector.get_event_summary().await.unwrap();
    assert_eq!(summary.pending, 0, "batch fully processed, events cleared");
    assert_eq!(summary.cleared, 2);

    let status = rig.backend.router.get_router_status().await.unwrap();
    assert_eq!(status.pending, 2, "one proposal per seeded event");

    // Application: Error (0.85) and Critical (0.95) both clear the 0.8 bar.
    run_cycle_once(&rig, CycleKind::PatchApplication, 2).await;

    let stats = rig.orchestrator.stats();
    assert_eq!(stats.errors_detected, 2);
    assert_eq!(stats.patches_applied, 2);

    let status = rig.backend.router.get_router_status().await.unwrap();
    assert_eq!(status.pending, 0, "applied proposals are retired");
    assert_eq!(status.resolutions_recorded, 2);
    assert_eq!(
        rig.backend.executor.backup_count(),
        2,
        "each apply leaves a backup"
    );
}

#[tokio::test]
async fn low_confidence_proposals_are_left_for_review() {
    let rig = rig();
    rig.backend
        .collector
        .record(Event::new("linter", EventSeverity::Warning, "unused import"));

    run_cycle_once(&rig, CycleKind::ErrorDetection, 1).await;
    run_cycle_once(&rig, CycleKind::PatchApplication, 2).await;

    let stats = rig.orchestrator.stats();
    assert_eq!(stats.patches_applied, 0, "warning confidence 0.6 stays below 0.8");

    let status = rig.backend.router.get_router_status().await.unwrap();
    assert_eq!(status.pending, 1, "skipped proposal stays queued");
    assert_eq!(status.resolutions_recorded, 0);
}

#[tokio::test]
async fn optimization_prunes_aged_backups() {
    let rig = rig();
    rig.backend.executor.seed_backup(BackupEntry {
        path: "backups/ancient.bak".into(),
        created_at: Utc::now() - chrono::Duration::days(365),
    });
    rig.backend.executor.seed_backup(BackupEntry {
        path: "backups/recent.bak".into(),
        created_at: Utc::now(),
    });

    run_cycle_once(&rig, CycleKind::SystemOptimization, 1).await;

    assert_eq!(
        rig.backend.executor.backup_count(),
        1,
        "default 30 day retention drops only the ancient backup"
    );
}

// ===========================================================================
// Status and integrations
// ===========================================================================

#[tokio::test]
async fn status_reflects_the_live_backend() {
    let rig = rig();
    for i in 0..3 {
        rig.backend
            .collector
            .record(Event::new("seed", EventSeverity::Info, format!("note {i}")));
    }

    let status = rig.orchestrator.status().await;
    assert_eq!(status.events.pending, 3);
    assert_eq!(status.events.total_collected, 3);
    assert_eq!(status.router.pending, 0);

    let json = serde_json::to_value(&status).expect("status serializes");
    assert_eq!(json["events"]["pending"], 3);
}

#[tokio::test]
async fn logging_integration_handshake_succeeds() {
    let integration = LoggingIntegration::new("self-improvement-hub");
    assert_eq!(integration.name(), "self-improvement-hub");
    integration.handshake().await.expect("local handshake always succeeds");
}
