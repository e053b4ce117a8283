//! automend daemon: loads the config, wires the collaborator backend,
//! and runs the self-improvement cycles until ctrl-c.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use am_core::config::Config;
use am_core::types::CycleReport;
use am_cycles::collaborators::{Collaborators, Integration};
use am_cycles::manager::ConfigManager;
use am_cycles::orchestrator::Orchestrator;
use am_daemon::logging::{self, LogFormat};
use am_daemon::memory::{
    HeuristicAnalyzer, InMemoryCollector, InMemoryExecutor, InMemoryGuardrails, InMemoryRouter,
    LoggingIntegration,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("am-daemon", "info", LogFormat::from_env());
    info!(version = env!("CARGO_PKG_VERSION"), "automend daemon starting");

    let config_path = resolve_config_path();
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let manager = ConfigManager::load(&config_path);
    let config = manager.config();
    info!(
        path = %config_path.display(),
        instance = %config.general.instance_name,
        "configuration loaded"
    );

    let collaborators = Collaborators::new(
        Arc::new(InMemoryCollector::new()),
        Arc::new(HeuristicAnalyzer::new()),
        Arc::new(InMemoryRouter::new()),
        Arc::new(InMemoryGuardrails::new()),
        Arc::new(InMemoryExecutor::new()),
    );

    let mut integrations: Vec<Arc<dyn Integration>> = Vec::new();
    if config.integration.self_improvement {
        integrations.push(Arc::new(LoggingIntegration::new("self-improvement-hub")));
    }
    if config.integration.ide {
        integrations.push(Arc::new(LoggingIntegration::new("ide-feedback")));
    }

    let orchestrator =
        Arc::new(Orchestrator::new(manager, collaborators).with_integrations(integrations));

    if !orchestrator.start().await {
        info!("orchestrator disabled in config, nothing to run");
        return Ok(());
    }

    let reports = orchestrator.register_observer();
    let drain = tokio::spawn(drain_reports(reports, orchestrator.clone()));

    tokio::signal::ctrl_c().await?;
    info!("ctrl-c received, shutting down");

    orchestrator.stop().await;
    drain.abort();

    let stats = orchestrator.stats();
    info!(
        cycles_completed = stats.cycles_completed,
        patches_applied = stats.patches_applied,
        errors_detected = stats.errors_detected,
        "automend daemon stopped"
    );
    Ok(())
}

/// `AUTOMEND_CONFIG` overrides the default `~/.automend/config.toml`.
fn resolve_config_path() -> PathBuf {
    match std::env::var("AUTOMEND_CONFIG") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => Config::default_path(),
    }
}

/// Surface cycle reports as log lines, honoring the notification flags from
/// the live config.
async fn drain_reports(reports: flume::Receiver<CycleReport>, orchestrator: Arc<Orchestrator>) {
    let mut patches_seen = 0u64;
    while let Ok(report) = reports.recv_async().await {
        let config = orchestrator.config();
        if let Some(error) = &report.error {
            if config.notifications.on_cycle_error {
                warn!(kind = %report.kind, error = %error, "cycle iteration failed");
            }
            continue;
        }
        let applied = report.stats.patches_applied.saturating_sub(patches_seen);
        patches_seen = report.stats.patches_applied;
        if applied > 0 && config.notifications.on_patch_applied {
            info!(kind = %report.kind, applied, "patches applied");
        }
        debug!(
            kind = %report.kind,
            duration_ms = report.duration_ms,
            cycles_completed = report.stats.cycles_completed,
            "cycle report"
        );
    }
}
