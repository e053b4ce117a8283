//! Self-improvement cycle engine.
//!
//! Three recurring cycles (error detection, patch application, system
//! optimization) run as cancellable tokio tasks over a set of pluggable
//! collaborators. A [`registry::CycleRegistry`] owns the runner tasks, a
//! [`manager::ConfigManager`] keeps them aligned with the on-disk config,
//! and an [`orchestrator::Orchestrator`] fronts the whole engine.

pub mod clock;
pub mod collaborators;
pub mod cycle;
pub mod handlers;
pub mod manager;
pub mod observer;
pub mod orchestrator;
pub mod registry;
pub mod runner;
pub mod stats;

pub use clock::{CancelToken, CycleClock, WaitOutcome};
pub use collaborators::{
    Analyzer, CollabResult, CollaboratorError, Collaborators, Collector, Executor, Guardrails,
    Integration, Router,
};
pub use cycle::{CycleInfo, CyclePhase};
pub use manager::ConfigManager;
pub use observer::ReportBus;
pub use orchestrator::{Orchestrator, OrchestratorStatus};
pub use registry::{CycleRegistry, CycleTuning, RegistryError, DEFAULT_JOIN_TIMEOUT};
pub use runner::CycleContext;
pub use stats::CycleStats;
