use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::CycleKind;

/// Top-level configuration loaded from `~/.automend/config.toml`.
///
/// Every section and field carries a serde default, so a partial file merges
/// over the built-in defaults at parse time. The defaults enable all three
/// cycle kinds.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub cycles: CyclesConfig,
    #[serde(default)]
    pub integration: IntegrationConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Config {
    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings not expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cycles.validate()
    }

    /// The scheduling slice (enabled flag + interval) for one cycle kind.
    pub fn cycle_settings(&self, kind: CycleKind) -> CycleSettings {
        self.cycles.settings(kind)
    }

    /// Default on-disk location: `~/.automend/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".automend")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// General
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Master switch; the orchestrator refuses to start when false.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            instance_name: default_instance_name(),
        }
    }
}

fn default_enabled() -> bool {
    true
}
fn default_instance_name() -> String {
    "automend".into()
}

// ---------------------------------------------------------------------------
// Cycles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CyclesConfig {
    #[serde(default)]
    pub error_detection: ErrorDetectionConfig,
    #[serde(default)]
    pub patch_application: PatchApplicationConfig,
    #[serde(default)]
    pub system_optimization: SystemOptimizationConfig,
}

impl CyclesConfig {
    /// The scheduling slice for one kind.
    pub fn settings(&self, kind: CycleKind) -> CycleSettings {
        match kind {
            CycleKind::ErrorDetection => CycleSettings {
                enabled: self.error_detection.enabled,
                interval_secs: self.error_detection.interval_secs,
            },
            CycleKind::PatchApplication => CycleSettings {
                enabled: self.patch_application.enabled,
                interval_secs: self.patch_application.interval_secs,
            },
            CycleKind::SystemOptimization => CycleSettings {
                enabled: self.system_optimization.enabled,
                interval_secs: self.system_optimization.interval_secs,
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for kind in CycleKind::ALL {
            let settings = self.settings(kind);
            if settings.interval_secs == 0 {
                return Err(ConfigError::Validation(format!(
                    "cycles.{kind}: interval_secs must be greater than zero"
                )));
            }
        }
        if self.error_detection.max_events_per_cycle == 0 {
            return Err(ConfigError::Validation(
                "cycles.error_detection: max_events_per_cycle must be greater than zero".into(),
            ));
        }
        if self.patch_application.max_patches_per_cycle == 0 {
            return Err(ConfigError::Validation(
                "cycles.patch_application: max_patches_per_cycle must be greater than zero".into(),
            ));
        }
        let threshold = self.patch_application.auto_apply_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Validation(format!(
                "cycles.patch_application: auto_apply_threshold {threshold} outside [0, 1]"
            )));
        }
        Ok(())
    }
}

/// Enabled flag + interval for one kind, as reconciliation consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSettings {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl CycleSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetectionConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_error_detection_interval")]
    pub interval_secs: u64,
    /// Upper bound on events drained from the collector per iteration.
    #[serde(default = "default_max_events")]
    pub max_events_per_cycle: usize,
}

impl Default for ErrorDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_error_detection_interval(),
            max_events_per_cycle: default_max_events(),
        }
    }
}

fn default_error_detection_interval() -> u64 {
    300
}
fn default_max_events() -> usize {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchApplicationConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_patch_application_interval")]
    pub interval_secs: u64,
    /// Upper bound on proposals considered per iteration.
    #[serde(default = "default_max_patches")]
    pub max_patches_per_cycle: usize,
    /// Minimum analyzer confidence for auto-apply, in `[0, 1]`.
    #[serde(default = "default_auto_apply_threshold")]
    pub auto_apply_threshold: f64,
}

impl Default for PatchApplicationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_patch_application_interval(),
            max_patches_per_cycle: default_max_patches(),
            auto_apply_threshold: default_auto_apply_threshold(),
        }
    }
}

fn default_patch_application_interval() -> u64 {
    600
}
fn default_max_patches() -> usize {
    10
}
fn default_auto_apply_threshold() -> f64 {
    0.8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemOptimizationConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_system_optimization_interval")]
    pub interval_secs: u64,
    /// Backups older than this many days are pruned by the maintenance cycle.
    #[serde(default = "default_backup_retention_days")]
    pub backup_retention_days: u32,
}

impl Default for SystemOptimizationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_system_optimization_interval(),
            backup_retention_days: default_backup_retention_days(),
        }
    }
}

fn default_system_optimization_interval() -> u64 {
    3600
}
fn default_backup_retention_days() -> u32 {
    30
}

// ---------------------------------------------------------------------------
// Integration
// ---------------------------------------------------------------------------

/// Which external systems the composition root attaches handshake clients for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    #[serde(default = "default_enabled")]
    pub self_improvement: bool,
    #[serde(default = "default_enabled")]
    pub ide: bool,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            self_improvement: default_enabled(),
            ide: default_enabled(),
        }
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Which cycle reports the daemon's report drain surfaces at info level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_enabled")]
    pub on_patch_applied: bool,
    #[serde(default = "default_enabled")]
    pub on_cycle_error: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            on_patch_applied: default_enabled(),
            on_cycle_error: default_enabled(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
