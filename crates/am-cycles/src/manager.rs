use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use am_core::config::{Config, ConfigError};
use am_core::store::ConfigStore;
use am_core::types::CycleKind;

use crate::registry::CycleRegistry;

// ---------------------------------------------------------------------------
// ConfigManager
// ---------------------------------------------------------------------------

/// Owns the live configuration and keeps the registry aligned with it.
///
/// The current config is published as an immutable `Arc<Config>` snapshot
/// over a watch channel: runners borrow one snapshot per iteration and never
/// observe a half-applied update. Updates validate first, persist to disk
/// best-effort, then reconcile the registry.
pub struct ConfigManager {
    store: ConfigStore,
    current: watch::Sender<Arc<Config>>,
    /// Serializes concurrent update/reconcile calls against each other.
    update_lock: Mutex<()>,
}

impl ConfigManager {
    /// Load from `path`, falling back to defaults (with a warning) when the
    /// file is missing or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let store = ConfigStore::new(path);
        let config = store.load_or_default();
        Self::with_store(store, config)
    }

    /// Start from an explicit config; `path` is still used for persistence.
    pub fn with_config(path: impl Into<PathBuf>, config: Config) -> Self {
        Self::with_store(ConfigStore::new(path), config)
    }

    fn with_store(store: ConfigStore, config: Config) -> Self {
        let (current, _) = watch::channel(Arc::new(config));
        Self {
            store,
            current,
            update_lock: Mutex::new(()),
        }
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<Config> {
        self.current.borrow().clone()
    }

    /// Snapshot channel handed to cycle runners.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Config>> {
        self.current.subscribe()
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Replace the configuration: validate, persist best-effort, publish the
    /// new snapshot, then reconcile the registry against it.
    ///
    /// A failed persist keeps the in-memory update; running cycles must not
    /// be held hostage to a read-only disk.
    pub async fn update(
        &self,
        new_config: Config,
        registry: &CycleRegistry,
    ) -> Result<(), ConfigError> {
        new_config.validate()?;
        let _guard = self.update_lock.lock().await;

        if let Err(e) = self.store.save(&new_config) {
            warn!(
                path = %self.store.path().display(),
                error = %e,
                "config persist failed, continuing with in-memory update"
            );
        }
        self.current.send_replace(Arc::new(new_config));
        info!("configuration updated");

        self.reconcile_locked(registry).await;
        Ok(())
    }

    /// Align the registry with the current configuration.
    pub async fn reconcile(&self, registry: &CycleRegistry) {
        let _guard = self.update_lock.lock().await;
        self.reconcile_locked(registry).await;
    }

    async fn reconcile_locked(&self, registry: &CycleRegistry) {
        let config = self.config();

        // Disabled kinds: stop and remove.
        for cycle in registry.list().await {
            if !config.cycle_settings(cycle.kind).enabled {
                if cycle.active {
                    registry.stop(cycle.id).await;
                }
                registry.remove(cycle.id).await;
                info!(kind = %cycle.kind, "cycle disabled by config");
            }
        }

        // Enabled kinds: ensure one cycle each, at the configured interval.
        for kind in CycleKind::ALL {
            let settings = config.cycle_settings(kind);
            if !settings.enabled {
                continue;
            }
            match registry.find_by_kind(kind).await {
                None => match registry.register(kind, settings.interval()).await {
                    Ok(id) => {
                        registry.start(id).await;
                        info!(
                            kind = %kind,
                            interval_secs = settings.interval_secs,
                            "cycle added from config"
                        );
                    }
                    Err(e) => {
                        warn!(kind = %kind, error = %e, "failed to register configured cycle")
                    }
                },
                Some(id) => {
                    let Some(cycle) = registry.get(id).await else {
                        continue;
                    };
                    if cycle.interval_secs != settings.interval_secs {
                        // Preserve prior activity: an interval change must
                        // not resurrect a deliberately stopped cycle.
                        let was_active = cycle.active;
                        if was_active {
                            registry.stop(id).await;
                        }
                        registry.set_interval(id, settings.interval()).await;
                        if was_active {
                            registry.start(id).await;
                        }
                        info!(
                            kind = %kind,
                            interval_secs = settings.interval_secs,
                            was_active,
                            "cycle interval updated"
                        );
                    }
                }
            }
        }
    }
}
