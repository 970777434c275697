//! Shared setup for commands that scan
//!
//! Wires the container runtime, installer, severity table, process runner
//! and persisted state into a [`ScanCoordinator`].

use crate::activity::ActivityLog;
use crate::cache::ResultCache;
use crate::config::{Config, ConfigManager};
use crate::coordinator::{CoordinatorSettings, ScanCoordinator};
use crate::diagnostics::{DiagnosticsSink, Notifier};
use crate::error::VigilResult;
use crate::installer::{CommandExecutor, Installer, SystemExecutor, VersionCache};
use crate::orchestration::create_runtime;
use crate::scan::ProcessRunner;
use crate::severity::load_severity_map;
use crate::state::{settings_fingerprint, GlobalState, WorkspaceState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Loaded configuration plus the workspace it applies to
pub struct AppContext {
    pub config: Config,
    pub workspace: PathBuf,
    pub activity: ActivityLog,
}

impl AppContext {
    pub fn new(config: Config, workspace: PathBuf) -> Self {
        let activity = ActivityLog::new(&config);
        Self {
            config,
            workspace,
            activity,
        }
    }

    pub fn workspace_state(&self) -> WorkspaceState {
        WorkspaceState::for_workspace(&self.workspace)
    }

    /// Coordinator settings derived from the loaded configuration
    pub fn settings(&self) -> CoordinatorSettings {
        CoordinatorSettings::from_config(&self.config, Some(self.workspace.clone()))
    }

    /// Build a coordinator reporting through `sink` and `notifier`
    pub async fn coordinator(
        &self,
        sink: Arc<dyn DiagnosticsSink>,
        notifier: Arc<dyn Notifier>,
    ) -> VigilResult<ScanCoordinator> {
        self.coordinator_with(self.settings(), sink, notifier).await
    }

    pub async fn coordinator_with(
        &self,
        settings: CoordinatorSettings,
        sink: Arc<dyn DiagnosticsSink>,
        notifier: Arc<dyn Notifier>,
    ) -> VigilResult<ScanCoordinator> {
        let runtime = create_runtime(&self.config.scanner).await?;
        match runtime {
            Some(ref rt) => debug!("Container engine: {}", rt.runtime_name()),
            None => debug!("No container engine, using host installs"),
        }
        let executor: Arc<dyn CommandExecutor> = Arc::new(SystemExecutor);

        let global_path = ConfigManager::global_state_path();
        let global = GlobalState::load(&global_path).await;
        let version_cache = Arc::new(VersionCache::with_entry(global.version_cache));

        let installer = Installer::new(
            self.config.scanner.clone(),
            runtime.clone(),
            Arc::clone(&executor),
            version_cache,
            ConfigManager::venv_dir(),
        );

        let severities = Arc::new(load_severity_map(&self.config.severity.mapping_url).await);
        debug!("Severity table has {} entries", severities.len());
        let runner = ProcessRunner::new(runtime, executor, severities);

        let results = self.load_results().await;

        Ok(ScanCoordinator::new(
            settings,
            Arc::new(installer),
            Arc::new(runner),
            sink,
            notifier,
        )
        .with_activity_log(self.activity.clone())
        .with_result_cache(results, Some(self.workspace_state().results_path()))
        .with_global_state(global_path))
    }

    /// Load the workspace result cache, dropping it when scanner settings changed
    async fn load_results(&self) -> ResultCache {
        let ws = self.workspace_state();
        let results_path = ws.results_path();
        let mut cache = ResultCache::load(&results_path).await;

        let changed = match ws.update_fingerprint(&settings_fingerprint(&self.config.scanner)).await {
            Ok(changed) => changed,
            Err(e) => {
                warn!("Failed to update settings fingerprint: {}", e);
                false
            }
        };

        if changed && self.config.cache.clear_on_config_change {
            info!("Scanner settings changed, clearing cached results");
            cache.clear();
            let written = match cache.to_json() {
                Ok(json) => ResultCache::write_json(&results_path, json).await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                warn!("Failed to persist result cache: {}", e);
            }
        }

        cache
    }
}
