//! Scan coordination
//!
//! Each trigger walks one document through
//! `Idle -> Queued -> Running -> Completed | Cancelled | Failed`:
//!
//! 1. Unsupported files are ignored.
//! 2. Any running scan of the document is cancelled and the debounce ticket
//!    replaced; only the latest ticket proceeds after the window.
//! 3. A result cache hit publishes immediately without taking a slot.
//! 4. Otherwise the scanner is installed (once, lazily), the scan admitted
//!    under the concurrency bound and raced against the timeout.
//! 5. Results from a cancelled token are dropped.
//!
//! Shared state sits behind `std::sync::Mutex` locks that are never held
//! across an `.await`.

mod admission;
mod debounce;

pub use admission::{ActiveScans, AdmissionGuard};
pub use debounce::Debouncer;

use crate::activity::ActivityLog;
use crate::cache::{content_hash, ResultCache};
use crate::config::schema::Config;
use crate::diagnostics::{project, DiagnosticsSink, Notifier};
use crate::error::{VigilError, VigilResult};
use crate::installer::{Installer, ScannerInstallation, VersionCacheEntry};
use crate::scan::{is_supported_file, DocumentId, Finding, ScanRequest, ScanRunner, ScanSettings};
use crate::state::GlobalState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source of a runnable scanner
#[async_trait]
pub trait ScannerProvider: Send + Sync {
    async fn ensure_installed(&self, requested: &str) -> VigilResult<ScannerInstallation>;

    fn clear_version_cache(&self);

    /// Version cache contents to persist
    fn version_cache_snapshot(&self) -> Option<VersionCacheEntry> {
        None
    }
}

#[async_trait]
impl ScannerProvider for Installer {
    async fn ensure_installed(&self, requested: &str) -> VigilResult<ScannerInstallation> {
        Installer::ensure_installed(self, requested).await
    }

    fn clear_version_cache(&self) {
        Installer::clear_version_cache(self);
    }

    fn version_cache_snapshot(&self) -> Option<VersionCacheEntry> {
        self.version_cache().snapshot()
    }
}

/// What caused a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Change,
    Save,
    Open,
    Command,
}

/// A request to scan a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTrigger {
    pub document: DocumentId,
    pub path: PathBuf,
    /// Unsaved editor text; read from disk when absent
    pub content: Option<String>,
    pub kind: TriggerKind,
}

impl ScanTrigger {
    pub fn new(document: DocumentId, path: PathBuf, kind: TriggerKind) -> Self {
        Self {
            document,
            path,
            content: None,
            kind,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// How a trigger ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Not a file type the scanner understands
    Unsupported,
    /// A later trigger for the same document took over during the debounce
    Superseded,
    /// Served from the result cache
    Cached { findings: usize },
    Completed { findings: usize },
    /// Cancelled by a newer scan, eviction or focus change
    Cancelled,
    TimedOut,
    Failed { reason: String },
}

/// Scheduling knobs
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub requested_version: String,
    pub max_concurrent: usize,
    pub timeout: Duration,
    pub debounce: Duration,
    pub disable_error_messages: bool,
    pub workspace_root: Option<PathBuf>,
    pub scan_settings: Arc<ScanSettings>,
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config, workspace_root: Option<PathBuf>) -> Self {
        Self {
            requested_version: config.scanner.version.trim().to_string(),
            max_concurrent: config.scan.max_concurrent,
            timeout: Duration::from_secs(config.scan.timeout_secs),
            debounce: Duration::from_millis(config.scan.debounce_ms),
            disable_error_messages: config.notifications.disable_error_messages,
            workspace_root,
            scan_settings: Arc::new(ScanSettings::from(&config.scanner)),
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default(), None)
    }
}

/// Schedules scans for documents
pub struct ScanCoordinator {
    settings: CoordinatorSettings,
    provider: Arc<dyn ScannerProvider>,
    runner: Arc<dyn ScanRunner>,
    sink: Arc<dyn DiagnosticsSink>,
    notifier: Arc<dyn Notifier>,
    activity: ActivityLog,
    results: Mutex<ResultCache>,
    results_path: Option<PathBuf>,
    global_state_path: Option<PathBuf>,
    /// Held while the result cache file is written
    persist: tokio::sync::Mutex<()>,
    installation: tokio::sync::Mutex<Option<ScannerInstallation>>,
    debouncer: Debouncer<DocumentId>,
    active: ActiveScans,
}

impl ScanCoordinator {
    pub fn new(
        settings: CoordinatorSettings,
        provider: Arc<dyn ScannerProvider>,
        runner: Arc<dyn ScanRunner>,
        sink: Arc<dyn DiagnosticsSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let active = ActiveScans::new(settings.max_concurrent);
        Self {
            settings,
            provider,
            runner,
            sink,
            notifier,
            activity: ActivityLog::disabled(),
            results: Mutex::new(ResultCache::new()),
            results_path: None,
            global_state_path: None,
            persist: tokio::sync::Mutex::new(()),
            installation: tokio::sync::Mutex::new(None),
            debouncer: Debouncer::new(),
            active,
        }
    }

    pub fn with_activity_log(mut self, activity: ActivityLog) -> Self {
        self.activity = activity;
        self
    }

    /// Start from `cache`, persisting it to `path` after every change
    pub fn with_result_cache(mut self, cache: ResultCache, path: Option<PathBuf>) -> Self {
        self.results = Mutex::new(cache);
        self.results_path = path;
        self
    }

    /// Track the installed version marker in `path`
    pub fn with_global_state(mut self, path: PathBuf) -> Self {
        self.global_state_path = Some(path);
        self
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Number of admitted, still-running scans
    pub fn active_scans(&self) -> usize {
        self.active.len()
    }

    /// Cached results across all files
    pub fn cached_results(&self) -> usize {
        self.results.lock().map(|c| c.total_entries()).unwrap_or(0)
    }

    /// Handle an edit, save, open or explicit scan request
    pub async fn trigger(&self, trigger: ScanTrigger) -> ScanOutcome {
        if !is_supported_file(&trigger.path) {
            debug!("Ignoring unsupported file {}", trigger.path.display());
            return ScanOutcome::Unsupported;
        }

        self.active.cancel_document(&trigger.document);
        let ticket = self.debouncer.schedule(trigger.document.clone());

        tokio::time::sleep(self.settings.debounce).await;

        if !self.debouncer.claim(&trigger.document, ticket) {
            debug!("Trigger for {} superseded", trigger.document);
            return ScanOutcome::Superseded;
        }

        self.scan(trigger).await
    }

    async fn scan(&self, trigger: ScanTrigger) -> ScanOutcome {
        let ScanTrigger {
            document,
            path,
            content,
            kind,
        } = trigger;

        let request = ScanRequest::new(
            document.clone(),
            path.clone(),
            self.settings.workspace_root.clone(),
            Arc::clone(&self.settings.scan_settings),
        );
        let token = request.cancel.clone();
        let pending = self.active.register_pending(&document, token.clone());

        let content = match content {
            Some(content) => content,
            None => match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    let error = VigilError::io(format!("reading {}", path.display()), e);
                    return self.fail(&path, error).await;
                }
            },
        };
        if token.is_cancelled() {
            debug!("Scan of {} cancelled before it started", document);
            return ScanOutcome::Cancelled;
        }

        let hash = content_hash(&content);
        let cached = self
            .results
            .lock()
            .ok()
            .and_then(|mut cache| cache.get(&hash, &path));
        if let Some(entry) = cached {
            debug!("Cache hit for {}", path.display());
            let findings = entry.findings.len();
            self.sink.publish(&document, project(&entry.findings)).await;
            return ScanOutcome::Cached { findings };
        }

        let installation = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Scan of {} cancelled while installing", document);
                return ScanOutcome::Cancelled;
            }
            result = self.installation() => match result {
                Ok(installation) => installation,
                Err(e) => return self.fail(&path, e).await,
            },
        };

        drop(pending);
        if token.is_cancelled() {
            return ScanOutcome::Cancelled;
        }
        let guard = self.active.admit(&document, token.clone());
        debug!("Scan of {} admitted ({:?})", document, kind);

        let run = self.runner.run(&installation, &request);
        tokio::pin!(run);

        let finished = tokio::select! {
            result = &mut run => Some(result),
            _ = tokio::time::sleep(self.settings.timeout) => None,
        };
        let (result, timed_out) = match finished {
            Some(result) => (result, false),
            None => {
                token.cancel();
                guard.release_now();
                (run.await, true)
            }
        };

        if timed_out {
            warn!(
                "Scan of {} timed out after {}s",
                path.display(),
                self.settings.timeout.as_secs()
            );
            self.activity
                .log(
                    "scan.timeout",
                    &serde_json::json!({ "file": path, "timeout_secs": self.settings.timeout.as_secs() }),
                )
                .await;
            return ScanOutcome::TimedOut;
        }

        if token.is_cancelled() {
            debug!("Dropping result of cancelled scan of {}", document);
            return ScanOutcome::Cancelled;
        }

        match result {
            Ok(findings) => {
                let count = findings.len();
                let diagnostics = project(&findings);
                self.store(&hash, &path, findings).await;
                self.sink.publish(&document, diagnostics).await;
                self.activity
                    .log(
                        "scan.completed",
                        &serde_json::json!({ "file": path, "findings": count }),
                    )
                    .await;
                info!("Scan of {} found {} issue(s)", path.display(), count);
                ScanOutcome::Completed { findings: count }
            }
            Err(e) if e.is_cancelled() => {
                debug!("Scan of {} cancelled", document);
                ScanOutcome::Cancelled
            }
            Err(e) => self.fail(&path, e).await,
        }
    }

    async fn store(&self, hash: &str, path: &Path, findings: Vec<Finding>) {
        if let Ok(mut cache) = self.results.lock() {
            cache.put(hash, path, findings);
        }
        self.persist_results().await;
    }

    /// Write the current cache; writers are serialised and each snapshots
    /// the cache only once it holds the write lock
    async fn persist_results(&self) {
        let Some(ref results_path) = self.results_path else {
            return;
        };
        let _writing = self.persist.lock().await;
        let json = match self.results.lock() {
            Ok(cache) => cache.to_json(),
            Err(_) => return,
        };
        let written = match json {
            Ok(json) => ResultCache::write_json(results_path, json).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!("Failed to persist result cache: {}", e);
        }
    }

    async fn fail(&self, path: &Path, error: VigilError) -> ScanOutcome {
        let reason = error.to_string();
        warn!("Scan of {} failed: {}", path.display(), reason);
        self.activity
            .log(
                "scan.failed",
                &serde_json::json!({ "file": path, "error": reason }),
            )
            .await;

        if !self.settings.disable_error_messages {
            let message = match error.hint() {
                Some(hint) => format!("{} ({})", reason, hint),
                None => reason.clone(),
            };
            self.notifier.error(&message);
        }

        ScanOutcome::Failed { reason }
    }

    /// The scanner installation, installing it on first use
    pub async fn installation(&self) -> VigilResult<ScannerInstallation> {
        let mut slot = self.installation.lock().await;
        if let Some(installation) = slot.as_ref() {
            return Ok(installation.clone());
        }

        let installation = self
            .provider
            .ensure_installed(&self.settings.requested_version)
            .await?;
        self.record_installation(&installation).await;
        *slot = Some(installation.clone());
        Ok(installation)
    }

    /// Install or update the scanner, replacing the current installation
    pub async fn install(&self) -> VigilResult<ScannerInstallation> {
        self.installation.lock().await.take();
        self.installation().await
    }

    async fn record_installation(&self, installation: &ScannerInstallation) {
        info!(
            "Using scanner {} via {}",
            installation.display_version, installation.method
        );
        self.activity
            .log(
                "scanner.installed",
                &serde_json::json!({
                    "method": installation.method,
                    "target": installation.executable_or_image,
                    "version": installation.display_version,
                }),
            )
            .await;

        let Some(ref path) = self.global_state_path else {
            return;
        };

        let mut state = GlobalState::load(path).await;
        let changed = state.record_installation(installation);
        state.version_cache = self.provider.version_cache_snapshot();
        if let Err(e) = state.save(path).await {
            warn!("Failed to save global state: {}", e);
        }

        if changed {
            info!(
                "Scanner version changed to {}, clearing cached results",
                installation.display_version
            );
            self.clear_results_cache().await;
        }
    }

    /// React to the editor focusing another file
    ///
    /// Moving to an unsupported file cancels every running and pending scan.
    pub fn focus_changed(&self, path: &Path) {
        if is_supported_file(path) {
            return;
        }
        debug!("Focus moved to {}, cancelling scans", path.display());
        self.debouncer.cancel_all();
        self.active.cancel_all();
    }

    /// Clear every published diagnostic
    pub async fn remove_diagnostics(&self) {
        self.sink.clear_all().await;
    }

    pub async fn clear_results_cache(&self) {
        if let Ok(mut cache) = self.results.lock() {
            cache.clear();
        }
        self.persist_results().await;
        self.activity
            .log("cache.cleared", &serde_json::json!({}))
            .await;
        info!("Result cache cleared");
    }

    pub async fn clear_version_cache(&self) {
        self.provider.clear_version_cache();

        if let Some(ref path) = self.global_state_path {
            let mut state = GlobalState::load(path).await;
            state.version_cache = None;
            if let Err(e) = state.save(path).await {
                warn!("Failed to save global state: {}", e);
            }
        }
    }

    /// Cancel everything in flight
    pub fn shutdown(&self) {
        self.debouncer.cancel_all();
        self.active.cancel_all();
    }
}
