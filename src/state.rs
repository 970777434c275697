//! Persisted state
//!
//! `global.json` holds the installed-version marker, the version cache and
//! the last installation. Each workspace gets a directory with its result
//! cache and a fingerprint of the scanner settings it was built with.

use crate::config::schema::ScannerConfig;
use crate::config::ConfigManager;
use crate::error::{VigilError, VigilResult};
use crate::installer::{ScannerInstallation, VersionCacheEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Process-wide state shared by every workspace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalState {
    /// Display version of the scanner last installed
    pub installed_version: Option<String>,

    pub version_cache: Option<VersionCacheEntry>,

    pub installation: Option<ScannerInstallation>,

    pub installed_at: Option<DateTime<Utc>>,
}

impl GlobalState {
    /// Load from `path`; missing or unreadable state starts fresh
    pub async fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring corrupt state file {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub async fn save(&self, path: &Path) -> VigilResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| VigilError::io("creating state directory", e))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .map_err(|e| VigilError::io(format!("writing state file {}", path.display()), e))
    }

    /// Record a fresh installation
    ///
    /// Returns `true` when the scanner version differs from the previous
    /// marker, meaning cached results are stale.
    pub fn record_installation(&mut self, installation: &ScannerInstallation) -> bool {
        let changed = self
            .installed_version
            .as_deref()
            .is_some_and(|v| v != installation.display_version);

        self.installed_version = Some(installation.display_version.clone());
        self.installation = Some(installation.clone());
        self.installed_at = Some(Utc::now());
        changed
    }
}

/// Hash of the scanner settings that affect results
pub fn settings_fingerprint(config: &ScannerConfig) -> String {
    let serialized = serde_json::to_string(config).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Files belonging to one workspace
#[derive(Debug, Clone)]
pub struct WorkspaceState {
    dir: PathBuf,
}

impl WorkspaceState {
    pub fn for_workspace(workspace: &Path) -> Self {
        Self {
            dir: ConfigManager::workspace_state_dir(workspace),
        }
    }

    pub fn at(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn results_path(&self) -> PathBuf {
        self.dir.join("results.json")
    }

    pub fn fingerprint_path(&self) -> PathBuf {
        self.dir.join("config.sha")
    }

    /// Store `fingerprint`, returning whether it differs from the stored one
    ///
    /// A workspace seen for the first time counts as unchanged.
    pub async fn update_fingerprint(&self, fingerprint: &str) -> VigilResult<bool> {
        let path = self.fingerprint_path();
        let previous = fs::read_to_string(&path).await.ok();
        let changed = previous
            .as_deref()
            .is_some_and(|prev| prev.trim() != fingerprint);

        if previous.as_deref().map(str::trim) != Some(fingerprint) {
            fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| VigilError::io("creating workspace state directory", e))?;
            fs::write(&path, fingerprint).await.map_err(|e| {
                VigilError::io(format!("writing fingerprint {}", path.display()), e)
            })?;
            debug!("Stored settings fingerprint for {}", self.dir.display());
        }

        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::InstallMethod;
    use tempfile::TempDir;

    fn installation(version: &str) -> ScannerInstallation {
        ScannerInstallation {
            method: InstallMethod::Container,
            executable_or_image: format!("bridgecrew/checkov:{}", version),
            resolved_version: version.to_string(),
            display_version: version.to_string(),
        }
    }

    #[tokio::test]
    async fn global_state_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("global.json");

        let mut state = GlobalState::default();
        state.record_installation(&installation("3.2.1"));
        state.save(&path).await.unwrap();

        let loaded = GlobalState::load(&path).await;
        assert_eq!(loaded.installed_version.as_deref(), Some("3.2.1"));
        assert_eq!(loaded.installation, Some(installation("3.2.1")));
    }

    #[tokio::test]
    async fn missing_or_corrupt_state_is_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("global.json");
        assert_eq!(GlobalState::load(&path).await, GlobalState::default());

        std::fs::write(&path, "{ nope").unwrap();
        assert_eq!(GlobalState::load(&path).await, GlobalState::default());
    }

    #[test]
    fn version_change_detected() {
        let mut state = GlobalState::default();
        assert!(!state.record_installation(&installation("3.2.1")));
        assert!(!state.record_installation(&installation("3.2.1")));
        assert!(state.record_installation(&installation("3.3.0")));
    }

    #[test]
    fn fingerprint_tracks_settings() {
        let base = ScannerConfig::default();
        let skipped = ScannerConfig {
            skip_checks: vec!["CKV_AWS_1".to_string()],
            ..ScannerConfig::default()
        };
        assert_eq!(settings_fingerprint(&base), settings_fingerprint(&base));
        assert_ne!(settings_fingerprint(&base), settings_fingerprint(&skipped));
    }

    #[tokio::test]
    async fn fingerprint_change_detection() {
        let dir = TempDir::new().unwrap();
        let ws = WorkspaceState::at(dir.path().join("ws"));

        assert!(!ws.update_fingerprint("aaa").await.unwrap());
        assert!(!ws.update_fingerprint("aaa").await.unwrap());
        assert!(ws.update_fingerprint("bbb").await.unwrap());
        assert_eq!(
            std::fs::read_to_string(ws.fingerprint_path()).unwrap(),
            "bbb"
        );
    }
}
