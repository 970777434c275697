//! Configuration management for Vigil

pub mod schema;

pub use schema::Config;

use crate::error::{VigilError, VigilResult};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// File name of the project-local config
pub const LOCAL_CONFIG_NAME: &str = ".vigil.toml";

/// Environment variable overriding the state directory
pub const STATE_DIR_ENV: &str = "VIGIL_STATE_DIR";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vigil")
            .join("config.toml")
    }

    /// Get the state directory path (`VIGIL_STATE_DIR` overrides)
    pub fn state_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(STATE_DIR_ENV).filter(|d| !d.is_empty()) {
            return PathBuf::from(dir);
        }
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vigil")
    }

    /// Global state file (installed version marker, version cache)
    pub fn global_state_path() -> PathBuf {
        Self::state_dir().join("global.json")
    }

    /// Per-workspace state directory, keyed by a hash of the workspace path
    pub fn workspace_state_dir(workspace: &Path) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(workspace.to_string_lossy().as_bytes());
        let key = hex::encode(&hasher.finalize()[..6]);
        Self::state_dir().join("workspaces").join(key)
    }

    /// Directory for the isolated virtual-environment install
    pub fn venv_dir() -> PathBuf {
        Self::state_dir().join("venv")
    }

    /// Get the activity log path
    pub fn activity_log_path() -> PathBuf {
        Self::state_dir().join("activity.log")
    }

    /// Walk up from `start` looking for a project-local config
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Load configuration, creating default if not exists
    pub async fn load(&self) -> VigilResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> VigilResult<Config> {
        let value = read_toml_value(path).await?;
        value.try_into().map_err(|e: toml::de::Error| VigilError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load the global config with an optional local config merged over it
    pub async fn load_merged(&self, local: Option<&Path>) -> VigilResult<Config> {
        let Some(local) = local else {
            return self.load().await;
        };

        let mut merged = if self.config_path.exists() {
            read_toml_value(&self.config_path).await?
        } else {
            toml::Value::Table(toml::Table::new())
        };
        merge_values(&mut merged, read_toml_value(local).await?);

        merged.try_into().map_err(|e: toml::de::Error| VigilError::ConfigInvalid {
            path: local.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> VigilResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            VigilError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> VigilResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| VigilError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Ensure all state directories exist
    pub async fn ensure_state_dirs() -> VigilResult<()> {
        let dir = Self::state_dir();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| VigilError::io(format!("creating directory {}", dir.display()), e))
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_toml_value(path: &Path) -> VigilResult<toml::Value> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| VigilError::io(format!("reading config from {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| VigilError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Deep-merge `overlay` into `base`; tables merge key by key, everything else replaces
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.scanner.version, "latest");
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.scan.max_concurrent = 4;

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.scan.max_concurrent, 4);
    }

    #[tokio::test]
    async fn local_config_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("config.toml");
        std::fs::write(
            &global,
            "[scanner]\nversion = \"3.0.0\"\nskip_checks = [\"CKV_1\"]\n",
        )
        .unwrap();
        let local = temp.path().join(LOCAL_CONFIG_NAME);
        std::fs::write(&local, "[scanner]\nversion = \"3.1.0\"\n").unwrap();

        let manager = ConfigManager::with_path(global);
        let config = manager.load_merged(Some(&local)).await.unwrap();

        assert_eq!(config.scanner.version, "3.1.0");
        assert_eq!(config.scanner.skip_checks, vec!["CKV_1"]);
    }

    #[tokio::test]
    async fn invalid_config_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[scan]\nmax_concurrent = \"many\"\n").unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(matches!(err, VigilError::ConfigInvalid { .. }));
    }

    #[test]
    fn find_local_config_walks_up() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join(LOCAL_CONFIG_NAME), "").unwrap();

        let found = ConfigManager::find_local_config(&nested).unwrap();
        assert_eq!(found, temp.path().join(LOCAL_CONFIG_NAME));
    }

    #[test]
    #[serial]
    fn state_dir_env_override() {
        let temp = TempDir::new().unwrap();
        std::env::set_var(STATE_DIR_ENV, temp.path());

        assert_eq!(ConfigManager::state_dir(), temp.path());
        assert_eq!(
            ConfigManager::global_state_path(),
            temp.path().join("global.json")
        );
        assert!(ConfigManager::workspace_state_dir(Path::new("/w")).starts_with(temp.path()));

        std::env::set_var(STATE_DIR_ENV, "");
        assert!(ConfigManager::state_dir().ends_with("vigil"));
        std::env::remove_var(STATE_DIR_ENV);
    }

    #[test]
    #[serial]
    fn workspace_state_dir_is_stable() {
        let a = ConfigManager::workspace_state_dir(Path::new("/work/one"));
        let b = ConfigManager::workspace_state_dir(Path::new("/work/one"));
        let c = ConfigManager::workspace_state_dir(Path::new("/work/two"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
