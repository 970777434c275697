//! Configuration schema for Vigil
//!
//! Configuration is stored at `~/.config/vigil/config.toml`, with an optional
//! project-local `.vigil.toml` merged on top.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Scanner installation and invocation settings
    pub scanner: ScannerConfig,

    /// Scheduling settings
    pub scan: ScanConfig,

    /// User notification settings
    pub notifications: NotificationsConfig,

    /// Result cache settings
    pub cache: CacheConfig,

    /// Severity enrichment settings
    pub severity: SeverityConfig,
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Write scan and install events to the activity log
    pub activity_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            activity_log: true,
        }
    }
}

/// Scanner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Version pin: "latest" or a semantic version
    pub version: String,

    /// Container image (without tag)
    pub image: String,

    /// Python package name used by pip and virtualenv installs
    pub package: String,

    /// Executable name
    pub executable: String,

    /// Container engine: "auto", "docker", "podman" or "none"
    pub engine: String,

    /// CA certificate passed to the scanner
    pub certificate: Option<PathBuf>,

    /// Only run these frameworks
    pub frameworks: Vec<String>,

    /// Skip these frameworks
    pub skip_frameworks: Vec<String>,

    /// Skip these check IDs
    pub skip_checks: Vec<String>,

    /// Directory with custom checks
    pub external_checks_dir: Option<PathBuf>,

    /// Report platform IDs instead of check IDs
    pub use_bc_ids: bool,

    /// Run the scanner with debug logging
    pub debug_logs: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            version: "latest".to_string(),
            image: "bridgecrew/checkov".to_string(),
            package: "checkov".to_string(),
            executable: "checkov".to_string(),
            engine: "auto".to_string(),
            certificate: None,
            frameworks: vec![],
            skip_frameworks: vec![],
            skip_checks: vec![],
            external_checks_dir: None,
            use_bc_ids: false,
            debug_logs: false,
        }
    }
}

/// Scan scheduling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Maximum simultaneously running scans
    pub max_concurrent: usize,

    /// Per-scan wall clock timeout in seconds
    pub timeout_secs: u64,

    /// Debounce window for repeated triggers in milliseconds
    pub debounce_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            timeout_secs: 60,
            debounce_ms: 300,
        }
    }
}

/// Notification settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Suppress user-facing error messages
    pub disable_error_messages: bool,
}

/// Result cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Clear cached results when scanner settings change
    pub clear_on_config_change: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            clear_on_config_change: true,
        }
    }
}

/// Severity mapping settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityConfig {
    /// Remote mapping document; empty uses the bundled table only
    pub mapping_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[scanner]"));
        assert!(toml.contains("[scan]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.scanner.version, "latest");
        assert_eq!(config.scan.max_concurrent, 1);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [scanner]
            version = "3.2.1"
            skip_checks = ["CKV_AWS_1"]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.scanner.version, "3.2.1");
        assert_eq!(config.scanner.skip_checks, vec!["CKV_AWS_1"]);
        assert_eq!(config.scanner.image, "bridgecrew/checkov"); // default preserved
        assert_eq!(config.scan.timeout_secs, 60);
    }
}
