//! Scan requests and the settings that shape a scanner invocation

use crate::config::schema::ScannerConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Identity of an editor document (typically its URI)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Document identity for a file on disk
    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Per-run scanner options derived from configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSettings {
    pub certificate: Option<PathBuf>,
    pub frameworks: Vec<String>,
    pub skip_frameworks: Vec<String>,
    pub skip_checks: Vec<String>,
    pub external_checks_dir: Option<PathBuf>,
    pub use_bc_ids: bool,
    pub debug_logs: bool,
}

impl From<&ScannerConfig> for ScanSettings {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            certificate: config.certificate.clone(),
            frameworks: clean_list(&config.frameworks),
            skip_frameworks: clean_list(&config.skip_frameworks),
            skip_checks: clean_list(&config.skip_checks),
            external_checks_dir: config.external_checks_dir.clone(),
            use_bc_ids: config.use_bc_ids,
            debug_logs: config.debug_logs,
        }
    }
}

fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// One scan of one document
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub document: DocumentId,
    pub file_path: PathBuf,
    /// Workspace root, used as the container mount when it contains the file
    pub workspace_root: Option<PathBuf>,
    pub settings: Arc<ScanSettings>,
    pub cancel: CancellationToken,
}

impl ScanRequest {
    pub fn new(
        document: DocumentId,
        file_path: PathBuf,
        workspace_root: Option<PathBuf>,
        settings: Arc<ScanSettings>,
    ) -> Self {
        Self {
            document,
            file_path,
            workspace_root,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// File types the scanner understands
pub fn is_supported_file(path: &Path) -> bool {
    const EXTENSIONS: &[&str] = &[
        "tf", "tfvars", "hcl", "yml", "yaml", "json", "template", "bicep", "cfn", "dockerfile",
    ];

    let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
        return false;
    };

    if name.starts_with("dockerfile") {
        return true;
    }

    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_files() {
        assert!(is_supported_file(Path::new("/w/main.tf")));
        assert!(is_supported_file(Path::new("/w/k8s/deploy.YAML")));
        assert!(is_supported_file(Path::new("/w/Dockerfile")));
        assert!(is_supported_file(Path::new("/w/Dockerfile.prod")));
        assert!(is_supported_file(Path::new("/w/api.dockerfile")));
        assert!(!is_supported_file(Path::new("/w/README.md")));
        assert!(!is_supported_file(Path::new("/w/src/main.rs")));
        assert!(!is_supported_file(Path::new("/")));
    }

    #[test]
    fn settings_from_config_drop_blank_entries() {
        let config = ScannerConfig {
            skip_checks: vec!["CKV_AWS_1".to_string(), " ".to_string()],
            frameworks: vec![" terraform ".to_string()],
            debug_logs: true,
            ..ScannerConfig::default()
        };
        let settings = ScanSettings::from(&config);
        assert_eq!(settings.skip_checks, vec!["CKV_AWS_1"]);
        assert_eq!(settings.frameworks, vec!["terraform"]);
        assert!(settings.debug_logs);
    }

    #[test]
    fn request_starts_live() {
        let request = ScanRequest::new(
            DocumentId::from("file:///w/main.tf"),
            PathBuf::from("/w/main.tf"),
            None,
            Arc::new(ScanSettings::default()),
        );
        assert!(!request.is_cancelled());
        request.cancel.cancel();
        assert!(request.is_cancelled());
    }
}
