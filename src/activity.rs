//! Activity log
//!
//! Appends JSON lines to `activity.log` under the state directory: installs,
//! scan outcomes and cache clears. Write failures are logged and dropped.

use crate::config::{schema::Config, ConfigManager};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// File-based logger that appends JSON lines
#[derive(Debug, Clone)]
pub struct ActivityLog {
    enabled: bool,
    path: PathBuf,
}

impl ActivityLog {
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.activity_log,
            path: ConfigManager::activity_log_path(),
        }
    }

    pub fn at(path: PathBuf, enabled: bool) -> Self {
        Self { enabled, path }
    }

    /// Logger that records nothing
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an event
    pub async fn log(&self, event: &str, data: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize activity event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write activity log: {}", e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }

    /// Last `n` lines of the log, oldest first
    pub async fn tail(&self, n: usize) -> std::io::Result<Vec<String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let lines: Vec<&str> = content.lines().collect();
        let skip = lines.len().saturating_sub(n);
        Ok(lines[skip..].iter().map(|l| l.to_string()).collect())
    }
}
