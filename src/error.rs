//! Error types for Vigil
//!
//! All modules use `VigilResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Vigil operations
pub type VigilResult<T> = Result<T, VigilError>;

/// All errors that can occur in Vigil
#[derive(Error, Debug)]
pub enum VigilError {
    // Installation errors
    #[error("No scanner available: container, pip, virtualenv and global installs all failed")]
    InstallationExhausted,

    #[error("Version resolution failed: {0}")]
    VersionResolution(String),

    #[error("Image pull failed: {image}: {reason}")]
    ImagePull { image: String, reason: String },

    #[error("Package install failed: {command}: {reason}")]
    PackageInstall { command: String, reason: String },

    // Scan errors
    #[error("Scan of {path} failed: {reason}")]
    ScanProcessFailed { path: PathBuf, reason: String },

    #[error("Scan cancelled")]
    ScanCancelled,

    #[error("Scanner output could not be parsed: {0}")]
    ScanOutput(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid scanner version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Network errors
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl VigilError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a scan failure for a file
    pub fn scan_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ScanProcessFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Cancellation is not a failure and must never reach the user
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::ScanCancelled)
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InstallationExhausted => {
                Some("Install Docker, or Python 3 with pip, then run: vigil install")
            }
            Self::InvalidVersion { .. } => {
                Some("Use 'latest' or a semantic version such as 3.2.1 in scanner.version")
            }
            Self::ImagePull { .. } => Some("Check that the container engine is running"),
            Self::NetworkUnavailable(_) => Some("Bundled severity mappings will be used"),
            _ => None,
        }
    }
}
