//! Runtime factory for creating the configured container runtime
//!
//! Provides engine detection and runtime instantiation.

use crate::config::schema::ScannerConfig;
use crate::error::{VigilError, VigilResult};
use crate::orchestration::engine::{CliRuntime, Engine};
use crate::orchestration::runtime::ContainerRuntime;
use std::sync::Arc;
use tracing::debug;

/// Engine selection from `scanner.engine`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineChoice {
    /// Docker if available, otherwise Podman
    Auto,
    /// A specific engine
    Only(Engine),
    /// Never use containers
    Disabled,
}

impl EngineChoice {
    /// Parse the configured value
    pub fn parse(value: &str) -> VigilResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "docker" => Ok(Self::Only(Engine::Docker)),
            "podman" => Ok(Self::Only(Engine::Podman)),
            "none" => Ok(Self::Disabled),
            other => Err(VigilError::User(format!(
                "Unknown container engine '{}'. Valid values: auto, docker, podman, none",
                other
            ))),
        }
    }

    /// Engines to probe, in order
    fn candidates(&self) -> &'static [Engine] {
        match self {
            Self::Auto => &[Engine::Docker, Engine::Podman],
            Self::Only(Engine::Docker) => &[Engine::Docker],
            Self::Only(Engine::Podman) => &[Engine::Podman],
            Self::Disabled => &[],
        }
    }
}

/// Create a container runtime for the first available engine
///
/// # Returns
/// * `Ok(Some(runtime))` - An engine is installed and running
/// * `Ok(None)` - Containers are disabled or no engine answers
/// * `Err` - If `scanner.engine` is not a known value
pub async fn create_runtime(
    config: &ScannerConfig,
) -> VigilResult<Option<Arc<dyn ContainerRuntime>>> {
    let choice = EngineChoice::parse(&config.engine)?;

    for engine in choice.candidates() {
        let runtime = CliRuntime::new(*engine);
        if runtime.is_available().await {
            debug!("Using container engine: {}", engine.name());
            return Ok(Some(Arc::new(runtime)));
        }
        debug!("Container engine {} not available", engine.name());
    }

    Ok(None)
}
