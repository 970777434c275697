//! Docker/Podman CLI container runtime
//!
//! Implements the ContainerRuntime trait by shelling out to the engine
//! binary. Docker and Podman share the subset of flags used here.

use crate::error::{VigilError, VigilResult};
use crate::orchestration::runtime::ContainerRuntime;
use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Supported container engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Docker,
    Podman,
}

impl Engine {
    /// Engine binary name
    pub fn binary(&self) -> &'static str {
        match self {
            Engine::Docker => "docker",
            Engine::Podman => "podman",
        }
    }

    /// Get a human-readable engine name
    pub fn name(&self) -> &'static str {
        match self {
            Engine::Docker => "Docker",
            Engine::Podman => "Podman",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// Container runtime driving an engine CLI
pub struct CliRuntime {
    engine: Engine,
}

impl CliRuntime {
    /// Create a runtime for the given engine
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Execute an engine command and return the output
    async fn exec(&self, args: &[&str]) -> VigilResult<std::process::Output> {
        debug!("Executing: {} {:?}", self.engine, args);

        Command::new(self.engine.binary())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| VigilError::command_failed(format!("{} {:?}", self.engine, args), e))
    }
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    async fn is_available(&self) -> bool {
        // `info` talks to the daemon; `--version` alone succeeds with it stopped
        Command::new(self.engine.binary())
            .arg("info")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn pull(&self, image: &str) -> VigilResult<()> {
        info!("Pulling image: {}", image);

        let output = self.exec(&["pull", image]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(VigilError::ImagePull {
                image: image.to_string(),
                reason: stderr.trim().to_string(),
            })
        }
    }

    async fn manifest_exists(&self, image: &str) -> VigilResult<bool> {
        let output = self.exec(&["manifest", "inspect", image]).await?;
        Ok(output.status.success())
    }

    async fn run_capture(&self, args: &[String]) -> VigilResult<String> {
        let mut full = vec!["run", "--rm"];
        full.extend(args.iter().map(String::as_str));

        let output = self.exec(&full).await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(VigilError::command_exec(
                format!("{} run", self.engine),
                stderr.trim(),
            ))
        }
    }

    async fn kill(&self, name: &str) -> VigilResult<()> {
        debug!("Killing container: {}", name);

        let output = self.exec(&["kill", name]).await?;

        if output.status.success() {
            Ok(())
        } else {
            // Already exited containers are removed by --rm
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.to_lowercase().contains("no such container") {
                Ok(())
            } else {
                Err(VigilError::command_exec(format!("{} kill", self.engine), stderr))
            }
        }
    }

    fn binary(&self) -> &str {
        self.engine.binary()
    }

    fn runtime_name(&self) -> &'static str {
        self.engine.name()
    }
}
