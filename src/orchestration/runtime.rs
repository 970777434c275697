//! Container runtime abstraction
//!
//! Provides a trait for the container operations the installer and the scan
//! runner need, implemented over the docker or podman CLI.

use crate::error::VigilResult;
use async_trait::async_trait;

/// Abstract container runtime interface
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check if the engine is installed and answering
    async fn is_available(&self) -> bool;

    /// Pull an image reference (`repo:tag`)
    async fn pull(&self, image: &str) -> VigilResult<()>;

    /// Check whether a tag exists in the registry without pulling it
    async fn manifest_exists(&self, image: &str) -> VigilResult<bool>;

    /// Run a throwaway container and return its trimmed stdout
    async fn run_capture(&self, args: &[String]) -> VigilResult<String>;

    /// Kill a running container by name
    async fn kill(&self, name: &str) -> VigilResult<()>;

    /// Engine binary used for `run` invocations
    fn binary(&self) -> &str;

    /// Get the human-readable runtime name for display
    fn runtime_name(&self) -> &'static str;
}
