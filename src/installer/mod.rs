//! Scanner installation
//!
//! Strategies are tried in order until one yields a runnable scanner:
//!
//! 1. Container image (pull, falling back once to the `latest` tag)
//! 2. User-local pip install (`pip3`, falling back once to `pip`)
//! 3. Isolated virtual environment under the state directory
//! 4. A scanner already on `PATH` (used with a warning)

mod exec;
pub mod version;

pub use exec::{CommandExecutor, ExecOutput, SystemExecutor};
pub use version::{
    validate_requested_version, ResolvedVersion, VersionCache, VersionCacheEntry,
    VersionResolver, LATEST,
};

use crate::config::schema::ScannerConfig;
use crate::error::{VigilError, VigilResult};
use crate::orchestration::ContainerRuntime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How the scanner was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallMethod {
    Container,
    LocalPackage,
    VirtualEnv,
    /// Pre-existing executable found on `PATH`
    Global,
}

impl InstallMethod {
    /// Whether scans run inside a container
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Container)
    }
}

impl fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Container => "container",
            Self::LocalPackage => "local package",
            Self::VirtualEnv => "virtual environment",
            Self::Global => "global executable",
        };
        f.write_str(name)
    }
}

/// A runnable scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerInstallation {
    pub method: InstallMethod,
    /// Executable path, or `image:tag` for containers
    pub executable_or_image: String,
    /// Tag or version actually invoked
    pub resolved_version: String,
    /// Version shown to the user
    pub display_version: String,
}

/// Installs the scanner using the first strategy that works
pub struct Installer {
    config: ScannerConfig,
    runtime: Option<Arc<dyn ContainerRuntime>>,
    executor: Arc<dyn CommandExecutor>,
    version_cache: Arc<VersionCache>,
    venv_dir: PathBuf,
}

impl Installer {
    pub fn new(
        config: ScannerConfig,
        runtime: Option<Arc<dyn ContainerRuntime>>,
        executor: Arc<dyn CommandExecutor>,
        version_cache: Arc<VersionCache>,
        venv_dir: PathBuf,
    ) -> Self {
        Self {
            config,
            runtime,
            executor,
            version_cache,
            venv_dir,
        }
    }

    pub fn runtime(&self) -> Option<&Arc<dyn ContainerRuntime>> {
        self.runtime.as_ref()
    }

    pub fn version_cache(&self) -> &Arc<VersionCache> {
        &self.version_cache
    }

    /// Forget the cached `latest` resolution
    pub fn clear_version_cache(&self) {
        self.version_cache.clear();
        info!("Version cache cleared");
    }

    /// Make sure a scanner is available
    pub async fn ensure_installed(&self, requested: &str) -> VigilResult<ScannerInstallation> {
        validate_requested_version(requested)?;

        if let Some(runtime) = &self.runtime {
            match self.install_container(runtime.as_ref(), requested).await {
                Ok(installation) => return Ok(installation),
                Err(e) => warn!("Container install failed: {}", e),
            }
        } else {
            debug!("No container engine available, skipping container install");
        }

        match self.install_user_package(requested).await {
            Ok(installation) => return Ok(installation),
            Err(e) => warn!("pip install failed: {}", e),
        }

        match self.install_virtualenv(requested).await {
            Ok(installation) => return Ok(installation),
            Err(e) => warn!("Virtual environment install failed: {}", e),
        }

        if let Some(installation) = self.probe_global().await {
            warn!(
                "Using pre-installed {} {}; it may not match the requested version",
                self.config.executable, installation.display_version
            );
            return Ok(installation);
        }

        Err(VigilError::InstallationExhausted)
    }

    async fn install_container(
        &self,
        runtime: &dyn ContainerRuntime,
        requested: &str,
    ) -> VigilResult<ScannerInstallation> {
        let resolver = VersionResolver::new(
            runtime,
            &self.version_cache,
            &self.config.image,
            &self.config.executable,
        );
        let resolved = resolver.resolve(requested).await;
        let image = format!("{}:{}", self.config.image, resolved.resolved_version);

        match runtime.pull(&image).await {
            Ok(()) => {
                info!("Scanner image ready: {}", image);
                Ok(ScannerInstallation {
                    method: InstallMethod::Container,
                    executable_or_image: image,
                    resolved_version: resolved.resolved_version,
                    display_version: resolved.version,
                })
            }
            Err(e) if resolved.resolved_version != LATEST => {
                warn!("Pull of {} failed ({}), retrying with {}", image, e, LATEST);
                self.version_cache.clear();

                let latest = format!("{}:{}", self.config.image, LATEST);
                runtime.pull(&latest).await?;
                info!("Scanner image ready: {}", latest);

                Ok(ScannerInstallation {
                    method: InstallMethod::Container,
                    executable_or_image: latest,
                    resolved_version: LATEST.to_string(),
                    display_version: resolved.version,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn install_user_package(&self, requested: &str) -> VigilResult<ScannerInstallation> {
        let args = vec![
            "install".to_string(),
            "--user".to_string(),
            "-U".to_string(),
            package_spec(&self.config.package, requested),
        ];

        let primary_ok = matches!(self.executor.run("pip3", &args).await, Ok(ref out) if out.success);
        if !primary_ok {
            debug!("pip3 install failed, retrying with pip");
            let fallback = self.executor.run("pip", &args).await?;
            if !fallback.success {
                return Err(VigilError::PackageInstall {
                    command: "pip install --user".to_string(),
                    reason: fallback.stderr.trim().to_string(),
                });
            }
        }

        let user_base = self
            .executor
            .run(
                "python3",
                &[
                    "-c".to_string(),
                    "import site; print(site.USER_BASE)".to_string(),
                ],
            )
            .await?;
        if !user_base.success || user_base.stdout_trimmed().is_empty() {
            return Err(VigilError::PackageInstall {
                command: "python3 -c site.USER_BASE".to_string(),
                reason: user_base.stderr.trim().to_string(),
            });
        }

        let executable = scripts_dir(Path::new(user_base.stdout_trimmed()))
            .join(executable_file_name(&self.config.executable));
        self.finish_native(InstallMethod::LocalPackage, executable)
            .await
    }

    async fn install_virtualenv(&self, requested: &str) -> VigilResult<ScannerInstallation> {
        let venv = self.venv_dir.to_string_lossy().to_string();
        let created = self
            .executor
            .run(
                "python3",
                &["-m".to_string(), "venv".to_string(), venv.clone()],
            )
            .await?;
        if !created.success {
            return Err(VigilError::PackageInstall {
                command: format!("python3 -m venv {}", venv),
                reason: created.stderr.trim().to_string(),
            });
        }

        let pip = scripts_dir(&self.venv_dir).join(executable_file_name("pip"));
        let pip = pip.to_string_lossy().to_string();
        let installed = self
            .executor
            .run(
                &pip,
                &[
                    "install".to_string(),
                    "-U".to_string(),
                    package_spec(&self.config.package, requested),
                ],
            )
            .await?;
        if !installed.success {
            return Err(VigilError::PackageInstall {
                command: format!("{} install", pip),
                reason: installed.stderr.trim().to_string(),
            });
        }

        let executable =
            scripts_dir(&self.venv_dir).join(executable_file_name(&self.config.executable));
        self.finish_native(InstallMethod::VirtualEnv, executable)
            .await
    }

    async fn probe_global(&self) -> Option<ScannerInstallation> {
        let version = self.probe_version(&self.config.executable).await?;
        Some(ScannerInstallation {
            method: InstallMethod::Global,
            executable_or_image: self.config.executable.clone(),
            resolved_version: version.clone(),
            display_version: version,
        })
    }

    /// Accept a package install only once its executable answers `--version`
    async fn finish_native(
        &self,
        method: InstallMethod,
        executable: PathBuf,
    ) -> VigilResult<ScannerInstallation> {
        let executable = executable.to_string_lossy().to_string();
        let Some(version) = self.probe_version(&executable).await else {
            return Err(VigilError::PackageInstall {
                command: format!("{} --version", executable),
                reason: "installed executable did not report a version".to_string(),
            });
        };

        info!("Scanner installed via {}: {} ({})", method, executable, version);
        Ok(ScannerInstallation {
            method,
            executable_or_image: executable,
            resolved_version: version.clone(),
            display_version: version,
        })
    }

    async fn probe_version(&self, executable: &str) -> Option<String> {
        let output = self
            .executor
            .run(executable, &["--version".to_string()])
            .await
            .ok()?;
        if !output.success {
            return None;
        }
        version::parse_version_output(&output.stdout).ok()
    }
}

/// `pkg` or `pkg==version`
fn package_spec(package: &str, requested: &str) -> String {
    if requested == LATEST {
        package.to_string()
    } else {
        format!("{}=={}", package, requested)
    }
}

/// Directory pip places console scripts in under a prefix
fn scripts_dir(prefix: &Path) -> PathBuf {
    if cfg!(windows) {
        prefix.join("Scripts")
    } else {
        prefix.join("bin")
    }
}

fn executable_file_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}
