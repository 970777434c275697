//! Scanner command line construction
//!
//! Containerized runs mount the workspace (or the file's directory when the
//! file lives outside it) at [`CONTAINER_WORKDIR`] and translate the file
//! path accordingly. Native runs pass the host path through.

use crate::error::{VigilError, VigilResult};
use crate::installer::{InstallMethod, ScannerInstallation};
use crate::scan::request::ScanRequest;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// Mount point of the scanned directory inside the container
pub const CONTAINER_WORKDIR: &str = "/scan";
const CONTAINER_CERT_PATH: &str = "/certs/ca.pem";
const CONTAINER_CHECKS_DIR: &str = "/external-checks";

/// A fully built scanner command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Set for containerized runs so the container can be killed by name
    pub container_name: Option<String>,
}

impl Invocation {
    /// Human-readable command line for logs
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            if arg.contains(' ') {
                line.push_str(&format!(" \"{}\"", arg));
            } else {
                line.push(' ');
                line.push_str(arg);
            }
        }
        line
    }
}

/// Host directory to mount and the file's path inside the container
pub fn container_paths(file: &Path, workspace: Option<&Path>) -> (PathBuf, String) {
    if let Some(root) = workspace {
        if let Ok(relative) = file.strip_prefix(root) {
            return (root.to_path_buf(), join_container_path(relative));
        }
    }

    let parent = file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    (parent, format!("{}/{}", CONTAINER_WORKDIR, name))
}

fn join_container_path(relative: &Path) -> String {
    let mut out = CONTAINER_WORKDIR.to_string();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            out.push('/');
            out.push_str(&part.to_string_lossy());
        }
    }
    out
}

/// Build the command for one scan
///
/// `engine` is the container engine binary and is required for container
/// installations.
pub fn build_invocation(
    installation: &ScannerInstallation,
    request: &ScanRequest,
    repo_id: &str,
    engine: Option<&str>,
) -> VigilResult<Invocation> {
    let settings = &request.settings;
    let mut env = vec![
        ("BC_SOURCE".to_string(), "vigil".to_string()),
        (
            "BC_SOURCE_VERSION".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        ),
    ];
    if settings.debug_logs {
        env.push(("LOG_LEVEL".to_string(), "DEBUG".to_string()));
    }

    let (program, mut args, target, certificate, checks_dir, container_name) =
        match installation.method {
            InstallMethod::Container => {
                let engine = engine.ok_or_else(|| {
                    VigilError::Internal("container installation without an engine".to_string())
                })?;
                let name = format!("vigil-{}", Uuid::new_v4().simple());
                let (mount, target) =
                    container_paths(&request.file_path, request.workspace_root.as_deref());

                let mut args = vec![
                    "run".to_string(),
                    "--rm".to_string(),
                    "--name".to_string(),
                    name.clone(),
                ];
                // Container env goes on the command line, not the engine process
                for (key, value) in env.drain(..) {
                    args.push("--env".to_string());
                    args.push(format!("{}={}", key, value));
                }
                args.push("-v".to_string());
                args.push(format!("{}:{}", mount.display(), CONTAINER_WORKDIR));
                args.push("-w".to_string());
                args.push(CONTAINER_WORKDIR.to_string());

                let certificate = settings.certificate.as_ref().map(|cert| {
                    args.push("-v".to_string());
                    args.push(format!("{}:{}:ro", cert.display(), CONTAINER_CERT_PATH));
                    CONTAINER_CERT_PATH.to_string()
                });
                let checks_dir = settings.external_checks_dir.as_ref().map(|dir| {
                    args.push("-v".to_string());
                    args.push(format!("{}:{}:ro", dir.display(), CONTAINER_CHECKS_DIR));
                    CONTAINER_CHECKS_DIR.to_string()
                });

                args.push(installation.executable_or_image.clone());
                (engine.to_string(), args, target, certificate, checks_dir, Some(name))
            }
            InstallMethod::LocalPackage | InstallMethod::VirtualEnv | InstallMethod::Global => (
                installation.executable_or_image.clone(),
                Vec::new(),
                request.file_path.to_string_lossy().to_string(),
                settings
                    .certificate
                    .as_ref()
                    .map(|c| c.to_string_lossy().to_string()),
                settings
                    .external_checks_dir
                    .as_ref()
                    .map(|d| d.to_string_lossy().to_string()),
                None,
            ),
        };

    args.extend([
        "-f".to_string(),
        target,
        "-s".to_string(),
        "--repo-id".to_string(),
        repo_id.to_string(),
        "-o".to_string(),
        "json".to_string(),
        "--quiet".to_string(),
    ]);

    if !settings.frameworks.is_empty() {
        args.push("--framework".to_string());
        args.extend(settings.frameworks.iter().cloned());
    }
    if !settings.skip_frameworks.is_empty() {
        args.push("--skip-framework".to_string());
        args.extend(settings.skip_frameworks.iter().cloned());
    }
    if !settings.skip_checks.is_empty() {
        args.push("--skip-check".to_string());
        args.push(settings.skip_checks.join(","));
    }
    if let Some(dir) = checks_dir {
        args.push("--external-checks-dir".to_string());
        args.push(dir);
    }
    if let Some(cert) = certificate {
        args.push("--ca-certificate".to_string());
        args.push(cert);
    }
    if settings.use_bc_ids {
        args.push("--output-bc-ids".to_string());
    }

    Ok(Invocation {
        program,
        args,
        env,
        container_name,
    })
}
