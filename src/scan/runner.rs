//! Scanner process execution
//!
//! A run streams the scanner's stdout through an [`OutputCollector`] while
//! racing the request's cancellation token. Cancelling kills the container
//! by name or signals the native process group, then reaps it.

use crate::error::{VigilError, VigilResult};
use crate::installer::{CommandExecutor, ScannerInstallation};
use crate::orchestration::{error_tail, ContainerRuntime};
use crate::scan::finding::Finding;
use crate::scan::invocation::{build_invocation, Invocation};
use crate::scan::output::OutputCollector;
use crate::scan::repo::detect_repo_id;
use crate::scan::request::ScanRequest;
use crate::severity::SeverityMap;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Time a signalled native process gets before it is killed outright
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

/// Executes one scan
#[async_trait]
pub trait ScanRunner: Send + Sync {
    /// Fails with [`VigilError::ScanCancelled`] when the request's token fires
    async fn run(
        &self,
        installation: &ScannerInstallation,
        request: &ScanRequest,
    ) -> VigilResult<Vec<Finding>>;
}

/// Runner that spawns the scanner as an OS process
pub struct ProcessRunner {
    runtime: Option<Arc<dyn ContainerRuntime>>,
    executor: Arc<dyn CommandExecutor>,
    severities: Arc<SeverityMap>,
    kill_grace: Duration,
}

impl ProcessRunner {
    pub fn new(
        runtime: Option<Arc<dyn ContainerRuntime>>,
        executor: Arc<dyn CommandExecutor>,
        severities: Arc<SeverityMap>,
    ) -> Self {
        Self {
            runtime,
            executor,
            severities,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    fn enrich(&self, findings: &mut [Finding]) {
        for finding in findings.iter_mut().filter(|f| f.severity.is_none()) {
            finding.severity = self.severities.get(&finding.check_id);
        }
    }

    async fn terminate(&self, child: &mut Child, invocation: &Invocation) {
        if let (Some(name), Some(runtime)) = (&invocation.container_name, &self.runtime) {
            debug!("Killing container {}", name);
            if let Err(e) = runtime.kill(name).await {
                warn!("Failed to kill container {}: {}", name, e);
            }
        }

        let pid = child.id();
        signal_group(pid, Signal::Terminate);

        match tokio::time::timeout(self.kill_grace, child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                debug!("Scanner ignored SIGTERM, killing");
                signal_group(pid, Signal::Kill);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill scanner process: {}", e);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

/// Signal the scanner and everything it spawned. The child leads its own
/// process group, so the negated pid addresses the whole tree.
#[cfg(unix)]
fn signal_group(pid: Option<u32>, signal: Signal) {
    let Some(pid) = pid else {
        return;
    };
    let signal = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: the group was created at spawn and its leader is not yet reaped
    unsafe {
        libc::kill(-(pid as libc::pid_t), signal);
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: Option<u32>, _signal: Signal) {}

#[async_trait]
impl ScanRunner for ProcessRunner {
    async fn run(
        &self,
        installation: &ScannerInstallation,
        request: &ScanRequest,
    ) -> VigilResult<Vec<Finding>> {
        if request.is_cancelled() {
            return Err(VigilError::ScanCancelled);
        }

        let repo_id = detect_repo_id(self.executor.as_ref(), &request.file_path).await;
        let engine = self.runtime.as_ref().map(|r| r.binary().to_string());
        let invocation = build_invocation(installation, request, &repo_id, engine.as_deref())?;

        info!("Scanning {}", request.file_path.display());
        debug!("Running: {}", invocation.display());

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| VigilError::command_failed(invocation.display(), e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VigilError::Internal("scanner stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| VigilError::Internal("scanner stderr not captured".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut text = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                text.push_str(&line);
                text.push('\n');
            }
            text
        });

        let mut collector = OutputCollector::new();
        let mut lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
                biased;
                _ = request.cancel.cancelled() => {
                    self.terminate(&mut child, &invocation).await;
                    stderr_task.abort();
                    return Err(VigilError::ScanCancelled);
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => collector.push_line(&line),
                    Ok(None) => break,
                    Err(e) => {
                        self.terminate(&mut child, &invocation).await;
                        stderr_task.abort();
                        return Err(VigilError::io("reading scanner output", e));
                    }
                },
            }
        }

        let status = tokio::select! {
            biased;
            _ = request.cancel.cancelled() => {
                self.terminate(&mut child, &invocation).await;
                stderr_task.abort();
                return Err(VigilError::ScanCancelled);
            }
            status = child.wait() => status
                .map_err(|e| VigilError::command_failed(invocation.display(), e))?,
        };

        let stderr_text = stderr_task.await.unwrap_or_default();

        if request.is_cancelled() {
            return Err(VigilError::ScanCancelled);
        }

        if !status.success() {
            let reason = match status.code() {
                Some(code) => format!("exit code {}: {}", code, error_tail("", &stderr_text)),
                None => format!("terminated by signal: {}", error_tail("", &stderr_text)),
            };
            return Err(VigilError::scan_failed(&request.file_path, reason));
        }

        let skipped = collector.skipped_lines();
        let checks = collector
            .finish()
            .map_err(|e| VigilError::scan_failed(&request.file_path, e.to_string()))?;
        debug!("Scanner emitted {} failed checks ({} noise lines)", checks.len(), skipped);

        let mut findings: Vec<Finding> = checks
            .into_iter()
            .map(|check| check.into_finding(&request.file_path))
            .collect();
        self.enrich(&mut findings);

        Ok(findings)
    }
}
