//! Serve command - editor bridge over stdin/stdout
//!
//! Each stdin line is a JSON event tagged by `type`. Diagnostics and
//! notifications are written to stdout as JSON lines.

use crate::cli::context::AppContext;
use crate::coordinator::{ScanCoordinator, ScanOutcome, ScanTrigger, TriggerKind};
use crate::diagnostics::{JsonLinesSink, Notifier};
use crate::error::{VigilError, VigilResult};
use crate::scan::DocumentId;
use serde::Deserialize;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// An editor event
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Scan {
        path: PathBuf,
        #[serde(default)]
        document: Option<String>,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        kind: Option<TriggerKind>,
    },
    /// The editor focused another file
    Focus { path: PathBuf },
    RemoveDiagnostics,
    ClearCache,
    ClearVersionCache,
    Install,
    Shutdown,
}

impl Event {
    pub fn parse(line: &str) -> VigilResult<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Execute the serve command
pub async fn execute(ctx: &AppContext) -> VigilResult<()> {
    let out = Arc::new(JsonLinesSink::stdout());
    let coordinator = Arc::new(ctx.coordinator(out.clone(), out.clone()).await?);
    let notifier: Arc<dyn Notifier> = out;

    info!("Serving workspace {}", ctx.workspace.display());
    ctx.activity
        .log("serve.started", &serde_json::json!({ "workspace": ctx.workspace }))
        .await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = line.map_err(|e| VigilError::io("reading stdin", e))?;
                let Some(line) = line else {
                    debug!("stdin closed");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match Event::parse(line) {
                    Ok(event) => {
                        if handle(event, &coordinator, &mut tasks).await.is_break() {
                            break;
                        }
                    }
                    Err(e) => notifier.warn(&format!("Ignoring malformed event: {}", e)),
                }
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    warn!("Scan task failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    coordinator.shutdown();
    while tasks.join_next().await.is_some() {}

    ctx.activity
        .log("serve.stopped", &serde_json::json!({ "workspace": ctx.workspace }))
        .await;
    Ok(())
}

async fn handle(
    event: Event,
    coordinator: &Arc<ScanCoordinator>,
    tasks: &mut JoinSet<()>,
) -> ControlFlow<()> {
    match event {
        Event::Scan {
            path,
            document,
            content,
            kind,
        } => {
            let document = document
                .map(DocumentId::new)
                .unwrap_or_else(|| DocumentId::from_path(&path));
            let mut trigger = ScanTrigger::new(document, path, kind.unwrap_or(TriggerKind::Change));
            if let Some(content) = content {
                trigger = trigger.with_content(content);
            }

            let coordinator = Arc::clone(coordinator);
            tasks.spawn(async move {
                let document = trigger.document.clone();
                let outcome = coordinator.trigger(trigger).await;
                match outcome {
                    ScanOutcome::Failed { ref reason } => {
                        debug!("Scan of {} failed: {}", document, reason)
                    }
                    ref other => debug!("Scan of {} ended: {:?}", document, other),
                }
            });
        }
        Event::Focus { path } => coordinator.focus_changed(&path),
        Event::RemoveDiagnostics => coordinator.remove_diagnostics().await,
        Event::ClearCache => coordinator.clear_results_cache().await,
        Event::ClearVersionCache => coordinator.clear_version_cache().await,
        Event::Install => {
            let coordinator = Arc::clone(coordinator);
            tasks.spawn(async move {
                if let Err(e) = coordinator.install().await {
                    warn!("Install failed: {}", e);
                }
            });
        }
        Event::Shutdown => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}
