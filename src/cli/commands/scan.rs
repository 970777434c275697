//! Scan command - scan one file and print its findings

use crate::cli::args::ScanArgs;
use crate::cli::context::AppContext;
use crate::coordinator::{ScanOutcome, ScanTrigger, TriggerKind};
use crate::diagnostics::{ConsoleSink, DiagnosticsSink, JsonLinesSink, Notifier};
use crate::error::{VigilError, VigilResult};
use crate::scan::{is_supported_file, DocumentId};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Execute the scan command
pub async fn execute(args: ScanArgs, ctx: &AppContext) -> VigilResult<()> {
    let file = std::fs::canonicalize(&args.file)
        .map_err(|e| VigilError::io(format!("resolving {}", args.file.display()), e))?;

    if !is_supported_file(&file) {
        return Err(VigilError::User(format!(
            "{} is not a file type the scanner supports",
            file.display()
        )));
    }

    let (sink, notifier): (Arc<dyn DiagnosticsSink>, Arc<dyn Notifier>) = if args.json {
        let sink = Arc::new(JsonLinesSink::stdout());
        (sink.clone(), sink)
    } else {
        let sink = Arc::new(ConsoleSink::new());
        (sink.clone(), sink)
    };

    // A single explicit request has nothing to coalesce with
    let mut settings = ctx.settings();
    settings.debounce = Duration::ZERO;
    let timeout = settings.timeout;
    debug!("Scanning with timeout {:?}", timeout);

    let coordinator = ctx.coordinator_with(settings, sink, notifier).await?;

    let trigger = ScanTrigger::new(
        DocumentId::from_path(&file),
        file.clone(),
        TriggerKind::Command,
    );

    match coordinator.trigger(trigger).await {
        ScanOutcome::Completed { .. } | ScanOutcome::Cached { .. } => Ok(()),
        ScanOutcome::TimedOut => Err(VigilError::User(format!(
            "Scan of {} timed out after {}s",
            file.display(),
            timeout.as_secs()
        ))),
        ScanOutcome::Failed { .. } => Err(VigilError::User(format!(
            "Scan of {} did not complete",
            file.display()
        ))),
        other => Err(VigilError::Internal(format!(
            "unexpected scan outcome: {:?}",
            other
        ))),
    }
}
