//! Install command - install or update the scanner

use crate::cli::context::AppContext;
use crate::diagnostics::{ConsoleSink, DiagnosticsSink, LogNotifier};
use crate::error::VigilResult;
use crate::ui::{self, TaskSpinner, UiContext};
use std::sync::Arc;

/// Execute the install command
pub async fn execute(ctx: &AppContext) -> VigilResult<()> {
    let ui_ctx = UiContext::detect();
    let sink: Arc<dyn DiagnosticsSink> = Arc::new(ConsoleSink::new());
    let coordinator = ctx.coordinator(sink, Arc::new(LogNotifier)).await?;

    let mut spinner = TaskSpinner::new(&ui_ctx);
    spinner.start(&format!(
        "Installing scanner ({})...",
        ctx.config.scanner.version
    ));

    let installation = match coordinator.install().await {
        Ok(installation) => installation,
        Err(e) => {
            spinner.stop_error("Scanner installation failed");
            return Err(e);
        }
    };
    spinner.stop(&format!("Scanner {} ready", installation.display_version));

    ui::key_value(&ui_ctx, "Method", &installation.method.to_string());
    ui::key_value(&ui_ctx, "Target", &installation.executable_or_image);
    ui::key_value(&ui_ctx, "Version", &installation.resolved_version);

    Ok(())
}
