//! Info command - show scanner installation and cache state

use crate::cache::ResultCache;
use crate::cli::context::AppContext;
use crate::config::ConfigManager;
use crate::error::VigilResult;
use crate::state::GlobalState;
use crate::ui::{self, UiContext};

/// Execute the info command
pub async fn execute(ctx: &AppContext) -> VigilResult<()> {
    let ui_ctx = UiContext::detect();
    let state = GlobalState::load(&ConfigManager::global_state_path()).await;

    ui::section("Scanner");
    ui::key_value(&ui_ctx, "Requested", &ctx.config.scanner.version);
    match state.installation {
        Some(ref installation) => {
            ui::key_value(&ui_ctx, "Installed", &installation.display_version);
            ui::key_value(&ui_ctx, "Method", &installation.method.to_string());
            ui::key_value(&ui_ctx, "Target", &installation.executable_or_image);
            if let Some(at) = state.installed_at {
                ui::key_value(&ui_ctx, "Since", &at.to_rfc3339());
            }
        }
        None => ui::step_warn_hint(&ui_ctx, "Not installed", "Run: vigil install"),
    }
    match state.version_cache {
        Some(ref entry) => ui::key_value(
            &ui_ctx,
            "Cached latest",
            &format!(
                "{} (resolved {})",
                entry.display_version,
                entry.timestamp.to_rfc3339()
            ),
        ),
        None => ui::key_value(&ui_ctx, "Cached latest", "none"),
    }

    println!();
    ui::section("Workspace");
    let ws = ctx.workspace_state();
    let results = ResultCache::load(&ws.results_path()).await;
    ui::key_value(&ui_ctx, "Root", &ctx.workspace.display().to_string());
    ui::key_value(&ui_ctx, "Cached results", &results.total_entries().to_string());
    if let Some(date) = results.cache_date() {
        ui::key_value(&ui_ctx, "Cache date", &date.to_string());
    }
    ui::key_value(&ui_ctx, "State", &ws.dir().display().to_string());

    println!();
    ui::section("Paths");
    ui::key_value(&ui_ctx, "State dir", &ConfigManager::state_dir().display().to_string());
    ui::key_value(&ui_ctx, "Activity log", &ctx.activity.path().display().to_string());

    Ok(())
}
