//! Version-cache command - forget the resolved `latest` version

use crate::cli::args::{VersionCacheAction, VersionCacheArgs};
use crate::cli::context::AppContext;
use crate::config::ConfigManager;
use crate::error::VigilResult;
use crate::state::GlobalState;
use crate::ui::{self, UiContext};

/// Execute the version-cache command
pub async fn execute(args: VersionCacheArgs, ctx: &AppContext) -> VigilResult<()> {
    match args.action {
        VersionCacheAction::Clear => {
            let path = ConfigManager::global_state_path();
            let mut state = GlobalState::load(&path).await;
            let had_entry = state.version_cache.take().is_some();
            state.save(&path).await?;

            ctx.activity
                .log(
                    "version_cache.cleared",
                    &serde_json::json!({ "had_entry": had_entry }),
                )
                .await;

            let ui_ctx = UiContext::detect();
            if had_entry {
                ui::step_ok(&ui_ctx, "Version cache cleared");
            } else {
                ui::step_ok_detail(&ui_ctx, "Version cache cleared", "was empty");
            }
            Ok(())
        }
    }
}
