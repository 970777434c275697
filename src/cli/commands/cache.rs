//! Cache command - manage cached scan results

use crate::cache::ResultCache;
use crate::cli::args::{CacheAction, CacheArgs};
use crate::cli::context::AppContext;
use crate::error::VigilResult;
use crate::ui::{self, UiContext};

/// Execute the cache command
pub async fn execute(args: CacheArgs, ctx: &AppContext) -> VigilResult<()> {
    match args.action {
        CacheAction::Clear => clear(ctx).await,
    }
}

async fn clear(ctx: &AppContext) -> VigilResult<()> {
    let path = ctx.workspace_state().results_path();
    let mut cache = ResultCache::load(&path).await;
    let dropped = cache.total_entries();

    cache.clear();
    ResultCache::write_json(&path, cache.to_json()?).await?;
    ctx.activity
        .log(
            "cache.cleared",
            &serde_json::json!({ "workspace": ctx.workspace, "entries": dropped }),
        )
        .await;

    ui::step_ok_detail(
        &UiContext::detect(),
        "Result cache cleared",
        &format!("{} entries", dropped),
    );
    Ok(())
}
