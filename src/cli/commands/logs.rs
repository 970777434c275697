//! Logs command - view the activity log

use crate::cli::args::LogsArgs;
use crate::cli::context::AppContext;
use crate::error::{VigilError, VigilResult};

/// Execute the logs command
pub async fn execute(args: LogsArgs, ctx: &AppContext) -> VigilResult<()> {
    if args.path {
        println!("{}", ctx.activity.path().display());
        return Ok(());
    }

    let count = if args.lines == 0 { usize::MAX } else { args.lines };
    let lines = ctx
        .activity
        .tail(count)
        .await
        .map_err(|e| VigilError::io(format!("reading {}", ctx.activity.path().display()), e))?;

    if lines.is_empty() {
        eprintln!("No activity recorded yet.");
        return Ok(());
    }

    for line in lines {
        println!("{}", line);
    }
    Ok(())
}
