//! Vigil - IaC scan coordinator
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use vigil::cli::commands;
use vigil::cli::{AppContext, Cli, Commands};
use vigil::config::{Config, ConfigManager};
use vigil::error::{VigilError, VigilResult};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> VigilResult<()> {
    let cli = Cli::parse();

    // Completions need nothing else
    if let Commands::Completions { shell } = cli.command {
        commands::completions(shell);
        return Ok(());
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    let workspace = match cli.workspace {
        Some(ref path) => path.clone(),
        None => std::env::current_dir().map_err(|e| VigilError::io("getting current directory", e))?,
    };

    let local_config_path = if cli.no_local {
        None
    } else {
        ConfigManager::find_local_config(&workspace)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    init_tracing(cli.verbose, &config);
    if cli.no_local {
        debug!("Local config discovery disabled (--no-local)");
    } else if let Some(ref path) = local_config_path {
        debug!("Found local config: {}", path.display());
    }

    ConfigManager::ensure_state_dirs().await?;

    let workspace = canonical_or_same(workspace);
    let ctx = AppContext::new(config, workspace);

    match cli.command {
        Commands::Completions { .. } => Ok(()),
        Commands::Scan(args) => commands::scan(args, &ctx).await,
        Commands::Install => commands::install(&ctx).await,
        Commands::Config(args) => {
            commands::config(args, &ctx.config, &config_manager, &ctx.workspace).await
        }
        Commands::Logs(args) => commands::logs(args, &ctx).await,
        Commands::Cache(args) => commands::cache(args, &ctx).await,
        Commands::VersionCache(args) => commands::version_cache(args, &ctx).await,
        Commands::Info => commands::info(&ctx).await,
        Commands::Serve => commands::serve(&ctx).await,
    }
}

/// Logging goes to stderr: 0 = warn, 1 = info, 2+ = debug
fn init_tracing(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("vigil=warn"),
        1 => EnvFilter::new("vigil=info"),
        _ => EnvFilter::new("vigil=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

fn canonical_or_same(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or(path)
}
