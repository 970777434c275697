//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Vigil - IaC scan coordinator
///
/// Runs Checkov on infrastructure files, caches results per content and
/// reports findings as diagnostics.
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "VIGIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .vigil.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Workspace root (defaults to the current directory)
    #[arg(short, long, global = true)]
    pub workspace: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a single file
    Scan(ScanArgs),

    /// Install or update the scanner
    Install,

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Show the activity log
    Logs(LogsArgs),

    /// Manage the scan result cache
    Cache(CacheArgs),

    /// Manage the scanner version cache
    VersionCache(VersionCacheArgs),

    /// Show scanner installation details
    Info,

    /// Editor bridge: JSON-line events on stdin, diagnostics on stdout
    Serve,

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Arguments for the scan command
#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// File to scan
    pub file: PathBuf,

    /// Emit JSON lines instead of human-readable output
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the logs command
#[derive(Parser, Debug)]
pub struct LogsArgs {
    /// Number of lines to show (0 = all)
    #[arg(short = 'n', long, default_value = "50")]
    pub lines: usize,

    /// Print the log file path and exit
    #[arg(long)]
    pub path: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., scanner.version)
        key: String,
        /// Value to set (comma-separated for lists)
        value: String,
        /// Write to project-local .vigil.toml instead of global config
        #[arg(long)]
        local: bool,
    },
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Result cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Drop every cached scan result for the workspace
    Clear,
}

/// Arguments for the version-cache command
#[derive(Parser, Debug)]
pub struct VersionCacheArgs {
    #[command(subcommand)]
    pub action: VersionCacheAction,
}

/// Version cache subcommands
#[derive(Subcommand, Debug)]
pub enum VersionCacheAction {
    /// Forget the cached `latest` resolution
    Clear,
}
