//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// upcache - transient upload staging
///
/// Stages uploaded files so forms can carry them across validation
/// failures, and reclaims abandoned uploads.
#[derive(Parser, Debug)]
#[command(name = "upcache")]
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
    #[arg(short, long, global = true, env = "UPCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache root directory (overrides cache.root and UPCACHE_ROOT)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stage a file as if it had just been uploaded
    Stage(StageArgs),

    /// Look up a previously staged upload by its reference
    Resolve(ResolveArgs),

    /// Remove a staged upload
    Clear(ClearArgs),

    /// Remove stale uploads (run from a scheduler)
    Sweep(SweepArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the stage command
#[derive(Parser, Debug)]
pub struct StageArgs {
    /// File to stage
    pub file: PathBuf,

    /// Form field key, dot separated (e.g. user.avatar)
    #[arg(short, long, default_value = "upload")]
    pub key: String,

    /// Client filename to record instead of the file's own name
    #[arg(long)]
    pub filename: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Durable reference (<identifier>/<basename>)
    pub reference: String,

    /// Form field key, dot separated
    #[arg(short, long, default_value = "upload")]
    pub key: String,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the clear command
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Durable reference (<identifier>/<basename>)
    pub reference: String,
}

/// Arguments for the sweep command
#[derive(Parser, Debug)]
pub struct SweepArgs {
    /// Retention age in hours (default: from config)
    #[arg(long)]
    pub max_age_hours: Option<u32>,

    /// Dry run - show what would be removed
    #[arg(long)]
    pub dry_run: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
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
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}
