//! upcache - transient upload staging
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use upcache::cache::UploadCache;
use upcache::cli::{commands, Cli, Commands};
use upcache::config::ConfigManager;
use upcache::error::UpcacheResult;

#[tokio::main]
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

async fn run() -> UpcacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let mut config = config_manager.load().await?;
    if let Some(root) = cli.root {
        config.cache.root = root;
    }

    init_logging(cli.verbose, &config.general.log_format);
    debug!("Cache root: {}", config.cache.root.display());

    // Config command doesn't need a usable cache root
    let command = match cli.command {
        Commands::Config(args) => return commands::config(args, &config, &config_manager).await,
        other => other,
    };

    let cache = UploadCache::from_config(&config)?;
    // `sweep` runs its own pass and --dry-run must leave the root untouched
    let exit_sweep = config.reclaim.on_exit && !matches!(command, Commands::Sweep(_));
    let _exit_sweep = exit_sweep.then(|| cache.sweep_on_exit());

    match command {
        Commands::Stage(args) => commands::stage(args, &cache).await,
        Commands::Resolve(args) => commands::resolve(args, &cache).await,
        Commands::Clear(args) => commands::clear(args, &cache).await,
        Commands::Sweep(args) => commands::sweep(args, &cache).await,
        Commands::Config(_) => Ok(()),
    }
}

/// 0 = warn, 1 = info, 2+ = debug. Logs go to stderr so JSON output stays clean.
fn init_logging(verbose: u8, format: &str) {
    let filter = match verbose {
        0 => EnvFilter::new("upcache=warn"),
        1 => EnvFilter::new("upcache=info"),
        _ => EnvFilter::new("upcache=debug"),
    };

    if format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
    }
}
