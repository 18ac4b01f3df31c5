//! CLI command implementations

pub mod clear;
pub mod config;
pub mod resolve;
pub mod stage;
pub mod sweep;

pub use clear::execute as clear;
pub use config::execute as config;
pub use resolve::execute as resolve;
pub use stage::execute as stage;
pub use sweep::execute as sweep;

use crate::cache::CacheEntry;
use crate::cli::args::OutputFormat;
use crate::error::UpcacheResult;
use console::style;
use serde::Serialize;

/// Printable view of a resolved entry
#[derive(Debug, Serialize)]
struct EntryView {
    key: String,
    field: String,
    reference: Option<String>,
    url: Option<String>,
    path: Option<String>,
}

impl EntryView {
    fn new(entry: &CacheEntry) -> Self {
        Self {
            key: entry.key().join("."),
            field: entry.name().to_string(),
            reference: entry.value().map(str::to_string),
            url: entry.url(),
            path: entry.path().map(|p| p.display().to_string()),
        }
    }
}

fn print_entry(entry: &CacheEntry, format: OutputFormat) -> UpcacheResult<()> {
    let view = EntryView::new(entry);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Text => {
            println!("{:<10} {}", style("key").bold(), view.key);
            println!("{:<10} {}", style("field").bold(), view.field);
            println!(
                "{:<10} {}",
                style("reference").bold(),
                view.reference.as_deref().unwrap_or("-")
            );
            println!("{:<10} {}", style("url").bold(), view.url.as_deref().unwrap_or("-"));
            println!("{:<10} {}", style("path").bold(), view.path.as_deref().unwrap_or("-"));
        }
    }

    Ok(())
}
