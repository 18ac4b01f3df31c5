//! Clear command - remove one staged upload

use crate::cache::{durable_key_for, UploadCache};
use crate::cli::args::ClearArgs;
use crate::error::UpcacheResult;
use crate::params::{ParamBag, DEFAULT_KEY};
use console::style;

/// Execute the clear command
pub async fn execute(args: ClearArgs, cache: &UploadCache) -> UpcacheResult<()> {
    let key = vec![DEFAULT_KEY.to_string()];
    let mut bag = ParamBag::new();
    bag.insert_path(&durable_key_for(&key), args.reference.as_str());

    let entry = cache.scope().resolve(&mut bag, &key)?;

    let Some(dir) = entry.directory().map(|d| d.to_path_buf()) else {
        println!("No staged upload for '{}'.", args.reference);
        return Ok(());
    };

    if cache.reclaimer().is_disabled() {
        println!(
            "{} Reclamation is disabled; {} kept",
            style("[WARN]").yellow(),
            dir.display()
        );
        return Ok(());
    }

    entry.clear();
    println!("{} Cleared {}", style("✓").green(), dir.display());
    Ok(())
}
