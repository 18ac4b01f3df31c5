//! Resolve command - look up a staged upload by reference

use super::print_entry;
use crate::cache::{durable_key_for, UploadCache};
use crate::cli::args::ResolveArgs;
use crate::error::UpcacheResult;
use crate::params::{parse_key, ParamBag};
use console::style;

/// Execute the resolve command
pub async fn execute(args: ResolveArgs, cache: &UploadCache) -> UpcacheResult<()> {
    let key = parse_key(&args.key);
    let mut bag = ParamBag::new();
    bag.insert_path(&durable_key_for(&key), args.reference.as_str());

    let entry = cache.scope().resolve(&mut bag, &key)?;

    if !entry.has_value() {
        eprintln!(
            "{} No staged upload for '{}'",
            style("[WARN]").yellow(),
            args.reference
        );
    }
    print_entry(&entry, args.format)
}
