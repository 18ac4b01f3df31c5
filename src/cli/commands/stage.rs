//! Stage command - stage a local file as an upload

use super::print_entry;
use crate::cache::UploadCache;
use crate::cli::args::StageArgs;
use crate::error::{UpcacheError, UpcacheResult};
use crate::params::{parse_key, ParamBag, Upload};

/// Execute the stage command
pub async fn execute(args: StageArgs, cache: &UploadCache) -> UpcacheResult<()> {
    let mut upload = Upload::from_file(&args.file)
        .map_err(|e| UpcacheError::io(format!("opening {}", args.file.display()), e))?;
    if let Some(name) = args.filename {
        upload = upload.with_original_filename(name);
    }

    let key = parse_key(&args.key);
    let mut bag = ParamBag::new();
    bag.insert_path(&key, upload);

    let entry = cache.scope().resolve(&mut bag, &key)?;
    print_entry(&entry, args.format)
}
