//! Upload resolution
//!
//! Resolves a logical form key against a parameter bag. Strategies are
//! tried in order and the first match wins:
//! 1. Current upload: a stream at `key` is staged into a fresh directory
//!    (or, if this scope already produced it, its entry is returned as is)
//! 2. Previous upload: a durable reference at the durable key is rehydrated
//!    from the cache root without copying
//! 3. Default: an empty entry built from the configured fallbacks
//!
//! Whatever wins is written back into the bag so the rest of the request
//! reads the staged file at `key` and the durable reference next to it.

use crate::cache::entry::{durable_key_for, CacheEntry, EntryDefaults};
use crate::cache::identifier::{is_identifier, IdentifierSource, UuidSource};
use crate::cache::reclaim::{Reclaimer, ShutdownSweep, SweepReport};
use crate::cache::sanitize::clean_name;
use crate::cache::settings::CacheSettings;
use crate::cache::staging::StagingArea;
use crate::config::Config;
use crate::error::{UpcacheError, UpcacheResult};
use crate::params::{Param, ParamBag, Upload, UploadId, DEFAULT_KEY};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, FileTimes};
use std::io::{self, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Per-call overrides of the configured fallbacks
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub default_url: Option<String>,
    pub default_path: Option<PathBuf>,
}

impl ResolveOptions {
    pub fn with_default_url(mut self, url: impl Into<String>) -> Self {
        self.default_url = Some(url.into());
        self
    }

    pub fn with_default_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_path = Some(path.into());
        self
    }
}

/// The staging cache.
///
/// Cheap to clone and safe to share between threads; every clone works on
/// the same root with the same settings.
#[derive(Clone)]
pub struct UploadCache {
    settings: CacheSettings,
    base_url: String,
    staging: StagingArea,
    reclaimer: Reclaimer,
    ids: Arc<dyn IdentifierSource>,
}

impl UploadCache {
    /// Open a cache using random UUID identifiers
    pub fn new(settings: CacheSettings) -> UpcacheResult<Self> {
        Self::with_identifiers(settings, Arc::new(UuidSource))
    }

    pub fn from_config(config: &Config) -> UpcacheResult<Self> {
        Self::new(CacheSettings::from_config(config))
    }

    /// Open a cache with a custom identifier source.
    ///
    /// The root is made absolute and created if needed. An unusable root is
    /// a configuration error.
    pub fn with_identifiers(
        mut settings: CacheSettings,
        ids: Arc<dyn IdentifierSource>,
    ) -> UpcacheResult<Self> {
        let root = std::path::absolute(&settings.root).map_err(|e| {
            UpcacheError::RootUnavailable {
                path: settings.root.clone(),
                source: e,
            }
        })?;
        fs::create_dir_all(&root).map_err(|e| UpcacheError::RootUnavailable {
            path: root.clone(),
            source: e,
        })?;
        settings.root = root;

        let base_url = settings
            .url
            .clone()
            .unwrap_or_else(|| format!("file://{}", settings.root.display()));
        let staging = StagingArea::new(&settings.root);
        let reclaimer = Reclaimer::new(&settings.root, settings.max_age, settings.reclaim.clone());

        debug!("Upload cache rooted at {}", settings.root.display());
        Ok(Self {
            settings,
            base_url,
            staging,
            reclaimer,
            ids,
        })
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn root(&self) -> &Path {
        &self.settings.root
    }

    /// Base URL staged values are served under
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn reclaimer(&self) -> &Reclaimer {
        &self.reclaimer
    }

    /// Start a request scope; entries are memoized for its lifetime
    pub fn scope(&self) -> ResolveScope<'_> {
        ResolveScope {
            cache: self,
            entries: HashMap::new(),
        }
    }

    /// Sweep stale uploads now, for scheduled jobs
    pub fn sweep(&self) -> SweepReport {
        self.reclaimer.sweep()
    }

    /// Guard that sweeps once when dropped at process exit
    pub fn sweep_on_exit(&self) -> ShutdownSweep {
        ShutdownSweep::new(self.reclaimer.clone())
    }

    /// Map an untrusted durable reference to a path under the root.
    ///
    /// Only the last two segments are used: an identifier directory and a
    /// basename. Anything that is not exactly that is rejected, so the
    /// result can never leave the root.
    pub fn locate(&self, reference: &str) -> UpcacheResult<PathBuf> {
        let mut segments = reference.trim().rsplit(['/', '\\']).filter(|s| !s.is_empty());
        let basename = segments
            .next()
            .ok_or_else(|| UpcacheError::invalid_reference(reference, "empty reference"))?;
        let id = segments
            .next()
            .ok_or_else(|| UpcacheError::invalid_reference(reference, "missing directory"))?;

        if !is_identifier(id) {
            return Err(UpcacheError::invalid_reference(
                reference,
                "directory is not a cache identifier",
            ));
        }
        if clean_name(basename) != basename {
            return Err(UpcacheError::invalid_reference(
                reference,
                "filename is not a cached basename",
            ));
        }

        Ok(self.settings.root.join(id).join(basename))
    }

    fn defaults(&self, options: &ResolveOptions) -> EntryDefaults {
        EntryDefaults {
            url: options
                .default_url
                .clone()
                .or_else(|| self.settings.default_url.clone()),
            path: options
                .default_path
                .clone()
                .or_else(|| self.settings.default_path.clone()),
        }
    }

    fn entry(
        &self,
        key: &[String],
        path: Option<PathBuf>,
        options: &ResolveOptions,
    ) -> UpcacheResult<CacheEntry> {
        CacheEntry::new(
            key.to_vec(),
            path,
            self.defaults(options),
            &self.settings,
            &self.base_url,
            &self.reclaimer,
        )
    }

    /// Persist an upload into a fresh staging directory
    fn stage_upload(
        &self,
        key: &[String],
        upload: &mut Upload,
        options: &ResolveOptions,
    ) -> UpcacheResult<CacheEntry> {
        let basename = clean_name(upload.original_name().unwrap_or_default());
        let staged = self.staging.stage(self.ids.as_ref())?;
        let dest = staged.file(&basename);

        if let Err(e) = persist(upload, &dest) {
            staged.discard();
            return Err(UpcacheError::StageWrite {
                path: dest,
                source: e,
            });
        }
        if let Err(e) = upload.rewind() {
            debug!("Could not rewind upload after staging: {}", e);
        }

        let dest = staged.commit()?.join(&basename);
        info!("Staged upload for {} at {}", key.join("."), dest.display());
        self.entry(key, Some(dest), options)
    }

    /// Rebuild an entry from a durable reference without copying
    fn rehydrate(
        &self,
        key: &[String],
        reference: &str,
        options: &ResolveOptions,
    ) -> UpcacheResult<CacheEntry> {
        let path = self.locate(reference)?;
        if !path.is_file() {
            return Err(UpcacheError::invalid_reference(
                reference,
                "no staged file (already reclaimed?)",
            ));
        }

        debug!("Rehydrating {} from {}", key.join("."), path.display());
        self.open_staged(key, path, reference, options)
    }

    /// Build an entry over an existing staged file.
    ///
    /// A file that disappears before it can be opened (a concurrent clear or
    /// sweep) is treated like any other stale reference.
    fn open_staged(
        &self,
        key: &[String],
        path: PathBuf,
        reference: &str,
        options: &ResolveOptions,
    ) -> UpcacheResult<CacheEntry> {
        match self.entry(key, Some(path), options) {
            Err(UpcacheError::HandleOpen { source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                Err(UpcacheError::invalid_reference(
                    reference,
                    "staged file was reclaimed before it could be opened",
                ))
            }
            other => other,
        }
    }
}

impl fmt::Debug for UploadCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadCache")
            .field("root", &self.settings.root)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Request-scoped resolver.
///
/// Remembers which upload streams it wrote back into bags, so resolving
/// the same untouched bag again returns the very same entry.
pub struct ResolveScope<'a> {
    cache: &'a UploadCache,
    entries: HashMap<UploadId, Arc<CacheEntry>>,
}

impl ResolveScope<'_> {
    pub fn resolve<S: AsRef<str>>(
        &mut self,
        bag: &mut ParamBag,
        key: &[S],
    ) -> UpcacheResult<Arc<CacheEntry>> {
        self.resolve_with(bag, key, &ResolveOptions::default())
    }

    pub fn resolve_with<S: AsRef<str>>(
        &mut self,
        bag: &mut ParamBag,
        key: &[S],
        options: &ResolveOptions,
    ) -> UpcacheResult<Arc<CacheEntry>> {
        let mut key: Vec<String> = key.iter().map(|s| s.as_ref().to_string()).collect();
        if key.is_empty() {
            key.push(DEFAULT_KEY.to_string());
        }
        let durable_key = durable_key_for(&key);

        if let Some(upload) = bag.get_mut(&key).and_then(Param::as_upload_mut) {
            if let Some(entry) = self.entries.get(&upload.id()) {
                return Ok(Arc::clone(entry));
            }
            let entry = self.cache.stage_upload(&key, upload, options)?;
            return self.adopt(bag, entry);
        }

        let reference = bag
            .get(&durable_key)
            .and_then(Param::as_text)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        if let Some(reference) = reference {
            match self.cache.rehydrate(&key, &reference, options) {
                Ok(entry) => return self.adopt(bag, entry),
                Err(e) if !e.is_fatal() => warn!("Ignoring upload reference: {}", e),
                Err(e) => return Err(e),
            }
        }

        let entry = self.cache.entry(&key, None, options)?;
        self.adopt(bag, entry)
    }

    /// Entries resolved so far in this scope
    pub fn entries(&self) -> impl Iterator<Item = &Arc<CacheEntry>> {
        self.entries.values()
    }

    /// Write the entry's handle and durable reference back into the bag
    fn adopt(&mut self, bag: &mut ParamBag, entry: CacheEntry) -> UpcacheResult<Arc<CacheEntry>> {
        let entry = Arc::new(entry);

        if let (Some(handle), Some(path)) = (entry.clone_handle()?, entry.handle_path()) {
            let mut upload = Upload::from_handle(path, handle);
            if let Some(basename) = entry.basename() {
                upload = upload.with_filename(basename);
            }
            let id = upload.id();
            if bag.set(entry.key(), upload) {
                self.entries.insert(id, Arc::clone(&entry));
            }
        }

        if let Some(value) = entry.value() {
            bag.set(entry.durable_key(), value);
        }

        Ok(entry)
    }
}

/// Copy the upload's bytes to `dest`, hard linking when possible.
///
/// A link keeps the source's timestamps, so its access time is refreshed to
/// keep the retention window anchored at staging time. Any failure along
/// the link path falls back to a plain copy.
fn persist(upload: &mut Upload, dest: &Path) -> io::Result<()> {
    if let Some(source) = upload.backing_file() {
        match link(source, dest) {
            Ok(()) => return Ok(()),
            Err(e) => {
                debug!("Hard link from {} failed, copying: {}", source.display(), e);
                let _ = fs::remove_file(dest);
            }
        }
    }

    upload.rewind()?;
    let mut out = File::create(dest)?;
    io::copy(upload, &mut out)?;
    Ok(())
}

fn link(source: &Path, dest: &Path) -> io::Result<()> {
    fs::hard_link(source, dest)?;
    File::open(dest)?.set_times(FileTimes::new().set_accessed(SystemTime::now()))
}
