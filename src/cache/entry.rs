//! Cache entries: one staged (or defaulted) upload slot

use crate::cache::reclaim::Reclaimer;
use crate::cache::settings::CacheSettings;
use crate::cache::staging::remove_tree;
use crate::error::{UpcacheError, UpcacheResult};
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Suffix appended to the last key segment to form the durable key
pub const DURABLE_SUFFIX: &str = "_upload_cache";

/// Derive the key under which the durable reference travels
pub fn durable_key_for(key: &[String]) -> Vec<String> {
    let mut durable = key.to_vec();
    if let Some(last) = durable.last_mut() {
        last.push_str(DURABLE_SUFFIX);
    }
    durable
}

/// Fallbacks used when no upload has been staged yet
#[derive(Debug, Clone, Default)]
pub struct EntryDefaults {
    pub url: Option<String>,
    pub path: Option<PathBuf>,
}

/// Hidden form field carrying a durable reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HiddenField {
    pub name: String,
    pub value: String,
}

/// One staged upload (or an empty slot) for a logical form key.
///
/// The entry owns its read handle; dropping the entry closes it.
#[derive(Debug)]
pub struct CacheEntry {
    key: Vec<String>,
    durable_key: Vec<String>,
    name: String,
    path: Option<PathBuf>,
    directory: Option<PathBuf>,
    basename: Option<String>,
    value: Option<String>,
    base_url: String,
    defaults: EntryDefaults,
    handle: Mutex<Option<File>>,
    reclaimer: Reclaimer,
}

impl CacheEntry {
    pub(crate) fn new(
        key: Vec<String>,
        path: Option<PathBuf>,
        defaults: EntryDefaults,
        settings: &CacheSettings,
        base_url: &str,
        reclaimer: &Reclaimer,
    ) -> UpcacheResult<Self> {
        let durable_key = durable_key_for(&key);
        let name = settings.field_name(&durable_key);

        let directory = path.as_deref().and_then(Path::parent).map(Path::to_path_buf);
        let basename = path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned());
        let value = match (&directory, &basename) {
            (Some(dir), Some(base)) => {
                let id = dir.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                Some(format!("{}/{}", id, base).trim().to_string())
            }
            _ => None,
        };

        let handle = match (&path, &defaults.path) {
            (Some(path), _) => Some(File::open(path).map_err(|e| UpcacheError::HandleOpen {
                path: path.clone(),
                source: e,
            })?),
            (None, Some(default)) => match File::open(default) {
                Ok(file) => Some(file),
                Err(e) => {
                    warn!("Default upload {} unavailable: {}", default.display(), e);
                    None
                }
            },
            (None, None) => None,
        };

        Ok(Self {
            key,
            durable_key,
            name,
            path,
            directory,
            basename,
            value,
            base_url: base_url.to_string(),
            defaults,
            handle: Mutex::new(handle),
            reclaimer: reclaimer.clone(),
        })
    }

    pub fn key(&self) -> &[String] {
        &self.key
    }

    pub fn durable_key(&self) -> &[String] {
        &self.durable_key
    }

    /// Rendered name of the hidden field
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn basename(&self) -> Option<&str> {
        self.basename.as_deref()
    }

    /// Durable reference (`<identifier>/<basename>`)
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn default_url(&self) -> Option<&str> {
        self.defaults.url.as_deref()
    }

    pub fn default_path(&self) -> Option<&Path> {
        self.defaults.path.as_deref()
    }

    /// Public URL of the staged file, or the default URL
    pub fn url(&self) -> Option<String> {
        match &self.value {
            Some(value) => Some(format!("{}/{}", self.base_url, value)),
            None => self.defaults.url.clone(),
        }
    }

    /// Field to embed in the re-rendered form, if anything was staged
    pub fn hidden_field(&self) -> Option<HiddenField> {
        self.value.as_ref().map(|value| HiddenField {
            name: self.name.clone(),
            value: value.clone(),
        })
    }

    /// File the handle was opened on: the staged path or the default path
    pub fn handle_path(&self) -> Option<&Path> {
        if !self.is_open() {
            return None;
        }
        self.path().or_else(|| self.default_path())
    }

    pub fn is_open(&self) -> bool {
        self.lock_handle().is_some()
    }

    /// Read the whole file behind the handle from the start.
    ///
    /// The cursor is shared with the stream written back into the bag, so
    /// it is restored afterwards.
    pub fn read_bytes(&self) -> UpcacheResult<Option<Vec<u8>>> {
        let mut guard = self.lock_handle();
        let Some(file) = guard.as_mut() else {
            return Ok(None);
        };

        let mut bytes = Vec::new();
        file.stream_position()
            .and_then(|pos| {
                file.seek(SeekFrom::Start(0))?;
                file.read_to_end(&mut bytes)?;
                file.seek(SeekFrom::Start(pos))
            })
            .map_err(|e| UpcacheError::io(format!("reading cached upload for {}", self.name), e))?;
        Ok(Some(bytes))
    }

    /// Duplicate the handle (the clone shares its cursor with the entry)
    pub fn clone_handle(&self) -> UpcacheResult<Option<File>> {
        self.lock_handle()
            .as_ref()
            .map(File::try_clone)
            .transpose()
            .map_err(|e| UpcacheError::io(format!("duplicating handle for {}", self.name), e))
    }

    /// Discard this entry's staged files.
    ///
    /// Closes the handle, removes the whole staging directory and kicks off
    /// a background sweep. Never fails: removal problems are logged. With
    /// reclamation disabled only the handle is released.
    pub fn clear(&self) {
        drop(self.lock_handle().take());

        if self.reclaimer.is_disabled() {
            debug!("Reclamation disabled, keeping files for {}", self.name);
            return;
        }

        if let Some(dir) = &self.directory {
            match remove_tree(dir) {
                Ok(true) => info!("Cleared {}", dir.display()),
                Ok(false) => debug!("{} already gone", dir.display()),
                Err(e) => warn!("Failed to clear {}: {}", dir.display(), e),
            }
        }

        self.reclaimer.sweep_in_background();
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<File>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
