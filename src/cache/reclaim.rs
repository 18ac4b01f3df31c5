//! Age-based reclamation of staged uploads
//!
//! A sweep walks the immediate children of the cache root and removes every
//! identifier-named directory whose files were all last accessed at least
//! `max_age` before the reference time. Directories holding no files at all
//! are removed regardless of age.
//!
//! In-progress `.<identifier>.partial` directories left behind by a crashed
//! staging are removed too, but only once the directory itself is older
//! than `max_age`.
//!
//! Sweeps are idempotent and may run concurrently with each other, with
//! explicit clears and with new stagings. The retention age is what keeps a
//! sweep away from uploads that are still in flight.

use crate::cache::identifier::is_identifier;
use crate::cache::staging::{is_partial_name, remove_tree};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default retention age for staged uploads
pub const DEFAULT_MAX_AGE_HOURS: u32 = 24;

/// Shared runtime switch that turns reclamation off.
///
/// Clones share state, so flipping one flips every cache and entry built
/// from the same settings.
#[derive(Debug, Clone, Default)]
pub struct ReclaimSwitch {
    disabled: Arc<AtomicBool>,
}

impl ReclaimSwitch {
    pub fn new(disabled: bool) -> Self {
        Self {
            disabled: Arc::new(AtomicBool::new(disabled)),
        }
    }

    pub fn disable(&self) {
        self.disabled.store(true, Ordering::SeqCst);
    }

    pub fn enable(&self) {
        self.disabled.store(false, Ordering::SeqCst);
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }
}

/// Outcome of a sweep
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Identifier-named directories examined
    pub scanned: usize,
    /// Directories removed (or that would be, for a dry run)
    pub removed: Vec<PathBuf>,
    /// Directories still holding recently accessed files
    pub kept: usize,
    /// Directories skipped because of a filesystem error
    pub skipped: usize,
    /// Set when the sweep did nothing because reclamation is disabled
    pub disabled: bool,
}

/// Sweeps a cache root
#[derive(Debug, Clone)]
pub struct Reclaimer {
    root: PathBuf,
    max_age: Duration,
    switch: ReclaimSwitch,
}

impl Reclaimer {
    pub fn new(root: impl Into<PathBuf>, max_age: Duration, switch: ReclaimSwitch) -> Self {
        Self {
            root: root.into(),
            max_age,
            switch,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn switch(&self) -> &ReclaimSwitch {
        &self.switch
    }

    pub fn is_disabled(&self) -> bool {
        self.switch.is_disabled()
    }

    /// Copy of this reclaimer with a different retention age
    pub fn with_max_age(&self, max_age: Duration) -> Self {
        Self {
            max_age,
            ..self.clone()
        }
    }

    /// Sweep relative to the current time
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now())
    }

    /// Sweep relative to `now`
    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        self.run(now, false)
    }

    /// Report what a sweep at `now` would remove without touching anything
    pub fn plan_at(&self, now: DateTime<Utc>) -> SweepReport {
        self.run(now, true)
    }

    /// Fire-and-forget sweep.
    ///
    /// Runs on the blocking pool when called inside a tokio runtime and on a
    /// plain thread otherwise. Failures are logged and never reported back.
    pub fn sweep_in_background(&self) {
        if self.is_disabled() {
            return;
        }

        let reclaimer = self.clone();
        let task = move || {
            let report = reclaimer.sweep();
            debug!(
                "Background sweep of {} removed {} director(ies)",
                reclaimer.root.display(),
                report.removed.len()
            );
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(task);
            }
            Err(_) => {
                if let Err(e) = std::thread::Builder::new()
                    .name("upcache-sweep".to_string())
                    .spawn(task)
                {
                    warn!("Failed to start background sweep: {}", e);
                }
            }
        }
    }

    fn run(&self, now: DateTime<Utc>, dry_run: bool) -> SweepReport {
        let mut report = SweepReport::default();

        if self.is_disabled() {
            debug!("Reclamation disabled, skipping sweep");
            report.disabled = true;
            return report;
        }

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Cache root {} does not exist", self.root.display());
                return report;
            }
            Err(e) => {
                warn!("Failed to list cache root {}: {}", self.root.display(), e);
                return report;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to read cache root entry: {}", e);
                    report.skipped += 1;
                    continue;
                }
            };

            // Symlinks are never followed out of the root
            if !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let partial = is_partial_name(name);
            if !partial && !is_identifier(name) {
                continue;
            }

            report.scanned += 1;
            let dir = entry.path();

            match self.is_reclaimable(&dir, now, partial) {
                Ok(false) => report.kept += 1,
                Ok(true) if dry_run => report.removed.push(dir),
                Ok(true) => match remove_tree(&dir) {
                    Ok(_) => {
                        debug!("Reclaimed {}", dir.display());
                        report.removed.push(dir);
                    }
                    Err(e) => {
                        warn!("Failed to remove {}: {}", dir.display(), e);
                        report.skipped += 1;
                    }
                },
                Err(e) => {
                    warn!("Skipping {}: {}", dir.display(), e);
                    report.skipped += 1;
                }
            }
        }

        if !dry_run && !report.removed.is_empty() {
            info!(
                "Swept {} stale upload(s) from {}",
                report.removed.len(),
                self.root.display()
            );
        }
        report
    }

    /// True when every file under `dir` is old, including when there are none.
    ///
    /// Partial directories must also be old themselves.
    fn is_reclaimable(&self, dir: &Path, now: DateTime<Utc>, partial: bool) -> io::Result<bool> {
        if partial {
            let modified = fs::metadata(dir)?.modified().map(DateTime::<Utc>::from)?;
            if now - modified < self.max_age {
                return Ok(false);
            }
        }

        for file in collect_files(dir)? {
            let meta = fs::symlink_metadata(&file)?;
            if now - last_access(&meta)? < self.max_age {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Sweeps once when dropped, typically held for the life of `main`
#[must_use = "the sweep runs when the guard is dropped"]
pub struct ShutdownSweep {
    reclaimer: Option<Reclaimer>,
}

impl ShutdownSweep {
    pub fn new(reclaimer: Reclaimer) -> Self {
        Self {
            reclaimer: Some(reclaimer),
        }
    }

    /// Drop the guard without sweeping
    pub fn disarm(mut self) {
        self.reclaimer = None;
    }
}

impl Drop for ShutdownSweep {
    fn drop(&mut self) {
        if let Some(reclaimer) = self.reclaimer.take() {
            let report = reclaimer.sweep();
            debug!("Shutdown sweep removed {} director(ies)", report.removed.len());
        }
    }
}

fn last_access(meta: &fs::Metadata) -> io::Result<DateTime<Utc>> {
    meta.accessed().or_else(|_| meta.modified()).map(DateTime::<Utc>::from)
}

fn collect_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                pending.push(entry.path());
            } else {
                files.push(entry.path());
            }
        }
    }

    Ok(files)
}
