//! Per-upload staging directories
//!
//! Every staged upload gets its own `root/<identifier>/` directory. Because
//! identifiers are unique, concurrent stagings never contend and need no lock.
//!
//! Bytes are first written into `root/.<identifier>.partial/` and the
//! directory is renamed into place once complete. Sweeps only consider
//! identifier-named directories, so they never observe a half-written upload.

use crate::cache::identifier::{is_identifier, IdentifierSource};
use crate::error::{UpcacheError, UpcacheResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PARTIAL_SUFFIX: &str = ".partial";

/// Whether `name` is an in-progress staging directory
pub fn is_partial_name(name: &str) -> bool {
    name.strip_prefix('.')
        .and_then(|n| n.strip_suffix(PARTIAL_SUFFIX))
        .is_some_and(is_identifier)
}

/// Creates staging directories under a root
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh in-progress directory for the next identifier.
    ///
    /// Failure is fatal to the caller: handing out a path that does not
    /// exist would leave the entry's handle pointing at nothing.
    pub fn stage(&self, ids: &dyn IdentifierSource) -> UpcacheResult<StagedDir> {
        let id = ids.next_id();
        let path = self.root.join(format!(".{}{}", id, PARTIAL_SUFFIX));
        let target = self.root.join(&id);

        fs::create_dir_all(&path).map_err(|e| UpcacheError::StageDir {
            path: path.clone(),
            source: e,
        })?;

        debug!("Staging into {}", path.display());
        Ok(StagedDir { id, path, target })
    }
}

/// A staging directory that has not been published yet
#[derive(Debug)]
pub struct StagedDir {
    id: String,
    path: PathBuf,
    target: PathBuf,
}

impl StagedDir {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Where files are written until `commit`
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final `root/<identifier>` location
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Path of a file inside the in-progress directory
    pub fn file(&self, basename: &str) -> PathBuf {
        self.path.join(basename)
    }

    /// Publish the directory under its identifier
    pub fn commit(self) -> UpcacheResult<PathBuf> {
        if let Err(e) = fs::rename(&self.path, &self.target) {
            let err = UpcacheError::StageDir {
                path: self.target.clone(),
                source: e,
            };
            self.discard();
            return Err(err);
        }

        debug!("Staged directory {}", self.target.display());
        Ok(self.target)
    }

    /// Remove the directory and anything written into it so far
    pub fn discard(self) {
        if let Err(e) = remove_tree(&self.path) {
            warn!("Failed to discard {}: {}", self.path.display(), e);
        }
    }
}

/// Recursively remove `path`, treating an already missing tree as success.
///
/// Sweeps and clears may race on the same directory; whoever loses simply
/// finds nothing left to delete.
pub(crate) fn remove_tree(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::identifier::UuidSource;
    use tempfile::TempDir;

    struct FixedId(&'static str);

    impl IdentifierSource for FixedId {
        fn next_id(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn stage_creates_partial_dir_until_commit() {
        let temp = TempDir::new().unwrap();
        let area = StagingArea::new(temp.path().join("nested").join("root"));

        let staged = area.stage(&UuidSource).unwrap();

        assert!(staged.path().is_dir());
        assert!(is_identifier(staged.id()));
        assert_eq!(staged.path().parent(), Some(area.root()));
        assert!(is_partial_name(&staged.path().file_name().unwrap().to_string_lossy()));
        assert!(!staged.target().exists());

        fs::write(staged.file("a.txt"), b"x").unwrap();
        let target = staged.target().to_path_buf();
        let partial = staged.path().to_path_buf();

        assert_eq!(staged.commit().unwrap(), target);
        assert_eq!(target.parent(), Some(area.root()));
        assert_eq!(fs::read(target.join("a.txt")).unwrap(), b"x");
        assert!(!partial.exists());
    }

    #[test]
    fn partial_names() {
        assert!(is_partial_name(".abc-123.partial"));
        assert!(!is_partial_name("abc-123"));
        assert!(!is_partial_name(".abc_1.partial"));
        assert!(!is_partial_name("..partial"));
    }

    #[test]
    fn stage_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("root");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = StagingArea::new(&blocker).stage(&FixedId("abc")).unwrap_err();
        assert!(matches!(err, UpcacheError::StageDir { .. }));
    }

    #[test]
    fn discard_removes_contents() {
        let temp = TempDir::new().unwrap();
        let staged = StagingArea::new(temp.path()).stage(&FixedId("abc")).unwrap();
        fs::write(staged.file("a.txt"), b"x").unwrap();
        let path = staged.path().to_path_buf();

        staged.discard();
        assert!(!path.exists());
    }

    #[test]
    fn remove_tree_missing_is_ok() {
        let temp = TempDir::new().unwrap();
        assert!(!remove_tree(&temp.path().join("gone")).unwrap());
    }
}
