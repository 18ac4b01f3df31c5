//! Uploaded file streams as they appear in a parameter bag

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_UPLOAD_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an upload stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadId(u64);

impl UploadId {
    fn next() -> Self {
        Self(NEXT_UPLOAD_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
enum UploadBody {
    /// Backed by a file on disk, eligible for hard linking
    File { path: PathBuf, file: File },
    Memory(Cursor<Vec<u8>>),
}

/// A readable uploaded file.
///
/// Carries the naming metadata a web framework typically exposes. When
/// staging, the first present of `original_path`, `original_filename`,
/// `path`, `filename` names the staged file.
#[derive(Debug)]
pub struct Upload {
    id: UploadId,
    body: UploadBody,
    original_path: Option<String>,
    original_filename: Option<String>,
    path: Option<String>,
    filename: Option<String>,
}

impl Upload {
    /// Open a file on disk as an upload
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Ok(Self::from_handle(path, file))
    }

    /// Wrap an already open handle on `path`
    pub fn from_handle(path: impl Into<PathBuf>, file: File) -> Self {
        let path = path.into();
        Self {
            id: UploadId::next(),
            path: Some(path.to_string_lossy().into_owned()),
            body: UploadBody::File { path, file },
            original_path: None,
            original_filename: None,
            filename: None,
        }
    }

    /// An upload held entirely in memory
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            id: UploadId::next(),
            body: UploadBody::Memory(Cursor::new(bytes.into())),
            original_path: None,
            original_filename: None,
            path: None,
            filename: None,
        }
    }

    pub fn with_original_path(mut self, path: impl Into<String>) -> Self {
        self.original_path = Some(path.into());
        self
    }

    pub fn with_original_filename(mut self, name: impl Into<String>) -> Self {
        self.original_filename = Some(name.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.filename = Some(name.into());
        self
    }

    pub fn id(&self) -> UploadId {
        self.id
    }

    /// Client-facing name, by priority
    pub fn original_name(&self) -> Option<&str> {
        [
            &self.original_path,
            &self.original_filename,
            &self.path,
            &self.filename,
        ]
        .into_iter()
        .find_map(|candidate| candidate.as_deref())
    }

    /// The file backing this upload, if any
    pub fn backing_file(&self) -> Option<&Path> {
        match &self.body {
            UploadBody::File { path, .. } => Some(path),
            UploadBody::Memory(_) => None,
        }
    }
}

impl Read for Upload {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.body {
            UploadBody::File { file, .. } => file.read(buf),
            UploadBody::Memory(cursor) => cursor.read(buf),
        }
    }
}

impl Seek for Upload {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match &mut self.body {
            UploadBody::File { file, .. } => file.seek(pos),
            UploadBody::Memory(cursor) => cursor.seek(pos),
        }
    }
}
