//! Error types for upcache
//!
//! All modules use `UpcacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for upcache operations
pub type UpcacheResult<T> = Result<T, UpcacheError>;

/// All errors that can occur in upcache
#[derive(Error, Debug)]
pub enum UpcacheError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache root {path} is unusable: {source}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Staging errors
    #[error("Failed to create staging directory {path}: {source}")]
    StageDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to persist upload to {path}: {source}")]
    StageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open cached file {path}: {source}")]
    HandleOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Rehydration errors
    #[error("Invalid upload reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    User(String),
}

impl UpcacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid reference error
    pub fn invalid_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error must abort the request that produced it.
    ///
    /// Rehydration problems are recoverable: the resolver falls through to
    /// the default entry instead.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidReference { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::RootUnavailable { .. } => {
                Some("Check that cache.root is writable, or set UPCACHE_ROOT")
            }
            Self::ConfigInvalid { .. } => Some("Run: upcache config init --force"),
            Self::StageDir { .. } | Self::StageWrite { .. } => {
                Some("Check free disk space and permissions under the cache root")
            }
            _ => None,
        }
    }
}
