//! Configuration schema for upcache
//!
//! Configuration is stored at `~/.config/upcache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Staging cache settings
    pub cache: CacheConfig,

    /// Reclamation settings
    pub reclaim: ReclaimConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// How hidden field names are rendered from a key path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldStyle {
    /// `prefix.user.avatar_upload_cache`
    #[default]
    Dotted,
    /// `prefix[user][avatar_upload_cache]`
    Bracketed,
}

/// Staging cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding staged uploads
    pub root: PathBuf,

    /// Public base URL the root is served under (default: file://<root>)
    pub url: Option<String>,

    /// Prefix prepended to rendered field names
    pub prefix: Option<String>,

    /// Field name rendering style
    pub field_style: FieldStyle,

    /// URL shown when nothing has been uploaded yet
    pub default_url: Option<String>,

    /// File opened when nothing has been uploaded yet
    pub default_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join("upcache"),
            url: None,
            prefix: None,
            field_style: FieldStyle::Dotted,
            default_url: None,
            default_path: None,
        }
    }
}

/// Reclamation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReclaimConfig {
    /// Staged directories untouched for this many hours are removed
    pub max_age_hours: u32,

    /// Disable both sweeping and explicit clears
    pub disabled: bool,

    /// Sweep once when the process exits
    pub on_exit: bool,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            max_age_hours: 24,
            disabled: false,
            on_exit: true,
        }
    }
}
