//! Runtime settings for a cache instance
//!
//! Built once from [`Config`] (or directly in tests) and injected into the
//! resolver and reclaimer, so independent caches never share state by
//! accident.

use crate::cache::reclaim::{ReclaimSwitch, DEFAULT_MAX_AGE_HOURS};
use crate::config::{Config, FieldStyle};
use chrono::Duration;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Directory holding `<identifier>/<basename>` trees
    pub root: PathBuf,
    /// Normalized public base URL; `file://<root>` when unset
    pub url: Option<String>,
    /// Prefix prepended to rendered field names
    pub prefix: Option<String>,
    pub field_style: FieldStyle,
    pub default_url: Option<String>,
    pub default_path: Option<PathBuf>,
    /// Retention age used by sweeps
    pub max_age: Duration,
    pub reclaim: ReclaimSwitch,
}

impl CacheSettings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            url: None,
            prefix: None,
            field_style: FieldStyle::Dotted,
            default_url: None,
            default_path: None,
            max_age: Duration::hours(i64::from(DEFAULT_MAX_AGE_HOURS)),
            reclaim: ReclaimSwitch::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let cache = &config.cache;
        Self {
            root: cache.root.clone(),
            url: cache.url.as_deref().map(normalize_url),
            prefix: cache.prefix.clone().filter(|p| !p.is_empty()),
            field_style: cache.field_style,
            default_url: cache.default_url.clone(),
            default_path: cache.default_path.clone(),
            max_age: Duration::hours(i64::from(config.reclaim.max_age_hours)),
            reclaim: ReclaimSwitch::new(config.reclaim.disabled),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(normalize_url(url));
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_field_style(mut self, style: FieldStyle) -> Self {
        self.field_style = style;
        self
    }

    pub fn with_default_url(mut self, url: impl Into<String>) -> Self {
        self.default_url = Some(url.into());
        self
    }

    pub fn with_default_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_path = Some(path.into());
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_reclaim_disabled(self, disabled: bool) -> Self {
        if disabled {
            self.reclaim.disable();
        } else {
            self.reclaim.enable();
        }
        self
    }

    /// Render the form field name for a key path
    pub fn field_name(&self, key: &[String]) -> String {
        match self.field_style {
            FieldStyle::Dotted => self
                .prefix
                .iter()
                .chain(key)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("."),
            FieldStyle::Bracketed => {
                let (head, rest) = match &self.prefix {
                    Some(prefix) => (prefix.as_str(), key),
                    None => match key.split_first() {
                        Some((first, rest)) => (first.as_str(), rest),
                        None => return String::new(),
                    },
                };
                rest.iter().fold(head.to_string(), |mut name, segment| {
                    name.push('[');
                    name.push_str(segment);
                    name.push(']');
                    name
                })
            }
        }
    }
}

/// Normalize a public base URL.
///
/// Absolute URLs only lose trailing slashes. Path-like values get exactly
/// one leading slash, no repeated slashes and no trailing slash. The site
/// root normalizes to `""` so joined URLs start with a single `/`.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.contains("://") {
        return url.trim_end_matches('/').to_string();
    }

    let segments: Vec<&str> = url.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return String::new();
    }
    format!("/{}", segments.join("/"))
}
