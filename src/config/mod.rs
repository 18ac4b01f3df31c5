//! Configuration management for upcache

pub mod schema;

pub use schema::{CacheConfig, Config, FieldStyle, GeneralConfig, ReclaimConfig};

use crate::error::{UpcacheError, UpcacheResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Overrides `cache.root`
pub const ENV_ROOT: &str = "UPCACHE_ROOT";

/// Any non-empty value disables reclamation (sweeps and clears)
pub const ENV_KEEP: &str = "UPCACHE_KEEP";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("upcache")
            .join("config.toml")
    }

    /// Load configuration, falling back to defaults if the file is missing.
    ///
    /// Environment overrides are applied on top of whatever was loaded.
    pub async fn load(&self) -> UpcacheResult<Config> {
        let mut config = if self.config_path.exists() {
            self.load_from_file(&self.config_path).await?
        } else {
            debug!("Config file not found, using defaults");
            Config::default()
        };

        apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> UpcacheResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| UpcacheError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| UpcacheError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> UpcacheResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            UpcacheError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    async fn ensure_config_dir(&self) -> UpcacheResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| UpcacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Some(root) = std::env::var_os(ENV_ROOT).filter(|v| !v.is_empty()) {
        debug!("Cache root overridden by {}", ENV_ROOT);
        config.cache.root = PathBuf::from(root);
    }

    if std::env::var_os(ENV_KEEP).is_some_and(|v| !v.is_empty()) {
        debug!("Reclamation disabled by {}", ENV_KEEP);
        config.reclaim.disabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[tokio::test]
    #[serial]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.reclaim.max_age_hours, 24);
    }

    #[tokio::test]
    #[serial]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.cache.prefix = Some("account".to_string());
        config.reclaim.max_age_hours = 6;

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.cache.prefix.as_deref(), Some("account"));
        assert_eq!(loaded.reclaim.max_age_hours, 6);
    }

    #[tokio::test]
    #[serial]
    async fn invalid_file_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[reclaim]\nmax_age_hours = \"soon\"\n").unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(matches!(err, UpcacheError::ConfigInvalid { .. }));
    }

    #[tokio::test]
    #[serial]
    async fn env_overrides_root_and_keep() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("missing.toml"));

        std::env::set_var(ENV_ROOT, temp.path().join("staged"));
        std::env::set_var(ENV_KEEP, "1");
        let config = manager.load().await;
        std::env::remove_var(ENV_ROOT);
        std::env::remove_var(ENV_KEEP);

        let config = config.unwrap();
        assert_eq!(config.cache.root, temp.path().join("staged"));
        assert!(config.reclaim.disabled);
    }
}
