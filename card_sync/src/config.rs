//! Runtime configuration
//!
//! Every field has a default, so a config file is optional. The binary loads
//! the TOML file first and then applies CLI flags and environment variables.

use crate::cache_keys::CacheTtls;
use crate::error::{SyncError, SyncResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection settings for one catalog API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Overrides the public API base URL (used for mirrors and mock servers)
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding card records and sets
    pub database: PathBuf,
    /// Set mapping artifact written by `build-mappings`
    pub mapping_path: PathBuf,
    pub pokemon_tcg: ApiConfig,
    pub pokedata: ApiConfig,
    pub cache: CacheTtls,
    /// Enhanced pricing older than this is refreshed
    pub pricing_stale_hours: i64,
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Sets released within this many days count as current
    pub current_set_window_days: i64,
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            database: data_dir.join("cards.db"),
            mapping_path: data_dir.join("set_mappings.json"),
            pokemon_tcg: ApiConfig::default(),
            pokedata: ApiConfig::default(),
            cache: CacheTtls::default(),
            pricing_stale_hours: 24,
            default_page_size: 100,
            max_page_size: 500,
            current_set_window_days: 180,
            http_timeout_secs: 30,
        }
    }
}

/// Returns the default data directory: ~/.local/share/card_sync
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("card_sync")
}

impl Config {
    /// Load configuration from a TOML file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> SyncResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml(&content)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> SyncResult<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> SyncResult<()> {
        if self.max_page_size == 0 {
            return Err(SyncError::Config("max_page_size must be positive".into()));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(SyncError::Config(format!(
                "default_page_size must be between 1 and {}",
                self.max_page_size
            )));
        }
        if self.pricing_stale_hours < 0 {
            return Err(SyncError::Config(
                "pricing_stale_hours must not be negative".into(),
            ));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn pricing_stale_after(&self) -> chrono::Duration {
        chrono::Duration::hours(self.pricing_stale_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.pricing_stale_hours, 24);
        assert_eq!(config.max_page_size, 500);
        assert_eq!(config.default_page_size, 100);
        assert!(config.database.ends_with("card_sync/cards.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = Config::from_toml(
            r#"
            max_page_size = 250

            [pokedata]
            api_key = "secret"

            [cache]
            card_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.max_page_size, 250);
        assert_eq!(config.pokedata.api_key.as_deref(), Some("secret"));
        assert!(config.pokedata.base_url.is_none());
        assert_eq!(config.cache.card_secs, 60);
        assert_eq!(config.cache.set_list_secs, CacheTtls::default().set_list_secs);
        assert_eq!(config.pricing_stale_hours, 24);
    }

    #[test]
    fn rejects_inconsistent_page_sizes() {
        let result = Config::from_toml("max_page_size = 50\ndefault_page_size = 100");
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn load_reads_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "current_set_window_days = 30").unwrap();

        let config = Config::load(Some(tmp.path())).unwrap();
        assert_eq!(config.current_set_window_days, 30);
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let result = Config::load(Some(Path::new("/nonexistent/card_sync.toml")));
        assert!(matches!(result, Err(SyncError::Config(_))));
    }
}
