//! # Service Configuration
//!
//! JSON configuration file with serde defaults, optionally overridden by
//! environment variables, validated before use.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::MAX_BUCKETS;
use crate::http_server::HttpServerConfig;

pub const ENV_CACHE_DIR: &str = "GEOQUERY_CACHE_DIR";
pub const ENV_CACHE_AGE: &str = "GEOQUERY_CACHE_AGE_IN_SECONDS";
pub const ENV_MAX_FEATURES: &str = "GEOQUERY_MAX_FEATURES_PER_TILE";
pub const ENV_MAX_BUCKETS: &str = "GEOQUERY_MAX_BUCKETS";

/// Result type for configuration
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Root of the tile cache (default "./cache")
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Tile max age in seconds; 0 disables tile caching (default 3600)
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age_secs: u64,

    /// Cap on features encoded into one tile (default 5000)
    #[serde(default = "default_max_features")]
    pub max_features_per_tile: u32,

    /// Most bins or breaks one classification request may ask for (default 100)
    #[serde(default = "default_max_buckets")]
    pub max_buckets: usize,

    /// Surrogate key column of every table (default "gid")
    #[serde(default = "default_surrogate_key")]
    pub surrogate_key: String,

    /// SRID of stored geometries (default 4326)
    #[serde(default = "default_storage_srid")]
    pub storage_srid: u32,

    /// Delete dead tile epochs in the background after each mutation
    /// (default true)
    #[serde(default = "default_purge_on_mutation")]
    pub purge_on_mutation: bool,

    #[serde(default)]
    pub http: HttpServerConfig,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_cache_max_age() -> u64 {
    3600
}

fn default_max_features() -> u32 {
    5000
}

fn default_max_buckets() -> usize {
    100
}

fn default_surrogate_key() -> String {
    "gid".to_string()
}

fn default_storage_srid() -> u32 {
    4326
}

fn default_purge_on_mutation() -> bool {
    true
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            cache_max_age_secs: default_cache_max_age(),
            max_features_per_tile: default_max_features(),
            max_buckets: default_max_buckets(),
            surrogate_key: default_surrogate_key(),
            storage_srid: default_storage_srid(),
            purge_on_mutation: default_purge_on_mutation(),
            http: HttpServerConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load from file, apply environment overrides, validate
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut config: ServiceConfig = serde_json::from_str(&content)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// [`load`](Self::load))
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(age) = lookup(ENV_CACHE_AGE) {
            self.cache_max_age_secs = parse_override(ENV_CACHE_AGE, &age)?;
        }
        if let Some(max) = lookup(ENV_MAX_FEATURES) {
            self.max_features_per_tile = parse_override(ENV_MAX_FEATURES, &max)?;
        }
        if let Some(max) = lookup(ENV_MAX_BUCKETS) {
            self.max_buckets = parse_override(ENV_MAX_BUCKETS, &max)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("cache_dir must not be empty".into()));
        }
        if self.surrogate_key.trim().is_empty() {
            return Err(ConfigError::Invalid("surrogate_key must not be empty".into()));
        }
        if self.max_features_per_tile == 0 {
            return Err(ConfigError::Invalid(
                "max_features_per_tile must be > 0".into(),
            ));
        }
        if self.max_buckets == 0 || self.max_buckets > MAX_BUCKETS {
            return Err(ConfigError::Invalid(format!(
                "max_buckets must be between 1 and {}",
                MAX_BUCKETS
            )));
        }
        Ok(())
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_secs)
    }
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} is not a valid number: {}", name, value)))
}
