//! Runtime configuration read from environment variables.

use crate::cache::{CacheConfig, DEFAULT_CACHE_VERSION, DEFAULT_SHELL_ASSETS};
use crate::storage::StorageBackend;
use reqwest::Url;
use std::env;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub cache: CacheConfig,
    /// `None` keeps cache buckets in memory only.
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub storage: StorageBackend,
    pub seed_defaults: bool,
    /// Absent when no `SHELL_ORIGIN` is configured; the cache worker is then
    /// not registered.
    pub shell: Option<ShellConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT", value))?,
            None => 8080,
        };

        let data_path = lookup("APP_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/state.json"));
        let storage = match lookup("STORAGE_BACKEND").as_deref() {
            None | Some("file") => StorageBackend::File(data_path),
            Some("memory") => StorageBackend::Memory,
            Some(other) => return Err(ConfigError::Invalid("STORAGE_BACKEND", other.to_string())),
        };

        let seed_defaults = match lookup("SEED_DEFAULTS").as_deref() {
            None | Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            Some(other) => return Err(ConfigError::Invalid("SEED_DEFAULTS", other.to_string())),
        };

        let shell = match lookup("SHELL_ORIGIN").filter(|value| !value.is_empty()) {
            Some(origin) => Some(shell_config(&origin, &lookup)?),
            None => None,
        };

        Ok(Self {
            port,
            storage,
            seed_defaults,
            shell,
        })
    }
}

fn shell_config(
    origin: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<ShellConfig, ConfigError> {
    let origin =
        Url::parse(origin).map_err(|_| ConfigError::Invalid("SHELL_ORIGIN", origin.to_string()))?;

    let version = lookup("CACHE_VERSION")
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_CACHE_VERSION.to_string());

    let assets = match lookup("SHELL_ASSETS") {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|asset| !asset.is_empty())
            .map(str::to_string)
            .collect(),
        None => DEFAULT_SHELL_ASSETS.iter().map(|asset| asset.to_string()).collect(),
    };

    let cache_dir = match lookup("CACHE_DIR") {
        Some(dir) if dir.is_empty() => None,
        Some(dir) => Some(PathBuf::from(dir)),
        None => Some(PathBuf::from("data/cache")),
    };

    Ok(ShellConfig {
        cache: CacheConfig {
            version,
            origin,
            assets,
        },
        cache_dir,
    })
}
