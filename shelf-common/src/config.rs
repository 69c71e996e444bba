//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a TOML file; credentials may be overridden
//! from the environment. Resolution order for the root folder:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "SHELF_ROOT_FOLDER";

/// Environment variable holding the generative-search bearer token
pub const PERPLEXITY_KEY_ENV: &str = "SHELF_PERPLEXITY_API_KEY";

/// Environment variable holding the Google Books API key
pub const GOOGLE_BOOKS_KEY_ENV: &str = "SHELF_GOOGLE_BOOKS_API_KEY";

/// Bootstrap configuration loaded from TOML
///
/// Every field is optional; a missing file yields `TomlConfig::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the catalog database and image store
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Folder of per-location photo directories (`<library>/<location>/<photo>`)
    #[serde(default)]
    pub library_folder: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Bearer token for the generative-search provider
    #[serde(default)]
    pub perplexity_api_key: Option<String>,

    /// API key for Google Books (optional, keyless quota otherwise)
    #[serde(default)]
    pub google_books_api_key: Option<String>,

    /// Retry and rate-limit knobs for bibliographic sources
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Per-source retry and pacing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Attempt ceiling for the generative-search adapter
    #[serde(default = "default_generative_attempts")]
    pub generative_max_attempts: u32,
    /// Fixed delay between generative-search attempts (ms)
    #[serde(default = "default_retry_delay_ms")]
    pub generative_retry_delay_ms: u64,
    /// Attempt ceiling for catalog requests (structured and open)
    #[serde(default = "default_catalog_attempts")]
    pub catalog_max_attempts: u32,
    /// Fixed delay between catalog attempts (ms)
    #[serde(default = "default_retry_delay_ms")]
    pub catalog_retry_delay_ms: u64,
    /// Minimum interval between Perplexity requests (ms)
    #[serde(default = "default_generative_interval_ms")]
    pub generative_min_interval_ms: u64,
    /// Minimum interval between Google Books requests (ms)
    #[serde(default = "default_catalog_interval_ms")]
    pub catalog_min_interval_ms: u64,
    /// Minimum interval between Open Library requests (ms)
    #[serde(default = "default_open_catalog_interval_ms")]
    pub open_catalog_min_interval_ms: u64,
    /// HTTP request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            generative_max_attempts: default_generative_attempts(),
            generative_retry_delay_ms: default_retry_delay_ms(),
            catalog_max_attempts: default_catalog_attempts(),
            catalog_retry_delay_ms: default_retry_delay_ms(),
            generative_min_interval_ms: default_generative_interval_ms(),
            catalog_min_interval_ms: default_catalog_interval_ms(),
            open_catalog_min_interval_ms: default_open_catalog_interval_ms(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_generative_attempts() -> u32 {
    3
}

fn default_catalog_attempts() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_generative_interval_ms() -> u64 {
    500
}

fn default_catalog_interval_ms() -> u64 {
    100
}

fn default_open_catalog_interval_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

/// Default TOML location: `<config dir>/shelfscan/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("shelfscan").join("config.toml"))
}

/// Load TOML configuration
///
/// A missing file is not an error: a warning is logged and defaults are used.
/// A file that exists but does not parse is a configuration error.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(p) => p,
        None => {
            warn!("Could not determine config directory, using defaults");
            return Ok(TomlConfig::default());
        }
    };

    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// Resolve the root folder (CLI → ENV → TOML → OS default)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("shelfscan"))
        .unwrap_or_else(|| PathBuf::from("./shelfscan_data"))
}

/// Resolve an API credential (ENV → TOML)
///
/// Returns `None` when neither source holds a valid key. Warns when both do,
/// since the environment silently wins.
pub fn resolve_api_key(label: &str, env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env_key = std::env::var(env_var).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_value.filter(|k| is_valid_key(k));

    match (env_key, toml_key) {
        (Some(env_key), Some(_)) => {
            warn!(
                "{} API key found in environment and TOML. Using environment (highest priority).",
                label
            );
            Some(env_key)
        }
        (Some(env_key), None) => {
            info!("{} API key loaded from environment variable", label);
            Some(env_key)
        }
        (None, Some(toml_key)) => {
            info!("{} API key loaded from TOML config", label);
            Some(toml_key.to_string())
        }
        (None, None) => None,
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
