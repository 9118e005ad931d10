//! Configuration management.
//!
//! Two layers of configuration exist:
//!
//! - [`Settings`]: process-wide settings for the server, the remote API and
//!   logging, loaded once at startup from an optional TOML file overlaid by
//!   `ZOTERO_PROXY_*` environment variables.
//! - [`RequestConfig`]: the immutable per-request configuration built by the
//!   [`ConfigResolver`] from `ZOTERO_*` defaults, the request path and the
//!   query parameters.
//!
//! # Settings File Format
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 5000
//!
//! [api]
//! base_url = "https://api.zotero.org"
//! page_size = 100
//! timeout_seconds = 30
//!
//! [cache]
//! collection_ttl_seconds = 3600
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! Every key can be overridden from the environment, e.g.
//! `ZOTERO_PROXY_SERVER__PORT=8080` or `ZOTERO_PROXY_API__PAGE_SIZE=50`.

mod request;

pub use request::{ConfigResolver, Environment, QueryParams, RequestConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the settings file looked up in the working and config directories
pub const CONFIG_FILE_NAME: &str = "zotero-bib-proxy.toml";

/// Process-wide settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listening address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

/// Remote API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the Zotero Web API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Results requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Timeout for every single page request
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.zotero.org".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_timeout() -> u64 {
    30
}

/// Collection index cache settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum age of a cached collection index; unset keeps it until a miss
    #[serde(default)]
    pub collection_ttl_seconds: Option<u64>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` for structured output, anything else for plain text
    #[serde(default)]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load settings from a file, overlaid by `ZOTERO_PROXY_*` environment variables
pub fn load_config(path: &Path) -> Result<Settings, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(env_source())
        .build()?
        .try_deserialize()
}

/// Settings from the environment and defaults only
pub fn get_config() -> Result<Settings, config::ConfigError> {
    config::Config::builder()
        .add_source(env_source())
        .build()?
        .try_deserialize()
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix("ZOTERO_PROXY")
        .prefix_separator("_")
        .separator("__")
}

/// Find a settings file in the working directory or the user config directory
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("zotero-bib-proxy").join("config.toml"))
        .filter(|path| path.is_file())
}
