use crate::cloudflare::DEFAULT_API_BASE_URL;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Process configuration loaded from environment variables or TOML file.
///
/// User settings (token, account, period) are not part of this; they live in
/// `settings.json` under `data_dir`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Base URL of the Cloudflare v4 API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Per-request timeout for every call to the analytics API.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Maximum sites fetched in parallel. 0 = unbounded.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// How long a successful aggregation is served before refetching. 0 = always refetch.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Whether to refresh analytics periodically in the background.
    #[serde(default = "default_background_refresh")]
    pub background_refresh: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8787
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

const fn default_fetch_timeout_secs() -> u64 {
    10
}

const fn default_max_concurrent_fetches() -> usize {
    8
}

const fn default_cache_ttl_secs() -> u64 {
    60
}

const fn default_background_refresh() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            api_base_url: default_api_base_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            cache_ttl_secs: default_cache_ttl_secs(),
            background_refresh: default_background_refresh(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Environment variables override file values:
    /// - `FLARESTATS_HOST` → host
    /// - `FLARESTATS_PORT` → port
    /// - `FLARESTATS_DATA_DIR` → data_dir
    /// - `FLARESTATS_API_BASE_URL` → api_base_url
    /// - `FLARESTATS_FETCH_TIMEOUT` → fetch_timeout_secs
    /// - `FLARESTATS_MAX_CONCURRENCY` → max_concurrent_fetches
    /// - `FLARESTATS_CACHE_TTL` → cache_ttl_secs
    /// - `FLARESTATS_BACKGROUND_REFRESH` → background_refresh
    pub fn load(config_path: Option<&Path>) -> Self {
        let mut config =
            config_path.map_or_else(Self::default, |path| match std::fs::read_to_string(path) {
                Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse config file: {e}, using defaults");
                    Self::default()
                }),
                Err(e) => {
                    tracing::warn!("Failed to read config file: {e}, using defaults");
                    Self::default()
                }
            });

        if let Ok(host) = std::env::var("FLARESTATS_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("FLARESTATS_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }
        if let Ok(data_dir) = std::env::var("FLARESTATS_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(url) = std::env::var("FLARESTATS_API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Ok(val) = std::env::var("FLARESTATS_FETCH_TIMEOUT") {
            if let Ok(t) = val.parse() {
                config.fetch_timeout_secs = t;
            }
        }
        if let Ok(val) = std::env::var("FLARESTATS_MAX_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                config.max_concurrent_fetches = n;
            }
        }
        if let Ok(val) = std::env::var("FLARESTATS_CACHE_TTL") {
            if let Ok(t) = val.parse() {
                config.cache_ttl_secs = t;
            }
        }
        if let Ok(val) = std::env::var("FLARESTATS_BACKGROUND_REFRESH") {
            config.background_refresh = val != "0" && val.to_lowercase() != "false";
        }

        config
    }

    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
