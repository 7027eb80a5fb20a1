use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetcher::HttpConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub http: HttpClientConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Filters known at startup; their files are expected under `sync.filter_dir`
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

/// Refresh loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Gates whether refresh cycles run at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_filter_dir")]
    pub filter_dir: PathBuf,
    #[serde(default = "default_update_interval_hours")]
    pub update_interval_hours: u64,
    /// File extension for `<id>.<ext>` filter files
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl SyncConfig {
    fn period_secs(&self) -> u64 {
        self.update_interval_hours.saturating_mul(3600)
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs())
    }

    /// Saturates at `TimeDelta::MAX` for intervals validation would reject
    pub fn period_delta(&self) -> TimeDelta {
        i64::try_from(self.period_secs())
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            filter_dir: default_filter_dir(),
            update_interval_hours: default_update_interval_hours(),
            extension: default_extension(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_filter_dir() -> PathBuf {
    PathBuf::from("data/filters")
}

fn default_update_interval_hours() -> u64 {
    24
}

fn default_extension() -> String {
    "txt".to_string()
}

/// Outbound HTTP settings for filter downloads
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpClientConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    pub proxy_url: Option<String>,
}

impl HttpClientConfig {
    pub fn to_http_config(&self) -> HttpConfig {
        HttpConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone(),
            proxy_url: self.proxy_url.clone(),
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            proxy_url: None,
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    concat!("filtersync/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Status endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8089))
}

/// A filter entry as stored in configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FilterConfig {
    pub id: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub name: String,
    pub url: String,
}

impl FilterConfig {
    pub fn new(id: u64, enabled: bool, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            enabled,
            name: name.into(),
            url: url.into(),
        }
    }
}
