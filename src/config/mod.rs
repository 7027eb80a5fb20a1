//! Configuration management for filtersync
//!
//! Settings are layered from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `FILTERSYNC__<section>__<key>`
//!
//! Examples:
//! - `FILTERSYNC__SYNC__ENABLED=false`
//! - `FILTERSYNC__SYNC__FILTER_DIR=/var/lib/filtersync`
//! - `FILTERSYNC__SERVER__BIND_ADDR=0.0.0.0:8089`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/filtersync.toml`.
//! This can be overridden using the `FILTERSYNC_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{Config, FilterConfig, HttpClientConfig, ServerConfig, SyncConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or validation
    /// fails (duplicate filters, zero interval, bad urls).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
