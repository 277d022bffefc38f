//! Configuration management for the layout server
//!
//! Settings are layered from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use podium_layout::config::Config;
//!
//! let config = Config::load(None).expect("Failed to load configuration");
//! println!("Layout listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Any scalar can be overridden with `PODIUM__<section>__<key>`:
//! - `PODIUM__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `PODIUM__PROXY__TIMEOUT_MS=2000`
//! - `PODIUM__PROXY__MAX_BODY_BYTES=10MB`
//!
//! # Configuration File
//!
//! Loaded from `config/layout.toml` unless `PODIUM_CONFIG` or the CLI
//! `--config` flag names another file. Podlets are declared as an array:
//!
//! ```toml
//! [[podlets]]
//! name = "header"
//! base_url = "http://localhost:7100"
//! timeout_ms = 500
//! ```

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{Config, LayoutConfig, PodletConfig, ProxyConfig, ServerConfig, TemplateConfig};
pub use validation::ValidationError;

use std::path::PathBuf;
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
    /// `path` overrides `PODIUM_CONFIG` and the default file location.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, skipping `.env`
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(&path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Look up a podlet by name
    pub fn podlet(&self, name: &str) -> Option<&PodletConfig> {
        self.podlets.iter().find(|p| p.name == name)
    }
}
