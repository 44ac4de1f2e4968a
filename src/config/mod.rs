//! Configuration
//!
//! Read once at startup from an optional TOML file, then overlaid with the
//! `DB_*` environment variables (see the `ENV_*` constants). Every section
//! and field has a default, so an empty file or no file at all is valid.

mod env;
mod schema;

pub use env::{
    ENV_HEALTH_CHECK_INTERVAL_MS, ENV_HEALTH_CHECK_TIMEOUT_MS, ENV_REPLICA_ENABLED,
    ENV_REPLICA_FALLBACK, ENV_REPLICA_MAX_RETRIES, ENV_REPLICA_RETRY_DELAY_MS,
};
pub use schema::*;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
}

/// Parse a TOML config file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load the startup config: file values if a path is given, then env overrides
pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides()?;
    Ok(config)
}
