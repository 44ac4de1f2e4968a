//! Environment variable overrides
//!
//! The flat option set read by host processes at startup:
//!
//! | Variable                       | Field                          |
//! |--------------------------------|--------------------------------|
//! | `DB_REPLICA_ENABLED`           | `replica.enabled`              |
//! | `DB_REPLICA_FALLBACK_TO_MAIN`  | `replica.fallback_to_main`     |
//! | `DB_REPLICA_MAX_RETRIES`       | `replica.max_retries`          |
//! | `DB_REPLICA_RETRY_DELAY_MS`    | `replica.retry_delay_ms`       |
//! | `DB_HEALTH_CHECK_INTERVAL_MS`  | `health.check_interval_ms`     |
//! | `DB_HEALTH_CHECK_TIMEOUT_MS`   | `health.check_timeout_ms`      |
//!
//! Only the literal `true` enables the replica; anything other than the
//! literal `false` keeps fallback on.

use std::str::FromStr;

use super::{Config, ConfigError};

pub const ENV_REPLICA_ENABLED: &str = "DB_REPLICA_ENABLED";
pub const ENV_REPLICA_FALLBACK: &str = "DB_REPLICA_FALLBACK_TO_MAIN";
pub const ENV_REPLICA_MAX_RETRIES: &str = "DB_REPLICA_MAX_RETRIES";
pub const ENV_REPLICA_RETRY_DELAY_MS: &str = "DB_REPLICA_RETRY_DELAY_MS";
pub const ENV_HEALTH_CHECK_INTERVAL_MS: &str = "DB_HEALTH_CHECK_INTERVAL_MS";
pub const ENV_HEALTH_CHECK_TIMEOUT_MS: &str = "DB_HEALTH_CHECK_TIMEOUT_MS";

impl Config {
    /// Build a config from defaults plus process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from defaults plus values returned by `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Overlay process environment on an already loaded config
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_REPLICA_ENABLED) {
            self.replica.enabled = v == "true";
        }
        if let Some(v) = lookup(ENV_REPLICA_FALLBACK) {
            self.replica.fallback_to_main = v != "false";
        }
        if let Some(v) = lookup(ENV_REPLICA_MAX_RETRIES) {
            self.replica.max_retries = parse(ENV_REPLICA_MAX_RETRIES, v)?;
        }
        if let Some(v) = lookup(ENV_REPLICA_RETRY_DELAY_MS) {
            self.replica.retry_delay_ms = parse(ENV_REPLICA_RETRY_DELAY_MS, v)?;
        }
        if let Some(v) = lookup(ENV_HEALTH_CHECK_INTERVAL_MS) {
            self.health.check_interval_ms = parse(ENV_HEALTH_CHECK_INTERVAL_MS, v)?;
        }
        if let Some(v) = lookup(ENV_HEALTH_CHECK_TIMEOUT_MS) {
            self.health.check_timeout_ms = parse(ENV_HEALTH_CHECK_TIMEOUT_MS, v)?;
        }
        Ok(())
    }
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}
