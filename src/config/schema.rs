use std::time::Duration;

use serde::Deserialize;

use crate::endpoint::IsolationLevel;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Read replica routing
    #[serde(default)]
    pub replica: ReplicaConfig,
    /// Periodic endpoint probing
    #[serde(default)]
    pub health: HealthCheckConfig,
    /// Transaction defaults
    #[serde(default)]
    pub transaction: TransactionConfig,
}

// ============================================================================
// Replica Configuration
// ============================================================================

/// Read replica configuration
///
/// Loaded once at startup and never mutated. When `enabled` is false the
/// replica endpoint is never constructed and never probed.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaConfig {
    /// Route reads to the replica while it is healthy
    #[serde(default)]
    pub enabled: bool,
    /// Retry a failed replica read once against the primary
    #[serde(default = "default_fallback_to_main")]
    pub fallback_to_main: bool,
    /// Upper bound on additional attempts after the first one
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the fallback attempt after a connection failure (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_fallback_to_main() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fallback_to_main: default_fallback_to_main(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl ReplicaConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// ============================================================================
// Health Check Configuration
// ============================================================================

/// Health check configuration for the configured endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckConfig {
    /// Whether the background probe loop runs
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,
    /// Interval between checks (milliseconds)
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    /// Timeout for each probe (milliseconds)
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,
}

fn default_health_enabled() -> bool {
    true
}

fn default_check_interval_ms() -> u64 {
    30_000
}

fn default_check_timeout_ms() -> u64 {
    3000
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            check_interval_ms: default_check_interval_ms(),
            check_timeout_ms: default_check_timeout_ms(),
        }
    }
}

impl HealthCheckConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }
}

// ============================================================================
// Transaction Configuration
// ============================================================================

/// Defaults for transactions run against the primary
///
/// Individual calls can override everything except `max_concurrent`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionConfig {
    /// Maximum transactions open on the primary at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Maximum callers waiting for a transaction slot
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// Time allowed to wait for a transaction slot (milliseconds)
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// Maximum execution time of one attempt (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Default number of retries after the first attempt
    #[serde(default)]
    pub retries: u32,
    /// Base for the linear backoff between attempts (milliseconds)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Default isolation level; driver default when unset
    #[serde(default)]
    pub isolation_level: Option<IsolationLevel>,
    /// Only retry failures the driver classifies as transient
    #[serde(default)]
    pub retry_transient_only: bool,
}

fn default_max_concurrent() -> usize {
    10
}

fn default_max_queue_size() -> usize {
    100
}

fn default_max_wait_ms() -> u64 {
    2000
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_queue_size: default_max_queue_size(),
            max_wait_ms: default_max_wait_ms(),
            timeout_ms: default_timeout_ms(),
            retries: 0,
            retry_base_delay_ms: default_retry_base_delay_ms(),
            isolation_level: None,
            retry_transient_only: false,
        }
    }
}

impl TransactionConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}
