//! Health state definitions for endpoint monitoring
//!
//! Health is a cached, advisory belief: a single boolean per endpoint that
//! flips on the latest observation, whether it came from a probe or from
//! real traffic.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::endpoint::Role;

/// Health state for a single endpoint
#[derive(Debug, Clone)]
pub struct EndpointHealth {
    /// Endpoint role
    pub role: Role,
    /// Current belief about reachability
    pub healthy: bool,
    /// Wall-clock time of the last probe, or of creation before the first one
    pub last_checked_at: DateTime<Utc>,
    /// Last observed success (probe or operation)
    pub last_success: Option<Instant>,
    /// Failures observed since the last success
    pub consecutive_failures: u32,
    /// Probes run against this endpoint
    pub total_checks: u64,
    /// Probes that failed
    pub total_failed_checks: u64,
}

impl EndpointHealth {
    /// Create a new EndpointHealth, optimistically healthy
    pub fn new(role: Role) -> Self {
        Self {
            role,
            healthy: true,
            last_checked_at: Utc::now(),
            last_success: None,
            consecutive_failures: 0,
            total_checks: 0,
            total_failed_checks: 0,
        }
    }

    /// Record an observed outcome
    ///
    /// Returns true if the healthy flag changed
    pub fn observe(&mut self, success: bool) -> bool {
        if success {
            self.last_success = Some(Instant::now());
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
        self.set_healthy(success)
    }

    /// Record a probe result and stamp the check time
    ///
    /// Returns true if the healthy flag changed
    pub fn record_check(&mut self, success: bool) -> bool {
        self.last_checked_at = Utc::now();
        self.total_checks += 1;
        if !success {
            self.total_failed_checks += 1;
        }
        self.observe(success)
    }

    /// Override the healthy flag without counting an observation
    ///
    /// Returns true if the healthy flag changed
    pub fn set_healthy(&mut self, healthy: bool) -> bool {
        let changed = self.healthy != healthy;
        self.healthy = healthy;
        changed
    }

    /// Get time since last success
    pub fn time_since_last_success(&self) -> Option<std::time::Duration> {
        self.last_success.map(|t| t.elapsed())
    }
}

/// Point-in-time view of cached health, exposed to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub primary: bool,
    /// Reported as true when no replica is configured
    pub replica: bool,
    pub replica_enabled: bool,
    /// Most recent probe of any endpoint, or service start
    pub last_checked_at: DateTime<Utc>,
}

impl HealthSnapshot {
    /// Whether reads may be served by the replica
    pub fn replica_usable(&self) -> bool {
        self.replica_enabled && self.replica
    }
}
