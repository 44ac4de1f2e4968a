//! Shared health registry
//!
//! One lock-protected [`EndpointHealth`] per configured endpoint. The registry
//! is injected into every executor by reference; it is the only place health
//! is mutated.

use parking_lot::RwLock;
use prometheus::IntGaugeVec;
use tracing::{debug, info, warn};

use crate::endpoint::Role;
use crate::metrics::metrics;

use super::state::{EndpointHealth, HealthSnapshot};

/// Registry for tracking endpoint health
///
/// The replica slot only exists when the replica is enabled and constructed.
/// The health gauge is written under the same lock as the state it mirrors.
pub struct HealthRegistry {
    primary: RwLock<EndpointHealth>,
    replica: Option<RwLock<EndpointHealth>>,
    gauge: IntGaugeVec,
}

impl HealthRegistry {
    /// Create a registry for the configured endpoints
    pub fn new(replica_enabled: bool) -> Self {
        Self::with_gauge(replica_enabled, metrics().endpoint_healthy.clone())
    }

    pub(crate) fn with_gauge(replica_enabled: bool, gauge: IntGaugeVec) -> Self {
        let registry = Self {
            primary: RwLock::new(EndpointHealth::new(Role::Primary)),
            replica: replica_enabled.then(|| RwLock::new(EndpointHealth::new(Role::Replica))),
            gauge,
        };
        registry.set_gauge(Role::Primary, true);
        if replica_enabled {
            registry.set_gauge(Role::Replica, true);
        }
        registry
    }

    fn set_gauge(&self, role: Role, healthy: bool) {
        self.gauge
            .with_label_values(&[role.as_str()])
            .set(i64::from(healthy));
    }

    fn slot(&self, role: Role) -> Option<&RwLock<EndpointHealth>> {
        match role {
            Role::Primary => Some(&self.primary),
            Role::Replica => self.replica.as_ref(),
        }
    }

    /// Whether a replica is configured
    pub fn replica_enabled(&self) -> bool {
        self.replica.is_some()
    }

    /// Report the outcome of a real operation
    ///
    /// Success marks the endpoint healthy, failure marks it unhealthy.
    pub fn report(&self, role: Role, success: bool) {
        let Some(slot) = self.slot(role) else {
            return;
        };
        let mut health = slot.write();
        let changed = health.observe(success);
        if changed {
            self.set_gauge(role, success);
        }
        drop(health);

        if changed {
            if success {
                info!(role = %role, "Endpoint marked healthy after successful operation");
            } else {
                warn!(role = %role, "Endpoint marked unhealthy after failed operation");
            }
        }
    }

    /// Record a probe result
    pub fn record_probe(&self, role: Role, success: bool) {
        let Some(slot) = self.slot(role) else {
            return;
        };
        let mut health = slot.write();
        let changed = health.record_check(success);
        if changed {
            self.set_gauge(role, success);
        }
        drop(health);

        metrics().record_health_check(role, success);
        if changed {
            if success {
                info!(role = %role, "Endpoint status changed to healthy");
            } else {
                warn!(role = %role, "Endpoint status changed to unhealthy");
            }
        } else {
            debug!(role = %role, healthy = success, "Health check completed");
        }
    }

    /// Check if an endpoint is currently believed healthy
    ///
    /// An endpoint that is not configured is never healthy.
    pub fn is_healthy(&self, role: Role) -> bool {
        self.slot(role).map(|h| h.read().healthy).unwrap_or(false)
    }

    /// Get a copy of one endpoint's state
    pub fn get(&self, role: Role) -> Option<EndpointHealth> {
        self.slot(role).map(|h| h.read().clone())
    }

    /// Pure read of the cached state
    pub fn snapshot(&self) -> HealthSnapshot {
        let primary = self.primary.read();
        let replica = self.replica.as_ref().map(|r| r.read());

        let last_checked_at = match &replica {
            Some(r) => primary.last_checked_at.max(r.last_checked_at),
            None => primary.last_checked_at,
        };

        HealthSnapshot {
            primary: primary.healthy,
            replica: replica.as_ref().map(|r| r.healthy).unwrap_or(true),
            replica_enabled: replica.is_some(),
            last_checked_at,
        }
    }

    /// Mark the replica unhealthy immediately
    pub fn force_failover(&self) {
        match &self.replica {
            Some(replica) => {
                let mut health = replica.write();
                health.set_healthy(false);
                self.set_gauge(Role::Replica, false);
                drop(health);
                warn!("Forced failover to primary");
            }
            None => debug!("Forced failover ignored, no replica configured"),
        }
    }

    /// Mark the replica healthy immediately
    pub fn reset_replica_health(&self) {
        match &self.replica {
            Some(replica) => {
                let mut health = replica.write();
                health.set_healthy(true);
                self.set_gauge(Role::Replica, true);
                drop(health);
                info!("Reset replica health status");
            }
            None => debug!("Replica health reset ignored, no replica configured"),
        }
    }

    /// Get statistics about the registry
    pub fn stats(&self) -> RegistryStats {
        let primary = self.primary.read();
        let replica = self.replica.as_ref().map(|r| r.read());

        RegistryStats {
            primary_checks: primary.total_checks,
            primary_failed_checks: primary.total_failed_checks,
            primary_consecutive_failures: primary.consecutive_failures,
            replica_checks: replica.as_ref().map(|r| r.total_checks).unwrap_or(0),
            replica_failed_checks: replica.as_ref().map(|r| r.total_failed_checks).unwrap_or(0),
            replica_consecutive_failures: replica
                .as_ref()
                .map(|r| r.consecutive_failures)
                .unwrap_or(0),
        }
    }
}

/// Statistics about the health registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub primary_checks: u64,
    pub primary_failed_checks: u64,
    pub primary_consecutive_failures: u32,
    pub replica_checks: u64,
    pub replica_failed_checks: u64,
    pub replica_consecutive_failures: u32,
}
