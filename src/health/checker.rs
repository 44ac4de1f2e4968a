//! Health monitor
//!
//! Probes the primary always and the replica only when it is enabled. The
//! background loop is the only code in this crate that runs unsolicited.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng as _;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::HealthCheckConfig;
use crate::endpoint::{Endpoint, Role};

use super::registry::HealthRegistry;
use super::state::HealthSnapshot;

/// Health monitor for the configured endpoints
pub struct HealthMonitor<E: Endpoint> {
    /// Shared health registry
    registry: Arc<HealthRegistry>,
    primary: Arc<E>,
    /// Present only when the replica is enabled
    replica: Option<Arc<E>>,
    /// Configuration
    config: HealthCheckConfig,
}

impl<E: Endpoint> HealthMonitor<E> {
    pub fn new(
        registry: Arc<HealthRegistry>,
        primary: Arc<E>,
        replica: Option<Arc<E>>,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            registry,
            primary,
            replica,
            config,
        }
    }

    /// Run the endpoint's probe query under the probe timeout
    ///
    /// Returns true iff the probe completed without error in time.
    pub async fn probe(&self, endpoint: &E) -> bool {
        let query = endpoint.probe_query();
        let timeout = self.config.check_timeout();

        match tokio::time::timeout(timeout, endpoint.execute(&query)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(error = %e, "Probe failed");
                false
            }
            Err(_) => {
                debug!(timeout = ?timeout, "Probe timed out");
                false
            }
        }
    }

    /// Probe every configured endpoint and update the registry
    pub async fn run_periodic_check(&self) -> HealthSnapshot {
        let primary = self.probe(&self.primary);
        let replica = async {
            match &self.replica {
                Some(replica) => Some(self.probe(replica).await),
                None => None,
            }
        };
        let (primary_ok, replica_ok) = tokio::join!(primary, replica);

        self.registry.record_probe(Role::Primary, primary_ok);
        if let Some(ok) = replica_ok {
            self.registry.record_probe(Role::Replica, ok);
        }

        self.registry.snapshot()
    }

    /// Current cached state, no I/O
    pub fn get_health(&self) -> HealthSnapshot {
        self.registry.snapshot()
    }

    /// Stop routing reads to the replica until it is reset or probed healthy
    pub fn force_failover(&self) {
        self.registry.force_failover();
    }

    /// Allow the router to try the replica again before the next probe
    pub fn reset_replica_health(&self) {
        self.registry.reset_replica_health();
    }

    /// Start the background probe loop
    ///
    /// The loop runs until `shutdown` is cancelled. A failing or panicking
    /// probe only affects its own tick.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        if !self.config.enabled {
            info!("Health checks are disabled");
            return tokio::spawn(async move {
                shutdown.cancelled().await;
            });
        }

        let check_interval = self.config.check_interval().max(Duration::from_millis(1));
        info!(
            interval_ms = check_interval.as_millis() as u64,
            replica = self.replica.is_some(),
            "Database health monitoring started"
        );

        tokio::spawn(async move {
            // Small random stagger so co-started processes do not probe in lockstep
            let max_jitter = check_interval.as_millis() as u64 / 10;
            let initial_delay = rand::thread_rng().gen_range(0..=max_jitter);
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Health monitor shutting down");
                    return;
                }
                _ = tokio::time::sleep(Duration::from_millis(initial_delay)) => {}
            }

            let mut ticker = tokio::time::interval(check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Health monitor shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let monitor = self.clone();
                        let tick = tokio::spawn(async move { monitor.run_periodic_check().await });
                        match tick.await {
                            Ok(snapshot) => debug!(
                                primary = snapshot.primary,
                                replica = snapshot.replica,
                                "Health check tick completed"
                            ),
                            Err(e) => error!(error = %e, "Database health check failed"),
                        }
                    }
                }
            }
        })
    }
}
