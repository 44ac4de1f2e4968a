//! Database service facade
//!
//! Wires the health registry, monitor, router and executors together behind
//! one handle. Host processes build a single [`DatabaseService`] at startup,
//! call [`DatabaseService::start_monitoring`], and route all database work
//! through it.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::circuit::{SlotStats, TransactionSlots};
use crate::config::Config;
use crate::endpoint::{Endpoint, Transactional};
use crate::error::Error;
use crate::executor::{
    Endpoints, FailoverExecutor, TransactionExecutor, TransactionOptions, WriteExecutor,
};
use crate::health::{HealthMonitor, HealthRegistry, HealthSnapshot, RegistryStats};

/// Counters reported by [`DatabaseService::stats`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStats {
    pub replica_enabled: bool,
    pub health: RegistryStats,
    pub transaction_slots: SlotStats,
}

/// Replica-aware access to a primary and an optional read replica
pub struct DatabaseService<E: Endpoint> {
    config: Arc<Config>,
    endpoints: Endpoints<E>,
    registry: Arc<HealthRegistry>,
    monitor: Arc<HealthMonitor<E>>,
    reads: FailoverExecutor<E>,
    writes: WriteExecutor<E>,
    slots: Arc<TransactionSlots>,
    shutdown: CancellationToken,
    monitor_task: Mutex<Option<JoinHandle<()>>>,
}

impl<E: Endpoint> DatabaseService<E> {
    /// Build the service
    ///
    /// `replica` is only invoked when the replica is enabled in `config`. If
    /// it yields `None` the service runs against the primary alone.
    pub fn new<F>(config: Config, primary: E, replica: F) -> Self
    where
        F: FnOnce() -> Option<E>,
    {
        let replica = if config.replica.enabled {
            let endpoint = replica();
            if endpoint.is_none() {
                warn!("Read replica enabled but no replica endpoint available, using primary only");
            }
            endpoint.map(Arc::new)
        } else {
            None
        };

        let mut config = config;
        config.replica.enabled = replica.is_some();

        if config.replica.enabled {
            info!(
                fallback_to_main = config.replica.fallback_to_main,
                max_retries = config.replica.max_retries,
                retry_delay_ms = config.replica.retry_delay_ms,
                "Database read replica initialized"
            );
        } else {
            info!("Read replica disabled, all traffic goes to the primary");
        }

        let primary = Arc::new(primary);
        let endpoints = Endpoints::new(primary.clone(), replica.clone());
        let registry = Arc::new(HealthRegistry::new(config.replica.enabled));
        let monitor = Arc::new(HealthMonitor::new(
            registry.clone(),
            primary.clone(),
            replica,
            config.health.clone(),
        ));
        let reads = FailoverExecutor::new(endpoints.clone(), registry.clone(), config.replica.clone());
        let writes = WriteExecutor::new(primary, registry.clone());
        let slots = Arc::new(TransactionSlots::from(&config.transaction));

        Self {
            config: Arc::new(config),
            endpoints,
            registry,
            monitor,
            reads,
            writes,
            slots,
            shutdown: CancellationToken::new(),
            monitor_task: Mutex::new(None),
        }
    }

    /// Effective configuration
    ///
    /// `replica.enabled` reflects whether a replica endpoint actually exists.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Endpoint a read would be routed to right now
    pub fn read_endpoint(&self) -> Arc<E> {
        self.reads.read_endpoint()
    }

    /// Endpoint every write goes to
    pub fn write_endpoint(&self) -> Arc<E> {
        self.writes.write_endpoint()
    }

    /// The replica endpoint, if one is configured
    pub fn replica_endpoint(&self) -> Option<Arc<E>> {
        self.endpoints.replica().cloned()
    }

    pub async fn read(&self, query: &E::Query) -> Result<E::Output, Error<E::Error>> {
        self.reads.read(query).await
    }

    pub async fn write(&self, query: &E::Query) -> Result<E::Output, Error<E::Error>> {
        self.writes.write(query).await
    }

    /// Run a read operation with replica routing and primary fallback
    pub async fn execute_read<T, F, Fut>(&self, op: F) -> Result<T, Error<E::Error>>
    where
        F: FnMut(Arc<E>) -> Fut,
        Fut: Future<Output = Result<T, E::Error>>,
    {
        self.reads.execute_read(op).await
    }

    /// Like [`execute_read`](Self::execute_read), with a cancellable fallback delay
    pub async fn execute_read_with_cancel<T, F, Fut>(
        &self,
        op: F,
        cancel: &CancellationToken,
    ) -> Result<T, Error<E::Error>>
    where
        F: FnMut(Arc<E>) -> Fut,
        Fut: Future<Output = Result<T, E::Error>>,
    {
        self.reads.execute_read_with_cancel(op, cancel).await
    }

    /// Run a write operation on the primary, exactly once
    pub async fn execute_write<T, F, Fut>(&self, op: F) -> Result<T, Error<E::Error>>
    where
        F: FnOnce(Arc<E>) -> Fut,
        Fut: Future<Output = Result<T, E::Error>>,
    {
        self.writes.execute_write(op).await
    }

    /// Cached health state, no I/O
    pub fn get_health_status(&self) -> HealthSnapshot {
        self.monitor.get_health()
    }

    /// Probe every endpoint now and return the refreshed state
    pub async fn check_health(&self) -> HealthSnapshot {
        self.monitor.run_periodic_check().await
    }

    pub fn force_failover(&self) {
        self.monitor.force_failover();
    }

    pub fn reset_replica_health(&self) {
        self.monitor.reset_replica_health();
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            replica_enabled: self.registry.replica_enabled(),
            health: self.registry.stats(),
            transaction_slots: self.slots.stats(),
        }
    }

    /// Start the background health monitor
    ///
    /// Calling this while the monitor is running does nothing.
    pub fn start_monitoring(&self) {
        let mut task = self.monitor_task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Health monitor already running");
            return;
        }
        if self.shutdown.is_cancelled() {
            warn!("Database service is shut down, not starting health monitor");
            return;
        }
        *task = Some(self.monitor.clone().start(self.shutdown.child_token()));
    }

    /// Whether the background monitor task is alive
    pub fn is_monitoring(&self) -> bool {
        self.monitor_task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the background monitor and wait for it to exit
    ///
    /// In-flight operations are not interrupted. The monitor cannot be
    /// restarted afterwards.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self.monitor_task.lock().take();
        if let Some(handle) = task {
            if let Err(e) = handle.await {
                warn!(error = %e, "Health monitor task ended abnormally");
            }
        }
        info!("Database service shut down");
    }
}

impl<E: Transactional> DatabaseService<E> {
    /// Run `body` atomically on the primary
    ///
    /// See [`TransactionExecutor::run_transaction`] for retry semantics.
    pub async fn run_transaction<T, F>(
        &self,
        body: F,
        options: TransactionOptions,
    ) -> Result<T, Error<E::Error>>
    where
        F: for<'t> FnMut(&'t mut E::Tx) -> BoxFuture<'t, Result<T, E::Error>>,
    {
        let executor = TransactionExecutor::new(
            self.endpoints.primary().clone(),
            self.registry.clone(),
            self.slots.clone(),
            self.config.transaction.clone(),
        );
        executor.run_transaction(body, options).await
    }
}
