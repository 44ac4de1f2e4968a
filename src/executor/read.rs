use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ReplicaConfig;
use crate::endpoint::{Endpoint, FailureKind, Role};
use crate::error::Error;
use crate::health::HealthRegistry;
use crate::metrics::{metrics, OpKind};
use crate::router::ReplicaRouter;

use super::{backoff, Endpoints};

/// Runs reads with replica routing and a single fallback hop to the primary
pub struct FailoverExecutor<E: Endpoint> {
    endpoints: Endpoints<E>,
    registry: Arc<HealthRegistry>,
    config: ReplicaConfig,
}

impl<E: Endpoint> FailoverExecutor<E> {
    pub fn new(endpoints: Endpoints<E>, registry: Arc<HealthRegistry>, config: ReplicaConfig) -> Self {
        Self {
            endpoints,
            registry,
            config,
        }
    }

    /// Endpoint a read would be routed to right now
    pub fn read_endpoint(&self) -> Arc<E> {
        self.endpoints.get(self.select())
    }

    fn select(&self) -> Role {
        ReplicaRouter::select_read(&self.config, &self.registry.snapshot())
    }

    /// Execute a query through the read path
    pub async fn read(&self, query: &E::Query) -> Result<E::Output, Error<E::Error>> {
        self.execute_read(|endpoint| async move { endpoint.execute(query).await })
            .await
    }

    /// Execute a read operation
    ///
    /// `op` is invoked with the selected endpoint. If a replica attempt fails
    /// and fallback is enabled, `op` is invoked once more with the primary.
    /// When both fail, the primary's error is returned.
    ///
    /// A failed replica attempt marks the replica unhealthy. A failed primary
    /// attempt marks the primary unhealthy only for connection failures, so a
    /// bad query cannot take down the write path.
    pub async fn execute_read<T, F, Fut>(&self, op: F) -> Result<T, Error<E::Error>>
    where
        F: FnMut(Arc<E>) -> Fut,
        Fut: Future<Output = Result<T, E::Error>>,
    {
        self.run(op, None).await
    }

    /// Execute a read operation whose fallback delay can be cancelled
    ///
    /// Cancellation only interrupts the wait before the fallback attempt;
    /// an operation already running is never abandoned.
    pub async fn execute_read_with_cancel<T, F, Fut>(
        &self,
        op: F,
        cancel: &CancellationToken,
    ) -> Result<T, Error<E::Error>>
    where
        F: FnMut(Arc<E>) -> Fut,
        Fut: Future<Output = Result<T, E::Error>>,
    {
        self.run(op, Some(cancel)).await
    }

    async fn run<T, F, Fut>(
        &self,
        mut op: F,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, Error<E::Error>>
    where
        F: FnMut(Arc<E>) -> Fut,
        Fut: Future<Output = Result<T, E::Error>>,
    {
        let mut role = self.select();
        metrics().record_read_route(role);

        let mut attempt: u32 = 0;
        loop {
            let started = Instant::now();
            let result = op(self.endpoints.get(role)).await;
            let success = result.is_ok();

            metrics().record_operation(OpKind::Read, role, success, started.elapsed().as_secs_f64());

            let error = match result {
                Ok(value) => {
                    self.registry.report(role, true);
                    debug!(role = %role, attempt = attempt, "Read completed");
                    return Ok(value);
                }
                Err(e) => e,
            };

            let kind = E::classify(&error);
            // Any replica failure takes it out of rotation; the primary only on connection loss
            if role == Role::Replica || kind == FailureKind::Connection {
                self.registry.report(role, false);
            }

            let can_fall_back = role == Role::Replica
                && self.config.fallback_to_main
                && attempt == 0
                && attempt < self.config.max_retries;

            if !can_fall_back {
                return Err(Error::Read {
                    role,
                    source: error,
                });
            }

            warn!(error = %error, kind = ?kind, "Read replica failed, falling back to primary");
            metrics().record_read_fallback();

            role = Role::Primary;
            attempt += 1;

            // Error results are retried immediately, connection failures after a delay
            if kind == FailureKind::Connection {
                backoff(self.config.retry_delay(), cancel).await?;
            }
        }
    }
}
