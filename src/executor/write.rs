use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::error;

use crate::endpoint::{Endpoint, FailureKind};
use crate::error::Error;
use crate::health::HealthRegistry;
use crate::metrics::{metrics, OpKind};
use crate::router::ReplicaRouter;

/// Runs writes against the primary, exactly once
///
/// No retry happens at this layer so a write is never applied twice by
/// accident.
pub struct WriteExecutor<E: Endpoint> {
    primary: Arc<E>,
    registry: Arc<HealthRegistry>,
}

impl<E: Endpoint> WriteExecutor<E> {
    pub fn new(primary: Arc<E>, registry: Arc<HealthRegistry>) -> Self {
        Self { primary, registry }
    }

    /// Endpoint every write goes to
    pub fn write_endpoint(&self) -> Arc<E> {
        self.primary.clone()
    }

    /// Execute a query through the write path
    pub async fn write(&self, query: &E::Query) -> Result<E::Output, Error<E::Error>> {
        self.execute_write(|endpoint| async move { endpoint.execute(query).await })
            .await
    }

    /// Execute a write operation against the primary
    ///
    /// Success marks the primary healthy; a connection failure marks it
    /// unhealthy. An error result leaves the cached state alone.
    pub async fn execute_write<T, F, Fut>(&self, op: F) -> Result<T, Error<E::Error>>
    where
        F: FnOnce(Arc<E>) -> Fut,
        Fut: Future<Output = Result<T, E::Error>>,
    {
        let role = ReplicaRouter::select_write();
        let started = Instant::now();
        let result = op(self.primary.clone()).await;
        metrics().record_operation(
            OpKind::Write,
            role,
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );

        match result {
            Ok(value) => {
                self.registry.report(role, true);
                Ok(value)
            }
            Err(e) => {
                let kind = E::classify(&e);
                if kind == FailureKind::Connection {
                    self.registry.report(role, false);
                }
                error!(error = %e, kind = ?kind, "Write operation failed");
                Err(Error::Write { source: e })
            }
        }
    }
}
