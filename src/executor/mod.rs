//! Read, write and transaction executors
//!
//! Callers never touch endpoints directly: reads go through
//! [`FailoverExecutor`], writes through [`WriteExecutor`] and multi-step
//! atomic work through [`TransactionExecutor`]. Each executor reports every
//! outcome back to the shared [`HealthRegistry`](crate::health::HealthRegistry).

mod read;
mod transaction;
mod write;

pub use read::FailoverExecutor;
pub use transaction::{TransactionExecutor, TransactionOptions};
pub use write::WriteExecutor;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::endpoint::Role;
use crate::error::Error;

/// Handles for the configured endpoints
pub struct Endpoints<E> {
    primary: Arc<E>,
    /// Present only when the replica is enabled
    replica: Option<Arc<E>>,
}

impl<E> Endpoints<E> {
    pub fn new(primary: Arc<E>, replica: Option<Arc<E>>) -> Self {
        Self { primary, replica }
    }

    pub fn primary(&self) -> &Arc<E> {
        &self.primary
    }

    pub fn replica(&self) -> Option<&Arc<E>> {
        self.replica.as_ref()
    }

    /// Handle for a role; a missing replica resolves to the primary
    pub fn get(&self, role: Role) -> Arc<E> {
        match role {
            Role::Primary => self.primary.clone(),
            Role::Replica => self.replica.as_ref().unwrap_or(&self.primary).clone(),
        }
    }
}

impl<E> Clone for Endpoints<E> {
    fn clone(&self) -> Self {
        Self {
            primary: self.primary.clone(),
            replica: self.replica.clone(),
        }
    }
}

/// Sleep between attempts, aborting early if `cancel` fires
pub(crate) async fn backoff<E>(
    delay: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<(), Error<E>>
where
    E: std::error::Error + 'static,
{
    if let Some(token) = cancel {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
    }
    if delay.is_zero() {
        return Ok(());
    }

    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}
