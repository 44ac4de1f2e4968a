use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::circuit::{SlotError, SlotPermit, TransactionSlots};
use crate::config::TransactionConfig;
use crate::endpoint::{
    Endpoint, FailureKind, IsolationLevel, Role, Transactional, TransactionSettings,
};
use crate::error::Error;
use crate::health::HealthRegistry;
use crate::metrics::{metrics, OpKind};

use super::backoff;

/// Per-call transaction options
///
/// Unset fields fall back to [`TransactionConfig`].
#[derive(Debug, Clone, Default)]
pub struct TransactionOptions {
    pub isolation_level: Option<IsolationLevel>,
    /// Time allowed to wait for a transaction slot
    pub max_wait: Option<Duration>,
    /// Maximum execution time of one attempt
    pub timeout: Option<Duration>,
    /// Retries after the first attempt
    pub retries: Option<u32>,
    /// Aborts slot waits and backoff delays
    pub cancel: Option<CancellationToken>,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Linear backoff before retry `attempt + 1`, saturating at [`Duration::MAX`]
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt.saturating_add(1))
}

/// Runs grouped work atomically on the primary with bounded retry
pub struct TransactionExecutor<E: Transactional> {
    primary: Arc<E>,
    registry: Arc<HealthRegistry>,
    slots: Arc<TransactionSlots>,
    config: TransactionConfig,
}

impl<E: Transactional> TransactionExecutor<E> {
    pub fn new(
        primary: Arc<E>,
        registry: Arc<HealthRegistry>,
        slots: Arc<TransactionSlots>,
        config: TransactionConfig,
    ) -> Self {
        Self {
            primary,
            registry,
            slots,
            config,
        }
    }

    /// Run `body` inside a transaction on the primary
    ///
    /// On failure the whole body is retried from scratch after a linearly
    /// increasing delay (`base * (attempt + 1)`), up to `retries` times. The
    /// last error is returned once the budget is spent. A successful commit
    /// never re-runs the body.
    ///
    /// Each attempt waits at most `max_wait` for a slot and an open
    /// transaction combined, and at most `timeout` for the body and commit.
    pub async fn run_transaction<T, F>(
        &self,
        mut body: F,
        options: TransactionOptions,
    ) -> Result<T, Error<E::Error>>
    where
        F: for<'t> FnMut(&'t mut E::Tx) -> BoxFuture<'t, Result<T, E::Error>>,
    {
        let retries = options.retries.unwrap_or(self.config.retries);
        let settings = TransactionSettings {
            isolation_level: options.isolation_level.or(self.config.isolation_level),
        };
        let max_wait = options.max_wait.unwrap_or_else(|| self.config.max_wait());
        let timeout = options.timeout.unwrap_or_else(|| self.config.timeout());
        let base_delay = self.config.retry_base_delay();
        let cancel = options.cancel.as_ref();

        let mut attempt: u32 = 0;
        loop {
            let err = match self
                .attempt(&mut body, &settings, max_wait, timeout, attempt, cancel)
                .await
            {
                Ok(value) => {
                    metrics().record_transaction(true);
                    debug!(attempts = attempt + 1, "Transaction committed");
                    return Ok(value);
                }
                Err(e) => e,
            };

            if attempt < retries && self.should_retry(&err) {
                let delay = retry_delay(base_delay, attempt);
                warn!(
                    error = %err,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Transaction failed, retrying"
                );
                metrics().record_transaction_retry();
                if let Err(cancelled) = backoff(delay, cancel).await {
                    metrics().record_transaction(false);
                    return Err(cancelled);
                }
                attempt += 1;
                continue;
            }

            metrics().record_transaction(false);
            warn!(error = %err, attempts = attempt + 1, "Transaction failed");
            return Err(err);
        }
    }

    fn should_retry(&self, err: &Error<E::Error>) -> bool {
        if matches!(err, Error::Cancelled) {
            return false;
        }
        if !self.config.retry_transient_only {
            return true;
        }
        err.driver_error()
            .map(|e| E::classify(e).is_transient())
            .unwrap_or(true)
    }

    async fn attempt<T, F>(
        &self,
        body: &mut F,
        settings: &TransactionSettings,
        max_wait: Duration,
        timeout: Duration,
        attempt: u32,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, Error<E::Error>>
    where
        F: for<'t> FnMut(&'t mut E::Tx) -> BoxFuture<'t, Result<T, E::Error>>,
    {
        let attempts = attempt + 1;
        let wait_started = tokio::time::Instant::now();
        let _permit = self.acquire_slot(max_wait, cancel).await?;
        let started = Instant::now();

        // Opening the transaction shares the slot wait budget
        let remaining = max_wait.saturating_sub(wait_started.elapsed());
        let begun = match tokio::time::timeout(remaining, self.primary.begin(settings)).await {
            Ok(begun) => begun,
            Err(_) => {
                warn!(max_wait = ?max_wait, "Timed out opening transaction");
                metrics().record_operation(
                    OpKind::Transaction,
                    Role::Primary,
                    false,
                    started.elapsed().as_secs_f64(),
                );
                return Err(Error::SlotTimeout { waited: max_wait });
            }
        };

        // Body and commit share one time budget
        let body_started = tokio::time::Instant::now();
        let result = match begun {
            Ok(mut tx) => {
                let outcome = tokio::time::timeout(timeout, body(&mut tx)).await;
                match outcome {
                    Ok(Ok(value)) => {
                        let remaining = timeout.saturating_sub(body_started.elapsed());
                        match tokio::time::timeout(remaining, self.primary.commit(tx)).await {
                            Ok(Ok(())) => Ok(value),
                            Ok(Err(e)) => Err(Error::Transaction { attempts, source: e }),
                            Err(_) => {
                                warn!(timeout = ?timeout, "Transaction commit timed out");
                                Err(Error::Timeout { timeout })
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        self.rollback(tx, timeout).await;
                        Err(Error::Transaction { attempts, source: e })
                    }
                    Err(_) => {
                        self.rollback(tx, timeout).await;
                        Err(Error::Timeout { timeout })
                    }
                }
            }
            Err(e) => Err(Error::Transaction { attempts, source: e }),
        };

        metrics().record_operation(
            OpKind::Transaction,
            Role::Primary,
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        match &result {
            Ok(_) => self.registry.report(Role::Primary, true),
            Err(e) => {
                let connection_failure = e
                    .driver_error()
                    .map(|d| E::classify(d) == FailureKind::Connection)
                    .unwrap_or(false);
                if connection_failure {
                    self.registry.report(Role::Primary, false);
                }
            }
        }

        result
    }

    async fn acquire_slot(
        &self,
        max_wait: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<SlotPermit, Error<E::Error>> {
        let acquired = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Error::Cancelled),
                r = self.slots.acquire(max_wait) => r,
            },
            None => self.slots.acquire(max_wait).await,
        };

        acquired.map_err(|e| match e {
            SlotError::QueueFull { max } => Error::SlotQueueFull { max },
            SlotError::Timeout { timeout } => Error::SlotTimeout { waited: timeout },
        })
    }

    async fn rollback(&self, tx: E::Tx, timeout: Duration) {
        match tokio::time::timeout(timeout, self.primary.rollback(tx)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Transaction rollback failed"),
            Err(_) => warn!(timeout = ?timeout, "Transaction rollback timed out"),
        }
    }
}
