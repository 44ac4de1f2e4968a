use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::TransactionConfig;

/// RAII permit that releases the slot when dropped
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
}

/// Error type for slot acquisition
#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("Queue full: max queue size {max} exceeded")]
    QueueFull { max: usize },

    #[error("Timeout waiting for available slot after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Bounds the number of transactions open on the primary
///
/// Callers beyond `max_concurrent` wait in a bounded queue for at most the
/// caller-supplied `max_wait`.
pub struct TransactionSlots {
    /// Semaphore for controlling concurrency
    semaphore: Arc<Semaphore>,
    /// Current number of waiting callers
    waiting: AtomicUsize,
    max_concurrent: usize,
    max_queue: usize,
    /// Statistics
    stats: SlotCounters,
}

#[derive(Default)]
struct SlotCounters {
    acquired: AtomicUsize,
    rejected_full: AtomicUsize,
    rejected_timeout: AtomicUsize,
}

impl TransactionSlots {
    pub fn new(max_concurrent: usize, max_queue: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            waiting: AtomicUsize::new(0),
            max_concurrent,
            max_queue,
            stats: SlotCounters::default(),
        }
    }

    /// Acquire a slot, waiting at most `max_wait`
    ///
    /// The permit must be held for the lifetime of the transaction.
    pub async fn acquire(&self, max_wait: Duration) -> Result<SlotPermit, SlotError> {
        if let Some(permit) = self.try_acquire() {
            return Ok(permit);
        }

        // Check if queue is full
        let current_waiting = self.waiting.fetch_add(1, Ordering::SeqCst);
        if current_waiting >= self.max_queue {
            self.waiting.fetch_sub(1, Ordering::SeqCst);
            self.stats.rejected_full.fetch_add(1, Ordering::Relaxed);
            warn!(max_queue = self.max_queue, "Transaction slot queue full");
            return Err(SlotError::QueueFull {
                max: self.max_queue,
            });
        }

        // Decrements the waiting count even if this future is dropped mid-wait
        let queued = QueuedWaiter(&self.waiting);
        let result = timeout(max_wait, self.semaphore.clone().acquire_owned()).await;
        drop(queued);

        match result {
            Ok(Ok(permit)) => {
                self.stats.acquired.fetch_add(1, Ordering::Relaxed);
                debug!("Acquired transaction slot after waiting");
                Ok(SlotPermit { _permit: permit })
            }
            // Semaphore is never closed; treat like a timeout
            Ok(Err(_)) | Err(_) => {
                self.stats.rejected_timeout.fetch_add(1, Ordering::Relaxed);
                warn!(max_wait = ?max_wait, "Timed out waiting for transaction slot");
                Err(SlotError::Timeout { timeout: max_wait })
            }
        }
    }

    /// Try to acquire a slot without waiting
    pub fn try_acquire(&self) -> Option<SlotPermit> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => {
                self.stats.acquired.fetch_add(1, Ordering::Relaxed);
                Some(SlotPermit { _permit: permit })
            }
            Err(_) => None,
        }
    }

    /// Get statistics
    pub fn stats(&self) -> SlotStats {
        let available = self.semaphore.available_permits();
        SlotStats {
            total_acquired: self.stats.acquired.load(Ordering::Relaxed),
            total_rejected_full: self.stats.rejected_full.load(Ordering::Relaxed),
            total_rejected_timeout: self.stats.rejected_timeout.load(Ordering::Relaxed),
            active: self.max_concurrent - available,
            waiting: self.waiting.load(Ordering::Relaxed),
        }
    }
}

impl From<&TransactionConfig> for TransactionSlots {
    fn from(config: &TransactionConfig) -> Self {
        Self::new(config.max_concurrent, config.max_queue_size)
    }
}

struct QueuedWaiter<'a>(&'a AtomicUsize);

impl Drop for QueuedWaiter<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Slot statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotStats {
    pub total_acquired: usize,
    pub total_rejected_full: usize,
    pub total_rejected_timeout: usize,
    pub active: usize,
    pub waiting: usize,
}
