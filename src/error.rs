use std::time::Duration;

use crate::endpoint::Role;

/// Failure surfaced by the read, write and transaction executors
///
/// `E` is the driver's error type. Probe failures never appear here; they
/// only update the cached health state.
#[derive(Debug, thiserror::Error)]
pub enum Error<E>
where
    E: std::error::Error + 'static,
{
    #[error("read failed on {role}: {source}")]
    Read {
        role: Role,
        #[source]
        source: E,
    },

    #[error("write failed on primary: {source}")]
    Write {
        #[source]
        source: E,
    },

    #[error("transaction failed after {attempts} attempt(s): {source}")]
    Transaction {
        attempts: u32,
        #[source]
        source: E,
    },

    #[error("timed out waiting {waited:?} for a transaction slot")]
    SlotTimeout { waited: Duration },

    #[error("transaction slot queue full (max {max})")]
    SlotQueueFull { max: usize },

    #[error("transaction exceeded timeout of {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("operation cancelled")]
    Cancelled,
}

impl<E> Error<E>
where
    E: std::error::Error + 'static,
{
    /// Endpoint role the failure came from, if it came from an endpoint
    pub fn role(&self) -> Option<Role> {
        match self {
            Error::Read { role, .. } => Some(*role),
            Error::Write { .. } | Error::Transaction { .. } | Error::Timeout { .. } => {
                Some(Role::Primary)
            }
            Error::SlotTimeout { .. } | Error::SlotQueueFull { .. } | Error::Cancelled => None,
        }
    }

    /// Underlying driver error, if any
    pub fn driver_error(&self) -> Option<&E> {
        match self {
            Error::Read { source, .. }
            | Error::Write { source }
            | Error::Transaction { source, .. } => Some(source),
            _ => None,
        }
    }
}
