//! Driver seam: the opaque connection handles this layer routes over
//!
//! An endpoint is bound to one physical database (primary or replica) and is
//! supplied by the caller's driver. This layer never builds queries itself;
//! it only decides which endpoint runs them and tracks the outcome.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;

/// Role of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Authoritative instance, the only target for writes
    Primary,
    /// Read-only, possibly lagging copy of the primary
    Replica,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Replica => "replica",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a failed operation should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport-level failure (refused, reset, timed out)
    Connection,
    /// The endpoint answered, but with an error result
    Query,
}

impl FailureKind {
    /// Whether retrying the same work may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureKind::Connection)
    }
}

/// Executor bound to a single database instance
///
/// Implementations are expected to be internally thread-safe (typically a
/// connection pool owned by the driver).
#[async_trait]
pub trait Endpoint: Send + Sync + 'static {
    /// Parameterized operation descriptor understood by the driver
    type Query: Send + Sync;
    /// Result produced by a successful operation
    type Output: Send;
    /// Driver error
    type Error: std::error::Error + Send + Sync + 'static;

    /// Execute an operation against this endpoint
    async fn execute(&self, query: &Self::Query) -> Result<Self::Output, Self::Error>;

    /// Cheap, idempotent read used to test reachability
    fn probe_query(&self) -> Self::Query;

    /// Classify a driver error
    ///
    /// Defaults to treating everything as a connection failure.
    fn classify(_error: &Self::Error) -> FailureKind {
        FailureKind::Connection
    }
}

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        };
        f.write_str(s)
    }
}

/// Settings passed to the driver when opening a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionSettings {
    /// `None` leaves the driver's default in place
    pub isolation_level: Option<IsolationLevel>,
}

/// Endpoint that can scope work in a transaction
#[async_trait]
pub trait Transactional: Endpoint {
    /// Open transaction handle
    type Tx: Send;

    async fn begin(&self, settings: &TransactionSettings) -> Result<Self::Tx, Self::Error>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), Self::Error>;

    async fn rollback(&self, tx: Self::Tx) -> Result<(), Self::Error>;
}
