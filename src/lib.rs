//! Replica-aware database access layer
//!
//! Routes reads to a read replica while it is healthy, falls back to the
//! primary when the replica fails, sends every write and transaction to the
//! primary, and keeps a cached health state fed by a background probe loop
//! and by the outcome of real operations.
//!
//! Drivers plug in through [`Endpoint`] and [`Transactional`]; everything
//! else is reached through [`DatabaseService`].

pub mod circuit;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod router;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::{load_config, Config, ConfigError};
pub use endpoint::{Endpoint, FailureKind, IsolationLevel, Role, Transactional, TransactionSettings};
pub use error::Error;
pub use executor::TransactionOptions;
pub use health::HealthSnapshot;
pub use service::{DatabaseService, ServiceStats};
