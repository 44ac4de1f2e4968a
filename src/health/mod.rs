//! Health monitoring for the primary and replica endpoints
//!
//! This module provides:
//! - A shared, lock-protected health cache updated by probes and real traffic
//! - Periodic background probes with their own short timeout
//! - Manual failover and replica reset for operators

mod checker;
mod registry;
mod state;

pub use checker::HealthMonitor;
pub use registry::{HealthRegistry, RegistryStats};
pub use state::{EndpointHealth, HealthSnapshot};
