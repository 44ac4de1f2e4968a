use crate::config::ReplicaConfig;
use crate::endpoint::Role;
use crate::health::HealthSnapshot;

/// Read-write splitter
///
/// Pure decision function: no I/O and no mutation. Writes never consult it.
pub struct ReplicaRouter;

impl ReplicaRouter {
    /// Select the endpoint for a read
    ///
    /// Returns Replica only when the replica is enabled in config, was
    /// actually constructed, and is currently believed healthy.
    pub fn select_read(config: &ReplicaConfig, health: &HealthSnapshot) -> Role {
        if config.enabled && health.replica_usable() {
            Role::Replica
        } else {
            Role::Primary
        }
    }

    /// Select the endpoint for a write
    ///
    /// There is no configuration under which a write reaches a replica.
    pub const fn select_write() -> Role {
        Role::Primary
    }
}
