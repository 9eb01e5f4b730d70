//! Simulator configuration.

use std::time::Duration;

/// Options recognized by the simulation pipeline.
///
/// The ledger read path is configured on the store implementation handed
/// to the [`Simulator`](crate::Simulator), not here.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Network passphrase; shapes every hash pre-image the engine computes.
    pub network_passphrase: String,
    /// Simulations against ledgers older than this protocol are rejected.
    pub protocol_version_floor: u32,
    /// Default deadline for one simulation, enforced through the
    /// cancellation context.
    pub simulation_deadline: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            network_passphrase: "Test SDF Network ; September 2015".to_string(),
            protocol_version_floor: 20,
            simulation_deadline: Duration::from_secs(5),
        }
    }
}
