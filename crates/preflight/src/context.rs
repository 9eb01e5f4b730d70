//! Invocation context handed to the host engine.

use sha2::{Digest, Sha256};
use stellar_xdr::curr::{AccountId, Hash, LedgerFootprint, OperationBody};

use crate::network_config::Quotas;

/// Network identifier derived from the network passphrase.
///
/// Shapes every hash pre-image the engine computes (contract ids,
/// authorization payloads), so simulating against the wrong passphrase
/// produces plausible but unusable results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkId(pub [u8; 32]);

impl NetworkId {
    /// Derive the network id from a passphrase.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(passphrase.as_bytes());
        Self(hasher.finalize().into())
    }
}

impl From<NetworkId> for Hash {
    fn from(id: NetworkId) -> Self {
        Hash(id.0)
    }
}

/// Everything the host engine needs to execute one operation, fixed before
/// dispatch and immutable throughout the run.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Resolved source account of the simulated operation.
    pub source_account: AccountId,
    /// The operation under simulation.
    pub op: OperationBody,
    /// The initial footprint: the caller-supplied one for provided-mode
    /// operations, empty when the run derives its own.
    pub footprint: LedgerFootprint,
    /// The pinned ledger sequence the snapshot observes.
    pub ledger_sequence: u32,
    /// Protocol version the pinned ledger closed under.
    pub protocol_version: u32,
    /// Close time of the pinned ledger, seconds since epoch.
    pub close_time: u64,
    /// Base reserve in effect at the pinned ledger.
    pub base_reserve: u32,
    /// Network identity for hash pre-images.
    pub network_id: NetworkId,
    /// Total byte size of live Soroban state at the pinned ledger.
    pub bucket_list_size: u64,
    /// Resource ceilings the engine must meter against.
    pub quotas: Quotas,
    /// Minimum TTL granted to newly created temporary entries.
    pub min_temp_entry_ttl: u32,
    /// Minimum TTL granted to newly created persistent entries.
    pub min_persistent_entry_ttl: u32,
    /// Hard cap on any entry's TTL.
    pub max_entry_ttl: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_id_is_deterministic() {
        let a = NetworkId::from_passphrase("Test SDF Network ; September 2015");
        let b = NetworkId::from_passphrase("Test SDF Network ; September 2015");
        let c = NetworkId::from_passphrase("Public Global Stellar Network ; September 2015");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
