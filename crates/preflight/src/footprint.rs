//! Footprint resolution.
//!
//! A simulation either derives its footprint from the accesses the engine
//! actually performs (InvokeHostFunction), or takes one verbatim from the
//! transaction's inline resource data and holds the engine to it
//! (ExtendFootprintTtl, RestoreFootprint).

use std::collections::HashSet;

use stellar_xdr::curr::{LedgerFootprint, LedgerKey, Limits, WriteXdr};

use crate::{PreflightError, Result};

/// How the footprint for a simulation is established.
#[derive(Debug, Clone)]
pub enum FootprintMode {
    /// Start empty; the observed accesses become the footprint.
    Derived,
    /// Use the caller-supplied footprint; reject anything outside it.
    Provided(LedgerFootprint),
}

/// Records every ledger key the engine touches, in first-touch order.
///
/// Ordering is deterministic for byte-identical inputs because the engine
/// itself is: the recorded order is exactly the engine's access order.
#[derive(Debug)]
pub struct FootprintTracker {
    mode: FootprintMode,
    read_order: Vec<LedgerKey>,
    write_order: Vec<LedgerKey>,
    reads: HashSet<Vec<u8>>,
    writes: HashSet<Vec<u8>>,
    provided_read_only: HashSet<Vec<u8>>,
    provided_read_write: HashSet<Vec<u8>>,
}

fn key_bytes(key: &LedgerKey) -> Result<Vec<u8>> {
    Ok(key.to_xdr(Limits::none())?)
}

impl FootprintTracker {
    pub fn new(mode: FootprintMode) -> Result<Self> {
        let mut provided_read_only = HashSet::new();
        let mut provided_read_write = HashSet::new();
        if let FootprintMode::Provided(footprint) = &mode {
            for key in footprint.read_only.iter() {
                provided_read_only.insert(key_bytes(key)?);
            }
            for key in footprint.read_write.iter() {
                provided_read_write.insert(key_bytes(key)?);
            }
        }
        Ok(Self {
            mode,
            read_order: Vec::new(),
            write_order: Vec::new(),
            reads: HashSet::new(),
            writes: HashSet::new(),
            provided_read_only,
            provided_read_write,
        })
    }

    /// Record a read. Fails with `FootprintTooSmall` in provided mode if
    /// the key is in neither set.
    pub fn record_read(&mut self, key: &LedgerKey) -> Result<()> {
        let bytes = key_bytes(key)?;
        if matches!(self.mode, FootprintMode::Provided(_))
            && !self.provided_read_only.contains(&bytes)
            && !self.provided_read_write.contains(&bytes)
        {
            return Err(PreflightError::FootprintTooSmall {
                key: Box::new(key.clone()),
            });
        }
        if self.reads.insert(bytes) {
            self.read_order.push(key.clone());
        }
        Ok(())
    }

    /// Record a write. Fails with `FootprintTooSmall` in provided mode if
    /// the key is not in the read-write set.
    pub fn record_write(&mut self, key: &LedgerKey) -> Result<()> {
        let bytes = key_bytes(key)?;
        if matches!(self.mode, FootprintMode::Provided(_))
            && !self.provided_read_write.contains(&bytes)
        {
            return Err(PreflightError::FootprintTooSmall {
                key: Box::new(key.clone()),
            });
        }
        if self.writes.insert(bytes) {
            self.write_order.push(key.clone());
        }
        Ok(())
    }

    /// Number of distinct keys read (writes imply a read of the entry).
    pub fn read_entry_count(&self) -> usize {
        // Written keys that were never read still occupy a read slot once
        // the footprint is resolved, so count the union.
        let mut union = self.reads.clone();
        union.extend(self.writes.iter().cloned());
        union.len()
    }

    /// Number of distinct keys written.
    pub fn write_entry_count(&self) -> usize {
        self.writes.len()
    }

    /// Number of distinct keys touched in any way.
    pub fn touched_entry_count(&self) -> usize {
        self.read_entry_count()
    }

    /// Resolve the final footprint.
    ///
    /// In derived mode, written keys land in `read_write` and keys only
    /// read land in `read_only`, each in first-touch order; the sets are
    /// disjoint by construction. In provided mode the supplied footprint
    /// passes through unchanged.
    pub fn observed_footprint(&self) -> Result<LedgerFootprint> {
        match &self.mode {
            FootprintMode::Provided(footprint) => Ok(footprint.clone()),
            FootprintMode::Derived => {
                let mut read_only = Vec::new();
                for key in &self.read_order {
                    if !self.writes.contains(&key_bytes(key)?) {
                        read_only.push(key.clone());
                    }
                }
                let read_write = self.write_order.clone();
                Ok(LedgerFootprint {
                    read_only: read_only.try_into().map_err(|_| {
                        PreflightError::Internal("footprint read set exceeds XDR bounds".into())
                    })?,
                    read_write: read_write.try_into().map_err(|_| {
                        PreflightError::Internal("footprint write set exceeds XDR bounds".into())
                    })?,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use stellar_xdr::curr::{
        ContractDataDurability, ContractId, Hash, LedgerKeyContractData, ScAddress, ScVal,
    };

    use super::*;

    fn key(seed: u8) -> LedgerKey {
        LedgerKey::ContractData(LedgerKeyContractData {
            contract: ScAddress::Contract(ContractId(Hash([seed; 32]))),
            key: ScVal::U32(seed as u32),
            durability: ContractDataDurability::Persistent,
        })
    }

    fn footprint(read_only: Vec<LedgerKey>, read_write: Vec<LedgerKey>) -> LedgerFootprint {
        LedgerFootprint {
            read_only: read_only.try_into().unwrap(),
            read_write: read_write.try_into().unwrap(),
        }
    }

    #[test]
    fn test_derived_separates_reads_from_writes() {
        let mut tracker = FootprintTracker::new(FootprintMode::Derived).unwrap();
        tracker.record_read(&key(1)).unwrap();
        tracker.record_read(&key(2)).unwrap();
        tracker.record_write(&key(2)).unwrap();
        tracker.record_write(&key(3)).unwrap();

        let observed = tracker.observed_footprint().unwrap();
        assert_eq!(observed.read_only.as_slice(), &[key(1)]);
        assert_eq!(observed.read_write.as_slice(), &[key(2), key(3)]);
    }

    #[test]
    fn test_derived_order_is_first_touch() {
        let mut tracker = FootprintTracker::new(FootprintMode::Derived).unwrap();
        tracker.record_read(&key(3)).unwrap();
        tracker.record_read(&key(1)).unwrap();
        tracker.record_read(&key(3)).unwrap();
        tracker.record_read(&key(2)).unwrap();

        let observed = tracker.observed_footprint().unwrap();
        assert_eq!(observed.read_only.as_slice(), &[key(3), key(1), key(2)]);
    }

    #[test]
    fn test_provided_rejects_out_of_footprint_read() {
        let mode = FootprintMode::Provided(footprint(vec![key(1)], vec![]));
        let mut tracker = FootprintTracker::new(mode).unwrap();
        tracker.record_read(&key(1)).unwrap();
        assert!(matches!(
            tracker.record_read(&key(9)),
            Err(PreflightError::FootprintTooSmall { .. })
        ));
    }

    #[test]
    fn test_provided_rejects_write_to_read_only_key() {
        let mode = FootprintMode::Provided(footprint(vec![key(1)], vec![key(2)]));
        let mut tracker = FootprintTracker::new(mode).unwrap();
        tracker.record_write(&key(2)).unwrap();
        assert!(matches!(
            tracker.record_write(&key(1)),
            Err(PreflightError::FootprintTooSmall { .. })
        ));
    }

    #[test]
    fn test_provided_footprint_passes_through() {
        let provided = footprint(vec![key(1)], vec![key(2)]);
        let tracker =
            FootprintTracker::new(FootprintMode::Provided(provided.clone())).unwrap();
        assert_eq!(tracker.observed_footprint().unwrap(), provided);
    }

    #[test]
    fn test_entry_counts() {
        let mut tracker = FootprintTracker::new(FootprintMode::Derived).unwrap();
        tracker.record_read(&key(1)).unwrap();
        tracker.record_write(&key(2)).unwrap();
        tracker.record_read(&key(2)).unwrap();
        assert_eq!(tracker.read_entry_count(), 2);
        assert_eq!(tracker.write_entry_count(), 1);
    }
}
