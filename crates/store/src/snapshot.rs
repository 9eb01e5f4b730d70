//! Point-in-time, memoizing view of ledger state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use stellar_xdr::curr::{Hash, LedgerEntry, LedgerKey, Limits, WriteXdr};
use tracing::debug;

use crate::reader::{EntryWithLiveUntil, ReadTx};
use crate::{Result, StoreError};

/// Compute the hash of a ledger key, as used to address its TTL entry.
pub fn ledger_key_hash(key: &LedgerKey) -> Result<Hash> {
    let bytes = key.to_xdr(Limits::none())?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(Hash(hasher.finalize().into()))
}

/// Outcome of a snapshot lookup.
///
/// An archived entry is not an error: RestoreFootprint legitimately reads
/// entries whose TTL has lapsed, and the invocation bridge decides what an
/// archived result means for the operation at hand.
#[derive(Debug, Clone)]
pub enum SnapshotEntry {
    /// The entry exists and (if TTL'd) is live at the snapshot sequence.
    Live(LedgerEntry, Option<u32>),
    /// The entry exists but its live-until ledger is in the past.
    Archived(LedgerEntry, u32),
    /// No such entry.
    Missing,
}

/// A read-only view of ledger state pinned to one sealed sequence.
///
/// All reads are memoized: repeated lookups of the same key are O(1) and
/// observably identical, so the host VM sees a stable world even if the
/// backend advances mid-simulation. The snapshot owns its read transaction
/// and releases it on [`close`](SimulationSnapshot::close) or on drop,
/// whichever comes first.
pub struct SimulationSnapshot {
    tx: Box<dyn ReadTx>,
    sequence: u32,
    cache: Mutex<HashMap<Vec<u8>, Option<EntryWithLiveUntil>>>,
    closed: AtomicBool,
}

impl SimulationSnapshot {
    /// Pin a snapshot to the sequence the read transaction observes.
    ///
    /// The transaction is released if the sequence cannot be determined.
    pub fn open(tx: Box<dyn ReadTx>) -> Result<Self> {
        let sequence = match tx.get_latest_ledger_sequence() {
            Ok(seq) => seq,
            Err(err) => {
                tx.done();
                return Err(err);
            }
        };
        debug!(sequence, "opened simulation snapshot");
        Ok(Self {
            tx,
            sequence,
            cache: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// The ledger sequence this snapshot is pinned to.
    pub fn latest_sequence(&self) -> u32 {
        self.sequence
    }

    /// Raw memoized lookup, without TTL classification.
    ///
    /// Used for entries that carry no TTL (accounts, config settings).
    pub fn lookup(&self, key: &LedgerKey) -> Result<Option<EntryWithLiveUntil>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Backend("snapshot is closed".to_string()));
        }
        let key_bytes = key.to_xdr(Limits::none())?;
        let mut cache = self.cache.lock();
        if let Some(cached) = cache.get(&key_bytes) {
            return Ok(cached.clone());
        }
        let fetched = self.tx.get_ledger_entry(key)?;
        cache.insert(key_bytes, fetched.clone());
        Ok(fetched)
    }

    /// Look up an entry and classify it against the pinned sequence.
    pub fn get(&self, key: &LedgerKey) -> Result<SnapshotEntry> {
        match self.lookup(key)? {
            None => Ok(SnapshotEntry::Missing),
            Some((entry, Some(live_until))) if live_until < self.sequence => {
                debug!(live_until, sequence = self.sequence, "entry is archived");
                Ok(SnapshotEntry::Archived(entry, live_until))
            }
            Some((entry, live_until)) => Ok(SnapshotEntry::Live(entry, live_until)),
        }
    }

    /// Release the underlying read transaction. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(sequence = self.sequence, "closing simulation snapshot");
            self.tx.done();
        }
    }
}

impl Drop for SimulationSnapshot {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SimulationSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationSnapshot")
            .field("sequence", &self.sequence)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}
