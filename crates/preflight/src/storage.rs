//! Mediated ledger access for the host engine.
//!
//! [`HostStorage`] is the only path by which the engine touches ledger
//! state. Reads resolve overlay-first, then through the memoized snapshot;
//! writes buffer into the overlay and are discarded with the simulation.
//! Every access is recorded for footprint resolution, charged against the
//! network quotas, and checked against the cancellation context.
//!
//! Errors never unwind through the engine: the first fault is latched here
//! and the engine only sees an opaque [`StorageError`], which it is
//! expected to surface as its own failure. The bridge then reports the
//! latched fault, which is the precise cause.

use std::collections::{HashMap, HashSet};

use eddington_store::{EntryWithLiveUntil, SimulationSnapshot, SnapshotEntry};
use parking_lot::Mutex;
use stellar_xdr::curr::{LedgerFootprint, LedgerKey, Limits, WriteXdr};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::footprint::{FootprintMode, FootprintTracker};
use crate::network_config::Quotas;
use crate::{PreflightError, QuotaKind, Result};

/// How archived (TTL-lapsed) entries are treated for the operation at hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Host-function invocation: archived entries are unusable.
    Invoke,
    /// TTL extension: archived entries are likewise unusable.
    ExtendTtl,
    /// Footprint restoration: archived entries are the whole point.
    Restore,
}

/// Opaque storage failure handed to the engine.
///
/// The precise cause is latched inside [`HostStorage`]; the engine only
/// needs to know the lookup failed and abort.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StorageError {
    message: String,
}

/// Resolved access results of a completed run.
#[derive(Debug)]
pub struct StorageOutcome {
    pub footprint: LedgerFootprint,
    pub disk_read_bytes: u32,
    pub write_bytes: u32,
    pub read_entries: u32,
    pub write_entries: u32,
}

struct Inner {
    tracker: FootprintTracker,
    /// Buffered writes: key bytes → entry (None = deleted).
    overlay: HashMap<Vec<u8>, Option<EntryWithLiveUntil>>,
    /// Buffered TTL extensions: key bytes → new live-until.
    ttl_overlay: HashMap<Vec<u8>, u32>,
    /// Keys whose snapshot read has been charged against the read quotas.
    charged_reads: HashSet<Vec<u8>>,
    disk_read_bytes: u64,
    fault: Option<PreflightError>,
}

/// Per-simulation ledger state view with a write overlay.
pub struct HostStorage<'a> {
    snapshot: &'a SimulationSnapshot,
    policy: AccessPolicy,
    quotas: Quotas,
    cancel: CancellationToken,
    inner: Mutex<Inner>,
}

fn key_bytes(key: &LedgerKey) -> Result<Vec<u8>> {
    Ok(key.to_xdr(Limits::none())?)
}

fn entry_size(entry: &EntryWithLiveUntil) -> Result<u64> {
    Ok(entry.0.to_xdr(Limits::none())?.len() as u64)
}

impl<'a> HostStorage<'a> {
    pub fn new(
        snapshot: &'a SimulationSnapshot,
        mode: FootprintMode,
        policy: AccessPolicy,
        quotas: Quotas,
        cancel: CancellationToken,
    ) -> Result<Self> {
        Ok(Self {
            snapshot,
            policy,
            quotas,
            cancel,
            inner: Mutex::new(Inner {
                tracker: FootprintTracker::new(mode)?,
                overlay: HashMap::new(),
                ttl_overlay: HashMap::new(),
                charged_reads: HashSet::new(),
                disk_read_bytes: 0,
                fault: None,
            }),
        })
    }

    /// Run one storage operation under the fault latch.
    ///
    /// The lock is non-reentrant and never held across an engine step;
    /// each engine-facing call acquires and releases it exactly once.
    fn with_inner<T>(
        &self,
        f: impl FnOnce(&mut Inner) -> Result<T>,
    ) -> std::result::Result<T, StorageError> {
        let mut inner = self.inner.lock();
        if let Some(fault) = &inner.fault {
            return Err(StorageError {
                message: fault.to_string(),
            });
        }
        if self.cancel.is_cancelled() {
            let message = PreflightError::Cancelled.to_string();
            inner.fault = Some(PreflightError::Cancelled);
            return Err(StorageError { message });
        }
        match f(&mut inner) {
            Ok(value) => Ok(value),
            Err(error) => {
                let message = error.to_string();
                inner.fault = Some(error);
                Err(StorageError { message })
            }
        }
    }

    /// Read an entry through the overlay, then the snapshot.
    ///
    /// Archived entries are visible only under [`AccessPolicy::Restore`];
    /// any other policy latches `EntryExpired`.
    pub fn get(
        &self,
        key: &LedgerKey,
    ) -> std::result::Result<Option<EntryWithLiveUntil>, StorageError> {
        self.with_inner(|inner| {
            inner.tracker.record_read(key)?;
            Self::check_footprint_quota(&self.quotas, &inner.tracker)?;

            let bytes = key_bytes(key)?;
            if let Some(buffered) = inner.overlay.get(&bytes) {
                trace!(policy = ?self.policy, "overlay hit");
                return Ok(buffered.clone());
            }

            let fetched = match self.snapshot.get(key)? {
                SnapshotEntry::Missing => return Ok(None),
                SnapshotEntry::Archived(entry, live_until) => {
                    if self.policy != AccessPolicy::Restore {
                        return Err(PreflightError::EntryExpired {
                            key: Box::new(key.clone()),
                        });
                    }
                    (entry, Some(live_until))
                }
                SnapshotEntry::Live(entry, live_until) => (entry, live_until),
            };

            // Charge each distinct snapshot-backed read once.
            if inner.charged_reads.insert(bytes.clone()) {
                inner.disk_read_bytes = inner
                    .disk_read_bytes
                    .saturating_add(entry_size(&fetched)?);
                if inner.charged_reads.len() as u32 > self.quotas.read_entries {
                    return Err(PreflightError::QuotaExceeded(QuotaKind::ReadEntries));
                }
                if inner.disk_read_bytes > u64::from(self.quotas.read_bytes) {
                    return Err(PreflightError::QuotaExceeded(QuotaKind::ReadBytes));
                }
            }

            let live_until = inner
                .ttl_overlay
                .get(&bytes)
                .copied()
                .map(Some)
                .unwrap_or(fetched.1);
            Ok(Some((fetched.0, live_until)))
        })
    }

    /// Whether an entry currently exists from the engine's point of view.
    pub fn has(&self, key: &LedgerKey) -> std::result::Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }

    /// Buffer a create-or-update of an entry.
    pub fn put(
        &self,
        key: &LedgerKey,
        entry: EntryWithLiveUntil,
    ) -> std::result::Result<(), StorageError> {
        self.with_inner(|inner| {
            inner.tracker.record_write(key)?;
            Self::check_footprint_quota(&self.quotas, &inner.tracker)?;
            if inner.tracker.write_entry_count() as u32 > self.quotas.write_entries {
                return Err(PreflightError::QuotaExceeded(QuotaKind::WriteEntries));
            }
            inner.overlay.insert(key_bytes(key)?, Some(entry));
            Ok(())
        })
    }

    /// Buffer a deletion of an entry.
    pub fn delete(&self, key: &LedgerKey) -> std::result::Result<(), StorageError> {
        self.with_inner(|inner| {
            inner.tracker.record_write(key)?;
            inner.overlay.insert(key_bytes(key)?, None);
            Ok(())
        })
    }

    /// Buffer a TTL extension without touching the entry body.
    ///
    /// Classified as a read: TTL bumps are legitimate on read-only
    /// footprint keys.
    pub fn extend_ttl(
        &self,
        key: &LedgerKey,
        live_until: u32,
    ) -> std::result::Result<(), StorageError> {
        self.with_inner(|inner| {
            inner.tracker.record_read(key)?;
            let bytes = key_bytes(key)?;
            let current = inner.ttl_overlay.get(&bytes).copied().unwrap_or(0);
            inner.ttl_overlay.insert(bytes, live_until.max(current));
            Ok(())
        })
    }

    /// The precise cause of the first failed access, if any.
    pub(crate) fn take_fault(&self) -> Option<PreflightError> {
        self.inner.lock().fault.take()
    }

    /// Resolve the run's footprint and byte counters.
    ///
    /// The write-byte quota can only be checked here: the overlay holds
    /// final values, not every intermediate write.
    pub(crate) fn finish(self) -> Result<StorageOutcome> {
        let inner = self.inner.into_inner();
        if let Some(fault) = inner.fault {
            return Err(fault);
        }

        let mut write_bytes: u64 = 0;
        for buffered in inner.overlay.values().flatten() {
            write_bytes = write_bytes.saturating_add(entry_size(buffered)?);
        }
        if write_bytes > u64::from(self.quotas.write_bytes) {
            return Err(PreflightError::QuotaExceeded(QuotaKind::WriteBytes));
        }

        Ok(StorageOutcome {
            footprint: inner.tracker.observed_footprint()?,
            disk_read_bytes: inner.disk_read_bytes.min(u64::from(u32::MAX)) as u32,
            write_bytes: write_bytes.min(u64::from(u32::MAX)) as u32,
            read_entries: inner.tracker.read_entry_count().min(u32::MAX as usize) as u32,
            write_entries: inner.tracker.write_entry_count().min(u32::MAX as usize) as u32,
        })
    }

    fn check_footprint_quota(quotas: &Quotas, tracker: &FootprintTracker) -> Result<()> {
        if tracker.touched_entry_count() as u32 > quotas.footprint_entries {
            return Err(PreflightError::QuotaExceeded(QuotaKind::FootprintEntries));
        }
        Ok(())
    }
}
