//! Read interfaces onto the ledger-entry store.
//!
//! The store itself (and its write path) is an external collaborator; the
//! simulator only ever consumes these traits. Opening a transaction and
//! fetching close meta may hit backend I/O and are therefore async; entry
//! reads are synchronous by contract because they back the read-through
//! callback the host VM invokes from its own stack frames.

use async_trait::async_trait;
use stellar_xdr::curr::{LedgerCloseMeta, LedgerEntry, LedgerKey};

use crate::Result;

/// A ledger entry paired with its live-until ledger sequence, when the
/// entry kind carries one (contract data and contract code).
pub type EntryWithLiveUntil = (LedgerEntry, Option<u32>);

/// Factory for cached read transactions over the entry store.
#[async_trait]
pub trait LedgerEntryReader: Send + Sync {
    /// Open a cached read transaction bound to the latest sealed ledger.
    ///
    /// Every read through the returned transaction observes the ledger
    /// state as of the moment the transaction was opened.
    async fn new_cached_tx(&self) -> Result<Box<dyn ReadTx>>;
}

/// A read transaction pinned to one sealed ledger.
pub trait ReadTx: Send + Sync {
    /// The ledger sequence this transaction observes.
    fn get_latest_ledger_sequence(&self) -> Result<u32>;

    /// Fetch an entry together with its live-until ledger, if any.
    fn get_ledger_entry(&self, key: &LedgerKey) -> Result<Option<EntryWithLiveUntil>>;

    /// Release backend resources. Idempotent.
    fn done(&self);
}

/// Access to per-ledger close metadata.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Fetch the close meta for the given ledger sequence, if present.
    async fn get_ledger(&self, sequence: u32) -> Result<Option<LedgerCloseMeta>>;
}
