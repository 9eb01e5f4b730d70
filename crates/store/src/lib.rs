//! Read-only access to ledger state for transaction simulation.
//!
//! This crate defines the interfaces through which the simulation core
//! consumes the ledger-entry store (the write path lives elsewhere), plus
//! the [`SimulationSnapshot`] wrapper that pins a read transaction to a
//! single sealed ledger sequence and memoizes every lookup so a simulation
//! observes one consistent state from start to finish.

mod close_meta;
mod error;
mod memory;
mod reader;
mod snapshot;

pub use close_meta::{close_meta_info, CloseMetaInfo};
pub use error::{Result, StoreError};
pub use memory::{synthetic_close_meta, InMemoryLedgerStore};
pub use reader::{EntryWithLiveUntil, LedgerEntryReader, LedgerReader, ReadTx};
pub use snapshot::{ledger_key_hash, SimulationSnapshot, SnapshotEntry};
