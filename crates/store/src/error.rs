//! Error types for the ledger read path.

use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the ledger read path.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not open a read transaction.
    #[error("Cannot create read transaction")]
    BackendUnavailable,

    /// The store has no sealed ledger yet.
    #[error("latest ledger sequence is not known")]
    LatestLedgerUnknown,

    /// No close meta is stored for the given ledger.
    #[error("missing meta for latest ledger ({0})")]
    CloseMetaMissing(u32),

    /// The close meta is not of the version the simulator understands.
    #[error("latest ledger ({sequence}) meta has unexpected version ({version})")]
    UnexpectedCloseMetaVersion { sequence: u32, version: i32 },

    /// XDR encoding or decoding failed.
    #[error("XDR error: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),

    /// Backend-specific failure, surfaced verbatim.
    #[error("backend error: {0}")]
    Backend(String),
}
