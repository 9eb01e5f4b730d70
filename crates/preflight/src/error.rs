//! Error types for the preflight bridge.

use eddington_store::StoreError;
use stellar_xdr::curr::LedgerKey;
use thiserror::Error;

/// Result type for preflight operations.
pub type Result<T> = std::result::Result<T, PreflightError>;

/// The resource whose ceiling was breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    CpuInstructions,
    MemoryBytes,
    ReadEntries,
    ReadBytes,
    WriteEntries,
    WriteBytes,
    FootprintEntries,
}

impl std::fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CpuInstructions => "cpu instruction",
            Self::MemoryBytes => "memory",
            Self::ReadEntries => "read entry",
            Self::ReadBytes => "read byte",
            Self::WriteEntries => "write entry",
            Self::WriteBytes => "write byte",
            Self::FootprintEntries => "footprint entry",
        };
        write!(f, "{name}")
    }
}

/// Errors raised while driving a host-function dry run.
#[derive(Debug, Error)]
pub enum PreflightError {
    /// A network-configured resource ceiling was breached.
    #[error("{0} quota exceeded")]
    QuotaExceeded(QuotaKind),

    /// An access fell outside the transaction's declared footprint.
    #[error("footprint does not include accessed key: {key:?}")]
    FootprintTooSmall { key: Box<LedgerKey> },

    /// The engine trapped; the message is its diagnostic.
    #[error("host invocation failed: {0}")]
    VmTrap(String),

    /// The entry's live-until ledger is in the past and the operation does
    /// not restore it.
    #[error("accessed entry is archived and must be restored first: {key:?}")]
    EntryExpired { key: Box<LedgerKey> },

    /// A nested invocation required authorization that was not supplied.
    #[error("authorization is required for this invocation: {0}")]
    AuthorizationRequired(String),

    /// The simulation's cancellation context fired.
    #[error("simulation was cancelled")]
    Cancelled,

    /// The ledger read path failed; surfaced verbatim.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// XDR encoding or decoding failed.
    #[error("XDR error: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),

    /// A precondition the validator should have established did not hold.
    #[error("internal error: {0}")]
    Internal(String),
}
