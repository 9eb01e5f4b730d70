//! Error taxonomy for the simulation pipeline.
//!
//! Every variant's display string is what clients see in the response's
//! `error` field, so the texts are part of the wire contract.

use eddington_preflight::PreflightError;
use eddington_store::StoreError;
use thiserror::Error;

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimulateError>;

/// Errors a simulation can end in.
#[derive(Debug, Error)]
pub enum SimulateError {
    /// The envelope did not decode from its base64 XDR form.
    #[error("Could not unmarshal transaction")]
    MalformedEnvelope,

    /// The envelope does not contain exactly one operation.
    #[error("Transaction contains more than one operation")]
    TooManyOperations,

    /// The operation is not one of the simulatable variants.
    #[error("Transaction contains unsupported operation type: {0}")]
    UnsupportedOperation(String),

    /// Fee-bump wrappers carry no simulatable resource declaration.
    #[error("Simulation of fee-bump transaction envelopes is not supported")]
    FeeBumpNotSupported,

    /// ExtendFootprintTtl / RestoreFootprint need inline resource data.
    #[error(
        "To simulate ExtendFootprintTtl or RestoreFootprint operations, \
         SorobanTransactionData must be provided"
    )]
    MissingResourceData,

    /// The pinned ledger predates the configured protocol floor.
    #[error("ledger protocol version {actual} is below the configured floor {floor}")]
    ProtocolVersionTooOld { actual: u32, floor: u32 },

    /// The ledger read path failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The dry run itself failed.
    #[error(transparent)]
    Preflight(#[from] PreflightError),

    /// The simulation's cancellation context fired.
    #[error("simulation was cancelled")]
    Cancelled,

    /// The configured simulation deadline elapsed.
    #[error("simulation deadline exceeded")]
    DeadlineExceeded,

    /// XDR encoding failed while assembling the response.
    #[error("XDR error: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),

    /// A condition that indicates a bug rather than bad input.
    #[error("internal error: {0}")]
    Internal(String),
}
