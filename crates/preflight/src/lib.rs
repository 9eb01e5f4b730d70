//! Dry-run execution of host-function transactions.
//!
//! This crate drives an opaque host-function engine against a pinned ledger
//! snapshot without committing anything: it resolves the ledger footprint
//! (derived from observed accesses, or taken from the transaction's inline
//! resource data), mediates every ledger access through a buffering overlay,
//! clamps the engine's resource ceilings to the network configuration at the
//! snapshot sequence, and translates the resulting execution trace into the
//! minimum inclusion fee and a normalized resource declaration.

mod bridge;
mod context;
mod engine;
mod error;
mod fees;
mod footprint;
mod network_config;
mod storage;

pub use bridge::{run_preflight, Preflight, PreflightFailure};
pub use context::{InvocationContext, NetworkId};
pub use engine::{EngineFailure, EngineFailureKind, HostEngine, HostTrace};
pub use error::{PreflightError, QuotaKind, Result};
pub use fees::{
    compute_transaction_resource_fee, FeeConfiguration, FeeEstimate, TransactionResources,
};
pub use footprint::{FootprintMode, FootprintTracker};
pub use network_config::{NetworkConfig, Quotas};
pub use storage::{AccessPolicy, HostStorage, StorageError};
