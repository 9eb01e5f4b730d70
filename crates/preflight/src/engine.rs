//! The seam between the bridge and the host VM.
//!
//! The VM itself (byte-code interpreter, host cryptography) is an external
//! collaborator. The bridge is generic over this trait: production wires in
//! an engine backed by the real host; the test suites script one. Engines
//! must be panic-free across this boundary and report failures as values.

use stellar_xdr::curr::{DiagnosticEvent, ScVal, SorobanAuthorizationEntry};

use crate::context::InvocationContext;
use crate::storage::HostStorage;

/// The trace of a successful host-function run.
#[derive(Debug, Clone)]
pub struct HostTrace {
    /// The invocation's return value.
    pub result: ScVal,
    /// Diagnostic events, in emission order.
    pub events: Vec<DiagnosticEvent>,
    /// Authorization entries, in the order the engine required them.
    /// Collected in recording mode, not verified.
    pub auth: Vec<SorobanAuthorizationEntry>,
    /// CPU instructions metered by the engine.
    pub cpu_insns: u64,
    /// Memory high-water mark metered by the engine.
    pub mem_bytes: u64,
}

/// Classification of a host-function failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFailureKind {
    /// The invocation trapped or errored inside the host.
    Trap,
    /// A nested invocation required authorization that was not supplied.
    AuthorizationRequired,
}

/// A failed host-function run.
///
/// Carries the resources consumed before the failure so the bridge can
/// distinguish a genuine trap from a resource-limit breach, and any events
/// emitted before the failure point, which are still surfaced to clients.
#[derive(Debug, Clone)]
pub struct EngineFailure {
    /// What went wrong, at the granularity the error taxonomy needs.
    pub kind: EngineFailureKind,
    /// Diagnostic message describing the failure.
    pub message: String,
    /// Events captured up to the failure point.
    pub events: Vec<DiagnosticEvent>,
    /// CPU instructions consumed before the failure.
    pub cpu_insns: u64,
    /// Memory bytes consumed before the failure.
    pub mem_bytes: u64,
}

impl std::fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A sandboxed host-function runtime.
///
/// One call per simulation. The engine reads and writes ledger state
/// exclusively through the supplied [`HostStorage`] (re-entrantly from its
/// own stack frames), meters itself against `ctx.quotas`, and must be
/// deterministic: byte-identical inputs over the same snapshot produce
/// byte-identical traces.
pub trait HostEngine: Send + Sync {
    fn preflight(
        &self,
        ctx: &InvocationContext,
        storage: &HostStorage<'_>,
    ) -> Result<HostTrace, EngineFailure>;
}
