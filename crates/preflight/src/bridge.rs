//! Driving one host-function dry run end to end.
//!
//! The bridge resolves the network configuration at the pinned sequence,
//! clamps the engine's ceilings, mediates every ledger access through
//! [`HostStorage`], and turns the engine's trace (or failure) into either a
//! [`Preflight`] result or a precise error from the simulation taxonomy.

use eddington_store::{CloseMetaInfo, SimulationSnapshot};
use stellar_xdr::curr::{
    AccountId, DiagnosticEvent, LedgerFootprint, OperationBody, ScVal, SorobanAuthorizationEntry,
    SorobanTransactionData,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::{InvocationContext, NetworkId};
use crate::engine::{EngineFailureKind, HostEngine};
use crate::fees::estimate_fee;
use crate::footprint::FootprintMode;
use crate::network_config::NetworkConfig;
use crate::storage::{AccessPolicy, HostStorage};
use crate::{PreflightError, QuotaKind};

/// The assembled result of a successful dry run.
#[derive(Debug, Clone)]
pub struct Preflight {
    /// The invocation's return value.
    pub result: ScVal,
    /// Authorization entries, in the order the engine required them.
    pub auth: Vec<SorobanAuthorizationEntry>,
    /// Diagnostic events, in emission order.
    pub events: Vec<DiagnosticEvent>,
    /// Normalized resource declaration, including the resolved footprint.
    pub transaction_data: SorobanTransactionData,
    /// Minimum resource fee for inclusion.
    pub min_resource_fee: i64,
    /// CPU instructions the trace reported.
    pub cpu_insns: u64,
    /// Memory bytes the trace reported.
    pub mem_bytes: u64,
}

/// A failed dry run: the precise error plus any diagnostics captured
/// before the failure point.
#[derive(Debug)]
pub struct PreflightFailure {
    pub error: PreflightError,
    pub events: Vec<DiagnosticEvent>,
}

impl From<PreflightError> for PreflightFailure {
    fn from(error: PreflightError) -> Self {
        Self {
            error,
            events: Vec::new(),
        }
    }
}

impl From<eddington_store::StoreError> for PreflightFailure {
    fn from(error: eddington_store::StoreError) -> Self {
        PreflightError::from(error).into()
    }
}

fn resolve_mode(
    op: &OperationBody,
    provided_footprint: Option<LedgerFootprint>,
) -> Result<(FootprintMode, AccessPolicy), PreflightError> {
    match op {
        // Inline resources, if any, are ignored: the observed accesses
        // are authoritative.
        OperationBody::InvokeHostFunction(_) => Ok((FootprintMode::Derived, AccessPolicy::Invoke)),
        OperationBody::ExtendFootprintTtl(_) => {
            let footprint = provided_footprint.ok_or_else(|| {
                PreflightError::Internal(
                    "ExtendFootprintTtl reached the bridge without a footprint".into(),
                )
            })?;
            Ok((FootprintMode::Provided(footprint), AccessPolicy::ExtendTtl))
        }
        OperationBody::RestoreFootprint(_) => {
            let footprint = provided_footprint.ok_or_else(|| {
                PreflightError::Internal(
                    "RestoreFootprint reached the bridge without a footprint".into(),
                )
            })?;
            Ok((FootprintMode::Provided(footprint), AccessPolicy::Restore))
        }
        other => Err(PreflightError::Internal(format!(
            "unsupported operation reached the bridge: {:?}",
            other.discriminant()
        ))),
    }
}

/// Execute one dry run against the given snapshot.
///
/// `envelope_size_bytes` is the byte size of the submitted envelope; it
/// feeds the size-denominated fee terms.
#[allow(clippy::too_many_arguments)]
pub fn run_preflight(
    engine: &dyn HostEngine,
    snapshot: &SimulationSnapshot,
    close_meta: &CloseMetaInfo,
    network_id: NetworkId,
    source_account: AccountId,
    op: OperationBody,
    provided_footprint: Option<LedgerFootprint>,
    envelope_size_bytes: u32,
    cancel: CancellationToken,
) -> Result<Preflight, PreflightFailure> {
    let config = NetworkConfig::load(snapshot).map_err(PreflightFailure::from)?;
    let quotas = config.quotas();
    let (mode, policy) = resolve_mode(&op, provided_footprint).map_err(PreflightFailure::from)?;
    let initial_footprint = match &mode {
        FootprintMode::Provided(footprint) => footprint.clone(),
        FootprintMode::Derived => LedgerFootprint {
            read_only: Default::default(),
            read_write: Default::default(),
        },
    };

    let ctx = InvocationContext {
        source_account,
        op,
        footprint: initial_footprint,
        ledger_sequence: snapshot.latest_sequence(),
        protocol_version: close_meta.protocol_version,
        close_time: close_meta.close_time,
        base_reserve: close_meta.base_reserve,
        network_id,
        bucket_list_size: close_meta.bucket_list_size,
        quotas,
        min_temp_entry_ttl: config.min_temp_entry_ttl,
        min_persistent_entry_ttl: config.min_persistent_entry_ttl,
        max_entry_ttl: config.max_entry_ttl,
    };
    let storage = HostStorage::new(snapshot, mode, policy, quotas, cancel)
        .map_err(PreflightFailure::from)?;

    debug!(
        sequence = ctx.ledger_sequence,
        protocol = ctx.protocol_version,
        ?policy,
        "dispatching host engine"
    );

    let trace = match engine.preflight(&ctx, &storage) {
        Ok(trace) => trace,
        Err(failure) => {
            // A latched storage fault is the real cause; the engine only
            // saw an opaque lookup error.
            let error = match storage.take_fault() {
                Some(fault) => fault,
                None if failure.kind == EngineFailureKind::AuthorizationRequired => {
                    PreflightError::AuthorizationRequired(failure.message.clone())
                }
                None if failure.cpu_insns >= quotas.cpu_instructions => {
                    PreflightError::QuotaExceeded(QuotaKind::CpuInstructions)
                }
                None if failure.mem_bytes >= quotas.memory_bytes => {
                    PreflightError::QuotaExceeded(QuotaKind::MemoryBytes)
                }
                None => PreflightError::VmTrap(failure.message.clone()),
            };
            debug!(%error, "host engine failed");
            return Err(PreflightFailure {
                error,
                events: failure.events,
            });
        }
    };

    let outcome = match storage.finish() {
        Ok(outcome) => outcome,
        Err(error) => {
            return Err(PreflightFailure {
                error,
                events: trace.events,
            })
        }
    };

    debug!(
        cpu_insns = trace.cpu_insns,
        mem_bytes = trace.mem_bytes,
        read_entries = outcome.read_entries,
        write_entries = outcome.write_entries,
        "host engine completed"
    );

    let estimate = estimate_fee(
        outcome.footprint,
        trace.cpu_insns,
        outcome.read_entries,
        outcome.write_entries,
        outcome.disk_read_bytes,
        outcome.write_bytes,
        &trace.events,
        envelope_size_bytes,
        &config,
        close_meta.bucket_list_size,
    )
    .map_err(PreflightFailure::from)?;

    Ok(Preflight {
        result: trace.result,
        auth: trace.auth,
        events: trace.events,
        transaction_data: estimate.transaction_data,
        min_resource_fee: estimate.min_resource_fee,
        cpu_insns: trace.cpu_insns,
        mem_bytes: trace.mem_bytes,
    })
}
