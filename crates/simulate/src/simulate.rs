//! The simulation pipeline.
//!
//! One call = one dry run: decode and validate the envelope, pin a
//! snapshot to the latest sealed ledger, gather close meta and network
//! configuration, drive the host engine on a blocking worker, and package
//! the outcome. The snapshot is owned by the pipeline and released on
//! every exit path; the worker is cooperatively aborted through the
//! cancellation context at its next lookup boundary.

use std::sync::Arc;

use eddington_preflight::{
    run_preflight, HostEngine, NetworkId, PreflightError, PreflightFailure,
};
use eddington_store::{
    close_meta_info, LedgerEntryReader, LedgerReader, SimulationSnapshot, StoreError,
};
use stellar_xdr::curr::DiagnosticEvent;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::envelope::{decode_envelope, validate_envelope};
use crate::response::SimulateTransactionResponse;
use crate::SimulateError;

/// A pipeline failure, with whatever context was established before it.
struct Failure {
    error: SimulateError,
    latest_ledger: Option<u32>,
    events: Vec<DiagnosticEvent>,
}

impl Failure {
    /// A failure raised before any snapshot existed.
    fn early(error: SimulateError) -> Self {
        Self {
            error,
            latest_ledger: None,
            events: Vec::new(),
        }
    }

    fn at_ledger(error: SimulateError, latest_ledger: u32) -> Self {
        Self {
            error,
            latest_ledger: Some(latest_ledger),
            events: Vec::new(),
        }
    }
}

/// Drives transaction simulations against a shared ledger store.
///
/// Cheap to clone; simulations run concurrently, each with its own
/// snapshot and per-run state.
#[derive(Clone)]
pub struct Simulator {
    entry_reader: Arc<dyn LedgerEntryReader>,
    ledger_reader: Arc<dyn LedgerReader>,
    engine: Arc<dyn HostEngine>,
    network_id: NetworkId,
    config: SimulationConfig,
}

impl Simulator {
    pub fn new(
        entry_reader: Arc<dyn LedgerEntryReader>,
        ledger_reader: Arc<dyn LedgerReader>,
        engine: Arc<dyn HostEngine>,
        config: SimulationConfig,
    ) -> Self {
        let network_id = NetworkId::from_passphrase(&config.network_passphrase);
        Self {
            entry_reader,
            ledger_reader,
            engine,
            network_id,
            config,
        }
    }

    /// Simulate one base64 XDR transaction envelope.
    ///
    /// Always returns a response: failures land in its `error` field. The
    /// configured deadline is enforced through the same cancellation
    /// context callers use for their own timeouts.
    pub async fn simulate_transaction(
        &self,
        transaction_b64: &str,
        cancel: CancellationToken,
    ) -> SimulateTransactionResponse {
        let run_token = cancel.child_token();
        let outcome = tokio::select! {
            // Checked first so a cancellation that raced the request wins
            // deterministically.
            biased;
            _ = cancel.cancelled() => Err(Failure::early(SimulateError::Cancelled)),
            run = tokio::time::timeout(
                self.config.simulation_deadline,
                self.run(transaction_b64, run_token.clone()),
            ) => match run {
                Ok(outcome) => outcome,
                Err(_) => {
                    run_token.cancel();
                    Err(Failure::early(SimulateError::DeadlineExceeded))
                }
            },
        };

        match outcome {
            Ok(response) => response,
            Err(failure) => {
                info!(error = %failure.error, latest_ledger = ?failure.latest_ledger,
                    "simulation failed");
                SimulateTransactionResponse::from_error(
                    &failure.error,
                    failure.latest_ledger,
                    &failure.events,
                )
            }
        }
    }

    async fn run(
        &self,
        transaction_b64: &str,
        cancel: CancellationToken,
    ) -> Result<SimulateTransactionResponse, Failure> {
        // Input errors are cheap: no snapshot is opened for them.
        let envelope = decode_envelope(transaction_b64).map_err(Failure::early)?;
        let request = validate_envelope(&envelope).map_err(Failure::early)?;
        debug!(op = ?request.op.discriminant(), "validated simulation envelope");

        let read_tx = self
            .entry_reader
            .new_cached_tx()
            .await
            .map_err(|err| Failure::early(err.into()))?;
        let snapshot = Arc::new(
            SimulationSnapshot::open(read_tx).map_err(|err| Failure::early(err.into()))?,
        );
        let latest_ledger = snapshot.latest_sequence();

        let close_meta = self
            .ledger_reader
            .get_ledger(latest_ledger)
            .await
            .map_err(|err| Failure::at_ledger(err.into(), latest_ledger))?
            .ok_or_else(|| {
                Failure::at_ledger(
                    StoreError::CloseMetaMissing(latest_ledger).into(),
                    latest_ledger,
                )
            })?;
        let info = close_meta_info(latest_ledger, &close_meta)
            .map_err(|err| Failure::at_ledger(err.into(), latest_ledger))?;

        if info.protocol_version < self.config.protocol_version_floor {
            return Err(Failure::at_ledger(
                SimulateError::ProtocolVersionTooOld {
                    actual: info.protocol_version,
                    floor: self.config.protocol_version_floor,
                },
                latest_ledger,
            ));
        }

        // The engine is CPU-bound and synchronous; keep it off the I/O
        // scheduler. The snapshot's read path is safe to block on.
        let engine = Arc::clone(&self.engine);
        let worker_snapshot = Arc::clone(&snapshot);
        let network_id = self.network_id;
        let source_account = request.source_account.clone();
        let op = request.op.clone();
        let provided_footprint = request
            .soroban_data
            .as_ref()
            .map(|data| data.resources.footprint.clone());
        let envelope_size_bytes = request.envelope_size_bytes;
        let joined = tokio::task::spawn_blocking(move || {
            run_preflight(
                engine.as_ref(),
                &worker_snapshot,
                &info,
                network_id,
                source_account,
                op,
                provided_footprint,
                envelope_size_bytes,
                cancel,
            )
        })
        .await;

        // Prompt release; drop of the last Arc is only the backstop.
        snapshot.close();

        let preflight = match joined {
            Err(join_error) => {
                return Err(Failure::at_ledger(
                    SimulateError::Internal(join_error.to_string()),
                    latest_ledger,
                ))
            }
            Ok(Err(PreflightFailure { error, events })) => {
                let error = match error {
                    PreflightError::Cancelled => SimulateError::Cancelled,
                    other => other.into(),
                };
                return Err(Failure {
                    error,
                    latest_ledger: Some(latest_ledger),
                    events,
                });
            }
            Ok(Ok(preflight)) => preflight,
        };

        debug!(
            latest_ledger,
            min_resource_fee = preflight.min_resource_fee,
            cpu_insns = preflight.cpu_insns,
            "simulation completed"
        );
        SimulateTransactionResponse::from_preflight(&preflight, latest_ledger)
            .map_err(|err| Failure::at_ledger(err, latest_ledger))
    }
}
