//! Minimum-fee computation over an execution trace.
//!
//! Translates the resources a dry run consumed into the declaration and
//! minimum fee a real submission needs. The computation is deterministic
//! in its inputs; the only deliberate slack is the instruction padding,
//! which keeps simulations from under-quoting when the live execution
//! diverges slightly from the dry run.

use stellar_xdr::curr::{
    DiagnosticEvent, LedgerFootprint, Limits, SorobanResources, SorobanTransactionData,
    SorobanTransactionDataExt, WriteXdr,
};

use crate::network_config::NetworkConfig;
use crate::Result;

/// Instructions are charged in increments of this many.
pub const INSTRUCTIONS_INCREMENT: i64 = 10_000;

/// Byte-denominated fees are charged per this many bytes.
pub const DATA_SIZE_1KB_INCREMENT: i64 = 1024;

/// Fixed size attributed to the transaction result in the historical fee.
pub const TX_BASE_RESULT_SIZE: u32 = 300;

/// Margin added to metered instructions in the declared resources.
pub const INSTRUCTION_PADDING_PERCENT: u64 = 20;

/// Fee rates in effect for one simulation.
///
/// All rates are stroops per increment; the write rate is pre-resolved
/// against the live-state size at the pinned ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeConfiguration {
    pub fee_per_instruction_increment: i64,
    pub fee_per_disk_read_entry: i64,
    pub fee_per_write_entry: i64,
    pub fee_per_disk_read_1kb: i64,
    pub fee_per_write_1kb: i64,
    pub fee_per_historical_1kb: i64,
    pub fee_per_contract_event_1kb: i64,
    pub fee_per_transaction_size_1kb: i64,
}

/// The resource consumption a fee is computed over.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionResources {
    pub instructions: u32,
    pub disk_read_entries: u32,
    pub write_entries: u32,
    pub disk_read_bytes: u32,
    pub write_bytes: u32,
    pub contract_events_size_bytes: u32,
    pub transaction_size_bytes: u32,
}

/// Result of fee estimation.
#[derive(Debug, Clone)]
pub struct FeeEstimate {
    /// Minimum resource fee for inclusion (non-refundable + refundable).
    pub min_resource_fee: i64,
    /// Normalized resource declaration ready for the transaction.
    pub transaction_data: SorobanTransactionData,
}

/// Ceiling division of `value * fee_rate / increment`, saturating.
fn fee_per_increment(value: i64, fee_rate: i64, increment: i64) -> i64 {
    let product = i128::from(value) * i128::from(fee_rate);
    let fee = (product + i128::from(increment) - 1) / i128::from(increment);
    fee.clamp(0, i128::from(i64::MAX)) as i64
}

fn fee_per_1kb(size_bytes: u32, fee_rate: i64) -> i64 {
    fee_per_increment(i64::from(size_bytes), fee_rate, DATA_SIZE_1KB_INCREMENT)
}

/// Compute `(non_refundable, refundable)` fee components for the given
/// resource consumption.
///
/// The event fee is the refundable component: the network refunds whatever
/// the real execution does not emit.
pub fn compute_transaction_resource_fee(
    resources: &TransactionResources,
    config: &FeeConfiguration,
) -> (i64, i64) {
    let compute_fee = fee_per_increment(
        i64::from(resources.instructions),
        config.fee_per_instruction_increment,
        INSTRUCTIONS_INCREMENT,
    );
    let read_entries_fee = i64::from(
        resources
            .disk_read_entries
            .saturating_add(resources.write_entries),
    )
    .saturating_mul(config.fee_per_disk_read_entry);
    let write_entries_fee =
        i64::from(resources.write_entries).saturating_mul(config.fee_per_write_entry);
    let read_bytes_fee = fee_per_1kb(resources.disk_read_bytes, config.fee_per_disk_read_1kb);
    let write_bytes_fee = fee_per_1kb(resources.write_bytes, config.fee_per_write_1kb);
    let historical_fee = fee_per_1kb(
        resources.transaction_size_bytes.saturating_add(TX_BASE_RESULT_SIZE),
        config.fee_per_historical_1kb,
    );
    let bandwidth_fee = fee_per_1kb(
        resources.transaction_size_bytes,
        config.fee_per_transaction_size_1kb,
    );

    let non_refundable = compute_fee
        .saturating_add(read_entries_fee)
        .saturating_add(write_entries_fee)
        .saturating_add(read_bytes_fee)
        .saturating_add(write_bytes_fee)
        .saturating_add(historical_fee)
        .saturating_add(bandwidth_fee);

    let refundable = fee_per_1kb(
        resources.contract_events_size_bytes,
        config.fee_per_contract_event_1kb,
    );

    (non_refundable, refundable)
}

fn pad_instructions(cpu_insns: u64) -> u32 {
    let padded = cpu_insns.saturating_add(cpu_insns * INSTRUCTION_PADDING_PERCENT / 100);
    padded.min(u64::from(u32::MAX)) as u32
}

fn events_size_bytes(events: &[DiagnosticEvent]) -> Result<u32> {
    let mut total: u64 = 0;
    for event in events {
        total = total.saturating_add(event.to_xdr(Limits::none())?.len() as u64);
    }
    Ok(total.min(u64::from(u32::MAX)) as u32)
}

/// Estimate the minimum fee and resource declaration for a completed run.
///
/// `envelope_size_bytes` is the size of the submitted envelope; the final
/// transaction also carries the resource declaration itself, so its
/// re-encoded size is added to the size-denominated terms.
#[allow(clippy::too_many_arguments)]
pub fn estimate_fee(
    footprint: LedgerFootprint,
    cpu_insns: u64,
    disk_read_entries: u32,
    write_entries: u32,
    disk_read_bytes: u32,
    write_bytes: u32,
    events: &[DiagnosticEvent],
    envelope_size_bytes: u32,
    config: &NetworkConfig,
    bucket_list_size: u64,
) -> Result<FeeEstimate> {
    let mut transaction_data = SorobanTransactionData {
        ext: SorobanTransactionDataExt::V0,
        resources: SorobanResources {
            footprint,
            instructions: pad_instructions(cpu_insns),
            disk_read_bytes,
            write_bytes,
        },
        resource_fee: 0,
    };

    let data_size = transaction_data.to_xdr(Limits::none())?.len() as u64;
    let transaction_size_bytes = u64::from(envelope_size_bytes)
        .saturating_add(data_size)
        .min(u64::from(u32::MAX)) as u32;

    let resources = TransactionResources {
        instructions: transaction_data.resources.instructions,
        disk_read_entries,
        write_entries,
        disk_read_bytes,
        write_bytes,
        contract_events_size_bytes: events_size_bytes(events)?,
        transaction_size_bytes,
    };

    let fee_config = config.fee_configuration(bucket_list_size);
    let (non_refundable, refundable) = compute_transaction_resource_fee(&resources, &fee_config);
    let min_resource_fee = non_refundable.saturating_add(refundable);
    transaction_data.resource_fee = min_resource_fee;

    Ok(FeeEstimate {
        min_resource_fee,
        transaction_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_config() -> FeeConfiguration {
        FeeConfiguration {
            fee_per_instruction_increment: 100,
            fee_per_disk_read_entry: 5_000,
            fee_per_write_entry: 20_000,
            fee_per_disk_read_1kb: 1_000,
            fee_per_write_1kb: 4_000,
            fee_per_historical_1kb: 100,
            fee_per_contract_event_1kb: 200,
            fee_per_transaction_size_1kb: 2_000,
        }
    }

    fn non_refundable(resources: &TransactionResources) -> i64 {
        compute_transaction_resource_fee(resources, &flat_config()).0
    }

    #[test]
    fn test_zero_resources_cost_only_size_terms() {
        let resources = TransactionResources {
            transaction_size_bytes: 1024,
            ..Default::default()
        };
        let (fee, refundable) = compute_transaction_resource_fee(&resources, &flat_config());
        // historical: ceil((1024 + 300) * 100 / 1024) = 130; bandwidth: 2000.
        assert_eq!(fee, 130 + 2_000);
        assert_eq!(refundable, 0);
    }

    #[test]
    fn test_instruction_fee_rounds_up_to_increment() {
        let baseline = non_refundable(&TransactionResources::default());
        let one = non_refundable(&TransactionResources {
            instructions: 1,
            ..Default::default()
        });
        let full_increment = non_refundable(&TransactionResources {
            instructions: 10_000,
            ..Default::default()
        });
        // One instruction still costs a whole increment's fee, rounded up.
        assert_eq!(one - baseline, 1);
        assert_eq!(full_increment - baseline, 100);
    }

    #[test]
    fn test_write_entries_also_pay_the_read_entry_fee() {
        let baseline = non_refundable(&TransactionResources::default());
        let fee = non_refundable(&TransactionResources {
            disk_read_entries: 2,
            write_entries: 1,
            ..Default::default()
        });
        assert_eq!(fee - baseline, 3 * 5_000 + 20_000);
    }

    #[test]
    fn test_event_fee_is_refundable() {
        let resources = TransactionResources {
            contract_events_size_bytes: 2048,
            ..Default::default()
        };
        let (_, refundable) = compute_transaction_resource_fee(&resources, &flat_config());
        assert_eq!(refundable, 400);
    }

    #[test]
    fn test_fee_is_deterministic() {
        let resources = TransactionResources {
            instructions: 1_234_567,
            disk_read_entries: 3,
            write_entries: 2,
            disk_read_bytes: 5_432,
            write_bytes: 998,
            contract_events_size_bytes: 123,
            transaction_size_bytes: 456,
        };
        let first = compute_transaction_resource_fee(&resources, &flat_config());
        let second = compute_transaction_resource_fee(&resources, &flat_config());
        assert_eq!(first, second);
    }

    #[test]
    fn test_instruction_padding() {
        assert_eq!(pad_instructions(100), 120);
        assert_eq!(pad_instructions(0), 0);
        assert_eq!(pad_instructions(u64::MAX), u32::MAX);
    }

    #[test]
    fn test_estimate_sets_resource_fee_in_data() {
        let estimate = estimate_fee(
            LedgerFootprint {
                read_only: Default::default(),
                read_write: Default::default(),
            },
            1_000_000,
            2,
            1,
            1_000,
            500,
            &[],
            300,
            &NetworkConfig::default(),
            0,
        )
        .unwrap();
        assert!(estimate.min_resource_fee > 0);
        assert_eq!(
            estimate.transaction_data.resource_fee,
            estimate.min_resource_fee
        );
        assert_eq!(estimate.transaction_data.resources.instructions, 1_200_000);
    }
}
