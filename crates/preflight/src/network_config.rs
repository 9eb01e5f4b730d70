//! Network configuration resolved from ConfigSetting ledger entries.
//!
//! The ceilings and fee rates the bridge enforces are themselves ledger
//! state: they live in CONFIG_SETTING entries and can change at protocol
//! upgrades, so they are re-read through the snapshot on every simulation
//! and therefore always match the pinned sequence.

use eddington_store::SimulationSnapshot;
use stellar_xdr::curr::{
    ConfigSettingEntry, ConfigSettingId, LedgerEntryData, LedgerKey, LedgerKeyConfigSetting,
};
use tracing::warn;

use crate::fees::FeeConfiguration;
use crate::Result;

/// Per-transaction resource ceilings the engine is clamped to.
#[derive(Debug, Clone, Copy)]
pub struct Quotas {
    pub cpu_instructions: u64,
    pub memory_bytes: u64,
    pub read_entries: u32,
    pub read_bytes: u32,
    pub write_entries: u32,
    pub write_bytes: u32,
    pub footprint_entries: u32,
}

/// The slice of network configuration the simulator consumes.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub tx_max_instructions: u64,
    pub tx_memory_limit: u64,
    pub fee_per_instruction_increment: i64,

    pub tx_max_disk_read_entries: u32,
    pub tx_max_disk_read_bytes: u32,
    pub tx_max_write_entries: u32,
    pub tx_max_write_bytes: u32,
    pub tx_max_footprint_entries: u32,
    pub fee_per_disk_read_entry: i64,
    pub fee_per_write_entry: i64,
    pub fee_per_disk_read_1kb: i64,

    /// Target live-state size; write rates ramp between the low and high
    /// rate as the actual size approaches and passes it.
    pub soroban_state_target_size_bytes: i64,
    pub rent_fee_1kb_state_size_low: i64,
    pub rent_fee_1kb_state_size_high: i64,
    pub state_rent_fee_growth_factor: u32,

    pub fee_per_historical_1kb: i64,
    pub tx_max_contract_events_size_bytes: u32,
    pub fee_per_contract_event_1kb: i64,
    pub fee_per_transaction_size_1kb: i64,

    pub min_temp_entry_ttl: u32,
    pub min_persistent_entry_ttl: u32,
    pub max_entry_ttl: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        // Fallbacks in the spirit of the minimum Soroban network settings;
        // real values come from the CONFIG_SETTING entries at the snapshot.
        Self {
            tx_max_instructions: 100_000_000,
            tx_memory_limit: 40 * 1024 * 1024,
            fee_per_instruction_increment: 100,
            tx_max_disk_read_entries: 40,
            tx_max_disk_read_bytes: 200 * 1024,
            tx_max_write_entries: 25,
            tx_max_write_bytes: 65 * 1024,
            tx_max_footprint_entries: 64,
            fee_per_disk_read_entry: 5_000,
            fee_per_write_entry: 20_000,
            fee_per_disk_read_1kb: 1_000,
            soroban_state_target_size_bytes: 30 * 1024 * 1024 * 1024,
            rent_fee_1kb_state_size_low: 1_000,
            rent_fee_1kb_state_size_high: 10_000,
            state_rent_fee_growth_factor: 1,
            fee_per_historical_1kb: 100,
            tx_max_contract_events_size_bytes: 8 * 1024,
            fee_per_contract_event_1kb: 200,
            fee_per_transaction_size_1kb: 2_000,
            min_temp_entry_ttl: 16,
            min_persistent_entry_ttl: 120_960,
            max_entry_ttl: 6_312_000,
        }
    }
}

fn config_entry(
    snapshot: &SimulationSnapshot,
    id: ConfigSettingId,
) -> Result<Option<ConfigSettingEntry>> {
    let key = LedgerKey::ConfigSetting(LedgerKeyConfigSetting {
        config_setting_id: id,
    });
    match snapshot.lookup(&key)? {
        Some((entry, _)) => match entry.data {
            LedgerEntryData::ConfigSetting(setting) => Ok(Some(setting)),
            _ => Ok(None),
        },
        None => Ok(None),
    }
}

impl NetworkConfig {
    /// Load the configuration as of the snapshot's pinned sequence.
    ///
    /// Settings absent from the ledger (networks that predate a given
    /// config upgrade) keep their conservative defaults.
    pub fn load(snapshot: &SimulationSnapshot) -> Result<Self> {
        let mut config = Self::default();
        let mut missing = Vec::new();

        match config_entry(snapshot, ConfigSettingId::ContractComputeV0)? {
            Some(ConfigSettingEntry::ContractComputeV0(compute)) => {
                config.tx_max_instructions = compute.tx_max_instructions as u64;
                config.tx_memory_limit = compute.tx_memory_limit as u64;
                config.fee_per_instruction_increment =
                    compute.fee_rate_per_instructions_increment;
            }
            _ => missing.push(ConfigSettingId::ContractComputeV0),
        }

        match config_entry(snapshot, ConfigSettingId::ContractLedgerCostV0)? {
            Some(ConfigSettingEntry::ContractLedgerCostV0(cost)) => {
                config.tx_max_disk_read_entries = cost.tx_max_disk_read_entries;
                config.tx_max_disk_read_bytes = cost.tx_max_disk_read_bytes;
                config.tx_max_write_entries = cost.tx_max_write_ledger_entries;
                config.tx_max_write_bytes = cost.tx_max_write_bytes;
                config.fee_per_disk_read_entry = cost.fee_disk_read_ledger_entry;
                config.fee_per_write_entry = cost.fee_write_ledger_entry;
                config.fee_per_disk_read_1kb = cost.fee_disk_read1_kb;
                config.soroban_state_target_size_bytes = cost.soroban_state_target_size_bytes;
                config.rent_fee_1kb_state_size_low = cost.rent_fee1_kb_soroban_state_size_low;
                config.rent_fee_1kb_state_size_high = cost.rent_fee1_kb_soroban_state_size_high;
                config.state_rent_fee_growth_factor = cost.soroban_state_rent_fee_growth_factor;
            }
            _ => missing.push(ConfigSettingId::ContractLedgerCostV0),
        }

        match config_entry(snapshot, ConfigSettingId::ContractLedgerCostExtV0)? {
            Some(ConfigSettingEntry::ContractLedgerCostExtV0(ext)) => {
                config.tx_max_footprint_entries = ext.tx_max_footprint_entries;
            }
            _ => missing.push(ConfigSettingId::ContractLedgerCostExtV0),
        }

        match config_entry(snapshot, ConfigSettingId::ContractHistoricalDataV0)? {
            Some(ConfigSettingEntry::ContractHistoricalDataV0(historical)) => {
                config.fee_per_historical_1kb = historical.fee_historical1_kb;
            }
            _ => missing.push(ConfigSettingId::ContractHistoricalDataV0),
        }

        match config_entry(snapshot, ConfigSettingId::ContractEventsV0)? {
            Some(ConfigSettingEntry::ContractEventsV0(events)) => {
                config.tx_max_contract_events_size_bytes = events.tx_max_contract_events_size_bytes;
                config.fee_per_contract_event_1kb = events.fee_contract_events1_kb;
            }
            _ => missing.push(ConfigSettingId::ContractEventsV0),
        }

        match config_entry(snapshot, ConfigSettingId::ContractBandwidthV0)? {
            Some(ConfigSettingEntry::ContractBandwidthV0(bandwidth)) => {
                config.fee_per_transaction_size_1kb = bandwidth.fee_tx_size1_kb;
            }
            _ => missing.push(ConfigSettingId::ContractBandwidthV0),
        }

        match config_entry(snapshot, ConfigSettingId::StateArchival)? {
            Some(ConfigSettingEntry::StateArchival(archival)) => {
                config.min_temp_entry_ttl = archival.min_temporary_ttl;
                config.min_persistent_entry_ttl = archival.min_persistent_ttl;
                config.max_entry_ttl = archival.max_entry_ttl;
            }
            _ => missing.push(ConfigSettingId::StateArchival),
        }

        if !missing.is_empty() {
            warn!(
                sequence = snapshot.latest_sequence(),
                ?missing,
                "config settings absent from ledger, using defaults"
            );
        }
        Ok(config)
    }

    /// The per-transaction ceilings the bridge clamps the engine to.
    pub fn quotas(&self) -> Quotas {
        Quotas {
            cpu_instructions: self.tx_max_instructions,
            memory_bytes: self.tx_memory_limit,
            read_entries: self.tx_max_disk_read_entries,
            read_bytes: self.tx_max_disk_read_bytes,
            write_entries: self.tx_max_write_entries,
            write_bytes: self.tx_max_write_bytes,
            footprint_entries: self.tx_max_footprint_entries,
        }
    }

    /// Effective write rate per 1KB given the current live-state size.
    ///
    /// Below the target size the rate ramps linearly from the low rate
    /// toward the high rate; past the target it keeps growing at the
    /// configured growth factor.
    pub fn write_fee_per_1kb(&self, bucket_list_size: u64) -> i64 {
        let target = i128::from(self.soroban_state_target_size_bytes.max(1));
        let low = i128::from(self.rent_fee_1kb_state_size_low);
        let high = i128::from(self.rent_fee_1kb_state_size_high);
        let span = (high - low).max(0);
        let size = i128::from(bucket_list_size);

        let fee = if size < target {
            low + span * size / target
        } else {
            high + i128::from(self.state_rent_fee_growth_factor) * span * (size - target) / target
        };
        fee.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }

    /// Assemble the fee rates for one simulation at the given state size.
    pub fn fee_configuration(&self, bucket_list_size: u64) -> FeeConfiguration {
        FeeConfiguration {
            fee_per_instruction_increment: self.fee_per_instruction_increment,
            fee_per_disk_read_entry: self.fee_per_disk_read_entry,
            fee_per_write_entry: self.fee_per_write_entry,
            fee_per_disk_read_1kb: self.fee_per_disk_read_1kb,
            fee_per_write_1kb: self.write_fee_per_1kb(bucket_list_size),
            fee_per_historical_1kb: self.fee_per_historical_1kb,
            fee_per_contract_event_1kb: self.fee_per_contract_event_1kb,
            fee_per_transaction_size_1kb: self.fee_per_transaction_size_1kb,
        }
    }
}
