//! In-process ledger store.
//!
//! A complete implementation of the read interfaces backed by hash maps.
//! The simulation test suites run against it, and embedders can use it to
//! drive the pipeline without a captive-core backend. Read transactions
//! observe the sequence and entries captured at open time, so a store that
//! advances mid-simulation does not leak new state into open snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use stellar_xdr::curr::{
    GeneralizedTransactionSet, Hash, LedgerCloseMeta, LedgerCloseMetaExt, LedgerCloseMetaV2,
    LedgerEntry, LedgerEntryData, LedgerEntryExt, LedgerHeader, LedgerHeaderExt,
    LedgerHeaderHistoryEntry, LedgerHeaderHistoryEntryExt, LedgerKey, Limits, StellarValue,
    StellarValueExt, TimePoint, TransactionSetV1, TtlEntry, VecM, WriteXdr,
};

use crate::reader::{EntryWithLiveUntil, LedgerEntryReader, LedgerReader, ReadTx};
use crate::snapshot::ledger_key_hash;
use crate::{Result, StoreError};

#[derive(Default, Clone)]
struct StoreState {
    latest: Option<u32>,
    entries: HashMap<Vec<u8>, LedgerEntry>,
    ttls: HashMap<[u8; 32], u32>,
    close_metas: HashMap<u32, LedgerCloseMeta>,
}

/// Shared, thread-safe in-memory ledger store.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry without TTL information.
    pub fn put_entry(&self, key: &LedgerKey, entry: LedgerEntry) -> Result<()> {
        let key_bytes = key.to_xdr(Limits::none())?;
        self.state.write().entries.insert(key_bytes, entry);
        Ok(())
    }

    /// Insert or replace an entry together with its live-until ledger.
    pub fn put_entry_with_ttl(
        &self,
        key: &LedgerKey,
        entry: LedgerEntry,
        live_until: u32,
    ) -> Result<()> {
        let key_bytes = key.to_xdr(Limits::none())?;
        let key_hash = ledger_key_hash(key)?;
        let mut state = self.state.write();
        state.entries.insert(key_bytes, entry);
        state.ttls.insert(key_hash.0, live_until);
        Ok(())
    }

    /// Remove an entry (and its TTL record, if any).
    pub fn remove_entry(&self, key: &LedgerKey) -> Result<()> {
        let key_bytes = key.to_xdr(Limits::none())?;
        let key_hash = ledger_key_hash(key)?;
        let mut state = self.state.write();
        state.entries.remove(&key_bytes);
        state.ttls.remove(&key_hash.0);
        Ok(())
    }

    /// Store close meta for a ledger sequence.
    pub fn put_close_meta(&self, sequence: u32, meta: LedgerCloseMeta) {
        self.state.write().close_metas.insert(sequence, meta);
    }

    /// Advance the latest sealed sequence and record a synthetic V2 close
    /// meta for it in one step.
    pub fn seal_ledger(&self, sequence: u32, protocol_version: u32, bucket_list_size: u64) {
        let mut state = self.state.write();
        state.latest = Some(sequence);
        state
            .close_metas
            .insert(sequence, synthetic_close_meta(sequence, protocol_version, bucket_list_size));
    }

    /// Set the latest sealed sequence without touching close meta.
    pub fn set_latest_sequence(&self, sequence: u32) {
        self.state.write().latest = Some(sequence);
    }
}

#[async_trait]
impl LedgerEntryReader for InMemoryLedgerStore {
    async fn new_cached_tx(&self) -> Result<Box<dyn ReadTx>> {
        // Clone-on-open gives the transaction a private, immutable view.
        let state = self.state.read().clone();
        Ok(Box::new(MemoryReadTx { state }))
    }
}

#[async_trait]
impl LedgerReader for InMemoryLedgerStore {
    async fn get_ledger(&self, sequence: u32) -> Result<Option<LedgerCloseMeta>> {
        Ok(self.state.read().close_metas.get(&sequence).cloned())
    }
}

struct MemoryReadTx {
    state: StoreState,
}

impl MemoryReadTx {
    fn live_until_for(&self, key: &LedgerKey) -> Result<Option<u32>> {
        match key {
            LedgerKey::ContractData(_) | LedgerKey::ContractCode(_) => {
                let key_hash = ledger_key_hash(key)?;
                Ok(self.state.ttls.get(&key_hash.0).copied())
            }
            _ => Ok(None),
        }
    }
}

impl ReadTx for MemoryReadTx {
    fn get_latest_ledger_sequence(&self) -> Result<u32> {
        self.state.latest.ok_or(StoreError::LatestLedgerUnknown)
    }

    fn get_ledger_entry(&self, key: &LedgerKey) -> Result<Option<EntryWithLiveUntil>> {
        // TTL entries are addressable in their own right.
        if let LedgerKey::Ttl(ttl_key) = key {
            return Ok(self.state.ttls.get(&ttl_key.key_hash.0).map(|live_until| {
                let entry = LedgerEntry {
                    last_modified_ledger_seq: 0,
                    data: LedgerEntryData::Ttl(TtlEntry {
                        key_hash: Hash(ttl_key.key_hash.0),
                        live_until_ledger_seq: *live_until,
                    }),
                    ext: LedgerEntryExt::V0,
                };
                (entry, None)
            }));
        }

        let key_bytes = key.to_xdr(Limits::none())?;
        match self.state.entries.get(&key_bytes) {
            None => Ok(None),
            Some(entry) => Ok(Some((entry.clone(), self.live_until_for(key)?))),
        }
    }

    fn done(&self) {}
}

/// Build a version-2 close meta carrying the given live-state byte size.
pub fn synthetic_close_meta(
    sequence: u32,
    protocol_version: u32,
    bucket_list_size: u64,
) -> LedgerCloseMeta {
    let header = LedgerHeader {
        ledger_version: protocol_version,
        previous_ledger_hash: Hash([0u8; 32]),
        scp_value: StellarValue {
            tx_set_hash: Hash([0u8; 32]),
            close_time: TimePoint(0),
            upgrades: VecM::default(),
            ext: StellarValueExt::Basic,
        },
        tx_set_result_hash: Hash([0u8; 32]),
        bucket_list_hash: Hash([0u8; 32]),
        ledger_seq: sequence,
        total_coins: 0,
        fee_pool: 0,
        inflation_seq: 0,
        id_pool: 0,
        base_fee: 100,
        base_reserve: 5_000_000,
        max_tx_set_size: 1000,
        skip_list: std::array::from_fn(|_| Hash([0u8; 32])),
        ext: LedgerHeaderExt::V0,
    };
    LedgerCloseMeta::V2(LedgerCloseMetaV2 {
        ext: LedgerCloseMetaExt::V0,
        ledger_header: LedgerHeaderHistoryEntry {
            hash: Hash([0u8; 32]),
            header,
            ext: LedgerHeaderHistoryEntryExt::V0,
        },
        tx_set: GeneralizedTransactionSet::V1(TransactionSetV1 {
            previous_ledger_hash: Hash([0u8; 32]),
            phases: VecM::default(),
        }),
        tx_processing: VecM::default(),
        upgrades_processing: VecM::default(),
        scp_info: VecM::default(),
        total_byte_size_of_live_soroban_state: bucket_list_size,
        evicted_keys: VecM::default(),
    })
}
