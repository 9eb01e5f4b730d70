//! Close-meta inspection.
//!
//! The simulator needs a handful of scalars out of the close meta of the
//! pinned ledger: the total byte size of live Soroban state (an input to
//! the fee formulae), and header fields that parameterize the host. Only
//! version-2 close meta is understood; older or future versions are
//! rejected outright rather than adapted silently.

use stellar_xdr::curr::LedgerCloseMeta;

use crate::{Result, StoreError};

/// The close-meta scalars consumed by the simulation pipeline.
#[derive(Debug, Clone, Copy)]
pub struct CloseMetaInfo {
    /// Total byte size of the live Soroban state as of this ledger.
    pub bucket_list_size: u64,
    /// Protocol version the ledger closed under.
    pub protocol_version: u32,
    /// Close time of the ledger, seconds since epoch.
    pub close_time: u64,
    /// Base reserve in effect at this ledger.
    pub base_reserve: u32,
}

/// Extract [`CloseMetaInfo`] from a close meta record.
///
/// `sequence` is only used to label the error when the meta is unusable.
pub fn close_meta_info(sequence: u32, meta: &LedgerCloseMeta) -> Result<CloseMetaInfo> {
    let v2 = match meta {
        LedgerCloseMeta::V2(v2) => v2,
        LedgerCloseMeta::V0(_) => {
            return Err(StoreError::UnexpectedCloseMetaVersion {
                sequence,
                version: 0,
            })
        }
        LedgerCloseMeta::V1(_) => {
            return Err(StoreError::UnexpectedCloseMetaVersion {
                sequence,
                version: 1,
            })
        }
    };
    let header = &v2.ledger_header.header;
    Ok(CloseMetaInfo {
        bucket_list_size: v2.total_byte_size_of_live_soroban_state,
        protocol_version: header.ledger_version,
        close_time: header.scp_value.close_time.0,
        base_reserve: header.base_reserve,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::synthetic_close_meta;
    use stellar_xdr::curr::{
        Hash, LedgerCloseMetaV0, LedgerHeader, LedgerHeaderExt, LedgerHeaderHistoryEntry,
        LedgerHeaderHistoryEntryExt, StellarValue, StellarValueExt, TimePoint, TransactionSet,
        VecM,
    };

    fn header(sequence: u32) -> LedgerHeader {
        LedgerHeader {
            ledger_version: 21,
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
        }
    }

    #[test]
    fn test_v2_meta_is_accepted() {
        let meta = synthetic_close_meta(42, 21, 123_456);
        let info = close_meta_info(42, &meta).unwrap();
        assert_eq!(info.bucket_list_size, 123_456);
        assert_eq!(info.protocol_version, 21);
    }

    #[test]
    fn test_v0_meta_is_rejected() {
        let meta = LedgerCloseMeta::V0(LedgerCloseMetaV0 {
            ledger_header: LedgerHeaderHistoryEntry {
                hash: Hash([0u8; 32]),
                header: header(9),
                ext: LedgerHeaderHistoryEntryExt::V0,
            },
            tx_set: TransactionSet {
                previous_ledger_hash: Hash([0u8; 32]),
                txs: VecM::default(),
            },
            tx_processing: VecM::default(),
            upgrades_processing: VecM::default(),
            scp_info: VecM::default(),
        });
        match close_meta_info(9, &meta) {
            Err(StoreError::UnexpectedCloseMetaVersion { sequence, version }) => {
                assert_eq!(sequence, 9);
                assert_eq!(version, 0);
            }
            other => panic!("expected version error, got {other:?}"),
        }
    }

    #[test]
    fn test_version_error_message_names_the_version() {
        let err = StoreError::UnexpectedCloseMetaVersion {
            sequence: 9,
            version: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("(9)"));
        assert!(msg.contains("(1)"));
    }
}
