//! Envelope decoding and validation.
//!
//! A simulation request is a base64 XDR transaction envelope. Validation
//! rules apply in order and the first failure wins; nothing here opens a
//! snapshot, so input errors are cheap.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use stellar_xdr::curr::{
    AccountId, Limits, MuxedAccount, OperationBody, PublicKey, ReadXdr, SorobanTransactionData,
    TransactionEnvelope, TransactionExt, WriteXdr,
};
use tracing::info;

use crate::{Result, SimulateError};

/// A validated simulation request.
#[derive(Debug, Clone)]
pub struct SimulationRequest {
    /// The single operation to dry-run.
    pub op: OperationBody,
    /// Resolved source account: the operation's, falling back to the
    /// envelope's.
    pub source_account: AccountId,
    /// Inline resource data, present exactly when the operation requires
    /// a caller-supplied footprint.
    pub soroban_data: Option<SorobanTransactionData>,
    /// Size of the submitted envelope in bytes.
    pub envelope_size_bytes: u32,
}

/// Convert a muxed account to its underlying account id.
fn muxed_to_account_id(muxed: &MuxedAccount) -> AccountId {
    match muxed {
        MuxedAccount::Ed25519(key) => {
            AccountId(PublicKey::PublicKeyTypeEd25519(key.clone()))
        }
        MuxedAccount::MuxedEd25519(m) => {
            AccountId(PublicKey::PublicKeyTypeEd25519(m.ed25519.clone()))
        }
    }
}

/// Decode a base64 XDR transaction envelope.
pub fn decode_envelope(transaction_b64: &str) -> Result<TransactionEnvelope> {
    let bytes = BASE64.decode(transaction_b64).map_err(|err| {
        info!(%err, "could not base64-decode simulation envelope");
        SimulateError::MalformedEnvelope
    })?;
    TransactionEnvelope::from_xdr(bytes, Limits::none()).map_err(|err| {
        info!(%err, "could not unmarshal simulation envelope");
        SimulateError::MalformedEnvelope
    })
}

/// Apply the validation rules and extract the simulation request.
pub fn validate_envelope(envelope: &TransactionEnvelope) -> Result<SimulationRequest> {
    let operations = match envelope {
        TransactionEnvelope::TxV0(v0) => v0.tx.operations.as_slice(),
        TransactionEnvelope::Tx(v1) => v1.tx.operations.as_slice(),
        TransactionEnvelope::TxFeeBump(_) => return Err(SimulateError::FeeBumpNotSupported),
    };
    if operations.len() != 1 {
        return Err(SimulateError::TooManyOperations);
    }
    let operation = &operations[0];

    let source_account = match &operation.source_account {
        Some(muxed) => muxed_to_account_id(muxed),
        None => match envelope {
            TransactionEnvelope::TxV0(v0) => AccountId(PublicKey::PublicKeyTypeEd25519(
                v0.tx.source_account_ed25519.clone(),
            )),
            TransactionEnvelope::Tx(v1) => muxed_to_account_id(&v1.tx.source_account),
            TransactionEnvelope::TxFeeBump(_) => unreachable!("rejected above"),
        },
    };

    let soroban_data = match &operation.body {
        // The derived footprint is authoritative; inline resources, if the
        // client sent any, are ignored.
        OperationBody::InvokeHostFunction(_) => None,
        OperationBody::ExtendFootprintTtl(_) | OperationBody::RestoreFootprint(_) => {
            // Both the V1 envelope form and the soroban-data extension are
            // required; either alone cannot carry a footprint.
            let TransactionEnvelope::Tx(v1) = envelope else {
                return Err(SimulateError::MissingResourceData);
            };
            let TransactionExt::V1(soroban_data) = &v1.tx.ext else {
                return Err(SimulateError::MissingResourceData);
            };
            Some(soroban_data.clone())
        }
        other => {
            return Err(SimulateError::UnsupportedOperation(format!(
                "{:?}",
                other.discriminant()
            )))
        }
    };

    let envelope_size_bytes = envelope.to_xdr(Limits::none())?.len() as u32;

    Ok(SimulationRequest {
        op: operation.body.clone(),
        source_account,
        soroban_data,
        envelope_size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use stellar_xdr::curr::{
        ExtendFootprintTtlOp, ExtensionPoint, Hash, HostFunction, InvokeContractArgs,
        InvokeHostFunctionOp, LedgerFootprint, Memo, Operation, PaymentOp, Preconditions,
        ScAddress, ScSymbol, SequenceNumber, SorobanResources, Transaction,
        TransactionV1Envelope, Uint256, VecM,
    };

    use super::*;

    fn account(seed: u8) -> MuxedAccount {
        MuxedAccount::Ed25519(Uint256([seed; 32]))
    }

    fn invoke_op(source: Option<MuxedAccount>) -> Operation {
        Operation {
            source_account: source,
            body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
                host_function: HostFunction::InvokeContract(InvokeContractArgs {
                    contract_address: ScAddress::Contract(
                        stellar_xdr::curr::ContractId(Hash([7u8; 32])),
                    ),
                    function_name: ScSymbol("add".try_into().unwrap()),
                    args: VecM::default(),
                }),
                auth: VecM::default(),
            }),
        }
    }

    fn extend_op() -> Operation {
        Operation {
            source_account: None,
            body: OperationBody::ExtendFootprintTtl(ExtendFootprintTtlOp {
                ext: ExtensionPoint::V0,
                extend_to: 1000,
            }),
        }
    }

    fn payment_op() -> Operation {
        Operation {
            source_account: None,
            body: OperationBody::Payment(PaymentOp {
                destination: account(9),
                asset: stellar_xdr::curr::Asset::Native,
                amount: 100,
            }),
        }
    }

    fn envelope_with(operations: Vec<Operation>, ext: TransactionExt) -> TransactionEnvelope {
        TransactionEnvelope::Tx(TransactionV1Envelope {
            tx: Transaction {
                source_account: account(1),
                fee: 100,
                seq_num: SequenceNumber(7),
                cond: Preconditions::None,
                memo: Memo::None,
                operations: operations.try_into().unwrap(),
                ext,
            },
            signatures: VecM::default(),
        })
    }

    fn soroban_data() -> SorobanTransactionData {
        SorobanTransactionData {
            ext: stellar_xdr::curr::SorobanTransactionDataExt::V0,
            resources: SorobanResources {
                footprint: LedgerFootprint {
                    read_only: Default::default(),
                    read_write: Default::default(),
                },
                instructions: 0,
                disk_read_bytes: 0,
                write_bytes: 0,
            },
            resource_fee: 0,
        }
    }

    fn roundtrip(envelope: &TransactionEnvelope) -> TransactionEnvelope {
        let bytes = envelope.to_xdr(Limits::none()).unwrap();
        decode_envelope(&BASE64.encode(bytes)).unwrap()
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_envelope("not base64!"),
            Err(SimulateError::MalformedEnvelope)
        ));
        assert!(matches!(
            decode_envelope("AAAA"),
            Err(SimulateError::MalformedEnvelope)
        ));
    }

    #[test]
    fn test_decode_then_reencode_is_identity() {
        let envelope = envelope_with(vec![invoke_op(None)], TransactionExt::V0);
        let bytes = envelope.to_xdr(Limits::none()).unwrap();
        let decoded = decode_envelope(&BASE64.encode(&bytes)).unwrap();
        assert_eq!(decoded.to_xdr(Limits::none()).unwrap(), bytes);
    }

    #[test]
    fn test_two_operations_are_rejected() {
        let envelope = envelope_with(vec![invoke_op(None), invoke_op(None)], TransactionExt::V0);
        assert!(matches!(
            validate_envelope(&roundtrip(&envelope)),
            Err(SimulateError::TooManyOperations)
        ));
    }

    #[test]
    fn test_unsupported_operation_names_the_type() {
        let envelope = envelope_with(vec![payment_op()], TransactionExt::V0);
        match validate_envelope(&roundtrip(&envelope)) {
            Err(SimulateError::UnsupportedOperation(name)) => assert_eq!(name, "Payment"),
            other => panic!("expected UnsupportedOperation, got {other:?}"),
        }
    }

    #[test]
    fn test_operation_source_overrides_envelope_source() {
        let envelope = envelope_with(vec![invoke_op(Some(account(5)))], TransactionExt::V0);
        let request = validate_envelope(&roundtrip(&envelope)).unwrap();
        assert_eq!(
            request.source_account,
            AccountId(PublicKey::PublicKeyTypeEd25519(Uint256([5; 32])))
        );
    }

    #[test]
    fn test_envelope_source_is_the_fallback() {
        let envelope = envelope_with(vec![invoke_op(None)], TransactionExt::V0);
        let request = validate_envelope(&roundtrip(&envelope)).unwrap();
        assert_eq!(
            request.source_account,
            AccountId(PublicKey::PublicKeyTypeEd25519(Uint256([1; 32])))
        );
    }

    #[test]
    fn test_extend_without_soroban_data_is_rejected() {
        let envelope = envelope_with(vec![extend_op()], TransactionExt::V0);
        assert!(matches!(
            validate_envelope(&roundtrip(&envelope)),
            Err(SimulateError::MissingResourceData)
        ));
    }

    #[test]
    fn test_extend_with_soroban_data_passes_the_footprint() {
        let envelope = envelope_with(vec![extend_op()], TransactionExt::V1(soroban_data()));
        let request = validate_envelope(&roundtrip(&envelope)).unwrap();
        assert!(request.soroban_data.is_some());
    }

    #[test]
    fn test_invoke_ignores_inline_resources() {
        let envelope = envelope_with(vec![invoke_op(None)], TransactionExt::V1(soroban_data()));
        let request = validate_envelope(&roundtrip(&envelope)).unwrap();
        assert!(request.soroban_data.is_none());
    }
}
