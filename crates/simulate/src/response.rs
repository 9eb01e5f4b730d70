//! The simulation response record.
//!
//! Field names and encodings mirror the JSON-RPC wire contract: all XDR
//! payloads are standard-padded base64, and the integer fields ride as
//! strings. Exactly one of `error` or the result-bearing fields is
//! populated; diagnostic events accompany execution errors whenever the
//! engine produced any before failing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use eddington_preflight::Preflight;
use serde::{Deserialize, Serialize};
use stellar_xdr::curr::{DiagnosticEvent, Limits, WriteXdr};

use crate::{Result, SimulateError};

mod u64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

mod opt_i64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<i64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_str(&value.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<i64>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|s| s.parse().map_err(serde::de::Error::custom))
            .transpose()
    }
}

mod u32_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Effective cost of the dry run, straight from the engine's trace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationCost {
    /// CPU instructions consumed.
    #[serde(rename = "cpuInsns", with = "u64_string")]
    pub cpu_insns: u64,
    /// Memory bytes consumed.
    #[serde(rename = "memBytes", with = "u64_string")]
    pub mem_bytes: u64,
}

/// Result of the single host-function call in the transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateHostFunctionResult {
    /// Authorization entries required by the invocation, base64 XDR, in
    /// the order the engine required them.
    pub auth: Vec<String>,
    /// The return value, base64 XDR.
    pub xdr: String,
}

/// The simulation response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulateTransactionResponse {
    /// Human-readable failure description; empty on success.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub error: String,

    /// Normalized resource declaration, base64 XDR; empty on failure.
    #[serde(rename = "transactionData", skip_serializing_if = "String::is_empty", default)]
    pub transaction_data: String,

    /// Diagnostic events, base64 XDR, in emission order. Also populated
    /// alongside `error` when the engine emitted any before failing.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub events: Vec<String>,

    /// Minimum resource fee for inclusion; absent on failure.
    #[serde(
        rename = "minResourceFee",
        with = "opt_i64_string",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub min_resource_fee: Option<i64>,

    /// One entry per host-function call; exactly one on success.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub results: Vec<SimulateHostFunctionResult>,

    /// Effective cpu and memory cost of the execution; absent on failure.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cost: Option<SimulationCost>,

    /// The ledger sequence the simulation was pinned to; zero when the
    /// failure happened before a snapshot was opened.
    #[serde(rename = "latestLedger", with = "u32_string")]
    pub latest_ledger: u32,
}

fn encode_b64<T: WriteXdr>(value: &T) -> Result<String> {
    Ok(BASE64.encode(value.to_xdr(Limits::none())?))
}

fn encode_events(events: &[DiagnosticEvent]) -> Result<Vec<String>> {
    events.iter().map(encode_b64).collect()
}

impl SimulateTransactionResponse {
    /// Assemble the success response from a completed dry run.
    pub fn from_preflight(preflight: &Preflight, latest_ledger: u32) -> Result<Self> {
        Ok(Self {
            error: String::new(),
            transaction_data: encode_b64(&preflight.transaction_data)?,
            events: encode_events(&preflight.events)?,
            min_resource_fee: Some(preflight.min_resource_fee),
            results: vec![SimulateHostFunctionResult {
                auth: preflight
                    .auth
                    .iter()
                    .map(encode_b64)
                    .collect::<Result<Vec<_>>>()?,
                xdr: encode_b64(&preflight.result)?,
            }],
            cost: Some(SimulationCost {
                cpu_insns: preflight.cpu_insns,
                mem_bytes: preflight.mem_bytes,
            }),
            latest_ledger,
        })
    }

    /// Assemble a failure response.
    ///
    /// Events that fail to encode are dropped rather than masking the
    /// original error.
    pub fn from_error(
        error: &SimulateError,
        latest_ledger: Option<u32>,
        events: &[DiagnosticEvent],
    ) -> Self {
        Self {
            error: error.to_string(),
            events: encode_events(events).unwrap_or_default(),
            latest_ledger: latest_ledger.unwrap_or(0),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_carries_only_error_events_and_ledger() {
        let response =
            SimulateTransactionResponse::from_error(&SimulateError::TooManyOperations, None, &[]);
        assert_eq!(response.error, "Transaction contains more than one operation");
        assert!(response.results.is_empty());
        assert!(response.transaction_data.is_empty());
        assert!(response.min_resource_fee.is_none());
        assert!(response.cost.is_none());

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("results").is_none());
        assert!(json.get("transactionData").is_none());
        assert!(json.get("minResourceFee").is_none());
        assert!(json.get("cost").is_none());
        assert_eq!(json["latestLedger"], "0");
    }

    #[test]
    fn test_integers_ride_as_strings() {
        let response = SimulateTransactionResponse {
            min_resource_fee: Some(12345),
            cost: Some(SimulationCost {
                cpu_insns: 99,
                mem_bytes: 7,
            }),
            latest_ledger: 42,
            ..Default::default()
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["minResourceFee"], "12345");
        assert_eq!(json["cost"]["cpuInsns"], "99");
        assert_eq!(json["cost"]["memBytes"], "7");
        assert_eq!(json["latestLedger"], "42");
    }

    #[test]
    fn test_response_roundtrips_through_json() {
        let response = SimulateTransactionResponse {
            error: "boom".into(),
            min_resource_fee: Some(-1),
            latest_ledger: 7,
            ..Default::default()
        };
        let json = serde_json::to_string(&response).unwrap();
        let decoded: SimulateTransactionResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.error, "boom");
        assert_eq!(decoded.min_resource_fee, Some(-1));
        assert_eq!(decoded.latest_ledger, 7);
    }
}
