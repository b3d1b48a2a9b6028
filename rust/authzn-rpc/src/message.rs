//! JSON-RPC 2.0 envelopes and the Ethereum objects carried inside them.

use crate::JsonRpcError;
use alloy_primitives::{Address, B256, Bytes, U64};
use authzn_protocol::TransactionReceipt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub(crate) struct Request<'a, P> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

impl<'a, P> Request<'a, P> {
    pub fn new(id: u64, method: &'a str, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Response {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorObject>,
}

impl Response {
    /// The result value, or the error object translated. A `null` or absent
    /// result is returned as [`Value::Null`].
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(error) = self.error {
            let data = match error.data {
                Some(Value::String(hex)) => hex.parse::<Bytes>().ok(),
                _ => None,
            };
            return Err(JsonRpcError::Rpc {
                code: error.code,
                message: error.message,
                data,
            });
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// The call object of `eth_call`.
#[derive(Debug, Serialize)]
pub(crate) struct CallRequest {
    pub to: Address,
    pub data: Bytes,
}

/// The fields of a transaction receipt the relay reports.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReceiptObject {
    #[serde(default)]
    pub block_number: Option<U64>,
    pub transaction_hash: B256,
    pub gas_used: U64,
    #[serde(default)]
    pub status: Option<U64>,
}

impl ReceiptObject {
    /// `None` while the node reports the transaction without a block.
    pub fn into_receipt(self) -> Option<TransactionReceipt> {
        let block_number = self.block_number?;
        Some(TransactionReceipt {
            block_number: block_number.to::<u64>(),
            transaction_hash: self.transaction_hash,
            gas_used: self.gas_used.to::<u64>(),
        })
    }

    pub fn reverted(&self) -> bool {
        self.status.is_some_and(|status| status.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use testresult::TestResult;

    #[test]
    fn it_serializes_a_request_envelope() -> TestResult {
        let request = Request::new(7, "eth_getTransactionCount", (Address::ZERO, "pending"));
        let encoded = serde_json::to_value(&request)?;

        assert_eq!(
            encoded,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "eth_getTransactionCount",
                "params": ["0x0000000000000000000000000000000000000000", "pending"],
            })
        );
        Ok(())
    }

    #[test]
    fn it_extracts_revert_data_from_an_error_object() -> TestResult {
        let response: Response = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": 3, "message": "execution reverted", "data": "0x08c379a0" },
        }))?;

        assert_eq!(
            response.into_result(),
            Err(JsonRpcError::Rpc {
                code: 3,
                message: "execution reverted".to_string(),
                data: Some(Bytes::from_static(&[0x08, 0xc3, 0x79, 0xa0])),
            })
        );
        Ok(())
    }

    #[test]
    fn it_ignores_error_data_that_is_not_hex() -> TestResult {
        let response: Response = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "nonce too low", "data": { "detail": 1 } },
        }))?;

        assert!(matches!(
            response.into_result(),
            Err(JsonRpcError::Rpc { data: None, .. })
        ));
        Ok(())
    }

    #[test]
    fn it_reads_a_null_result_as_null() -> TestResult {
        let response: Response =
            serde_json::from_value(json!({ "jsonrpc": "2.0", "id": 1, "result": null }))?;
        assert_eq!(response.into_result(), Ok(Value::Null));
        Ok(())
    }

    #[test]
    fn it_parses_a_mined_receipt() -> TestResult {
        let receipt: ReceiptObject = serde_json::from_value(json!({
            "blockNumber": "0x1b4",
            "transactionHash": "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060",
            "gasUsed": "0x24a22",
            "status": "0x1",
            "logs": [],
        }))?;

        assert!(!receipt.reverted());
        assert_eq!(
            receipt.into_receipt(),
            Some(TransactionReceipt {
                block_number: 436,
                transaction_hash: b256!(
                    "5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060"
                ),
                gas_used: 150050,
            })
        );
        Ok(())
    }

    #[test]
    fn it_treats_a_receipt_without_a_block_as_pending() -> TestResult {
        let receipt: ReceiptObject = serde_json::from_value(json!({
            "blockNumber": null,
            "transactionHash": "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060",
            "gasUsed": "0x0",
        }))?;

        assert_eq!(receipt.into_receipt(), None);
        Ok(())
    }

    #[test]
    fn it_flags_a_reverted_receipt() -> TestResult {
        let receipt: ReceiptObject = serde_json::from_value(json!({
            "blockNumber": "0x2",
            "transactionHash": "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060",
            "gasUsed": "0x5208",
            "status": "0x0",
        }))?;

        assert!(receipt.reverted());
        Ok(())
    }
}
