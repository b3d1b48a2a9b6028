use alloy_primitives::Bytes;
use authzn_common::time::Duration;
use authzn_protocol::{ContractError, DecodeError, RelayError};
use thiserror::Error;

/// Errors from talking to a JSON-RPC endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsonRpcError {
    /// The configured endpoint is not a URL
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// The configured endpoint
        endpoint: String,
        /// Why it failed to parse
        reason: String,
    },

    /// The request never produced an HTTP response
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success HTTP status
    #[error("HTTP {status} - {reason}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase
        reason: String,
    },

    /// No response within the configured timeout
    #[error("no response within {0:?}")]
    TimedOut(Duration),

    /// The node answered with a JSON-RPC error object
    #[error("{code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message
        message: String,
        /// Revert data, when the node attached any
        data: Option<Bytes>,
    },

    /// The response did not have the expected shape
    #[error("malformed response to {method}: {reason}")]
    Malformed {
        /// The JSON-RPC method
        method: &'static str,
        /// What was wrong with it
        reason: String,
    },
}

impl JsonRpcError {
    /// Whether this is an EVM revert rather than a node or transport failure.
    pub fn is_revert(&self) -> bool {
        match self {
            JsonRpcError::Rpc { code, message, data } => {
                *code == 3 || data.is_some() || message.contains("revert")
            }
            _ => false,
        }
    }
}

impl From<JsonRpcError> for RelayError {
    fn from(error: JsonRpcError) -> Self {
        match error {
            JsonRpcError::Rpc { code, message, .. } => RelayError::Rejected { code, message },
            JsonRpcError::Malformed { .. } => RelayError::Malformed(error.to_string()),
            other => RelayError::Transport(other.to_string()),
        }
    }
}

impl From<JsonRpcError> for ContractError {
    fn from(error: JsonRpcError) -> Self {
        let revert = error.is_revert();
        match error {
            JsonRpcError::Rpc { message, data, .. } if revert => {
                let reason = data
                    .as_ref()
                    .and_then(|data| alloy_sol_types::decode_revert_reason(data))
                    .unwrap_or(message);
                ContractError::Reverted { reason }
            }
            JsonRpcError::Malformed { method, reason } => {
                ContractError::Decode(DecodeError::new(method, reason))
            }
            other => ContractError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::{Revert, SolError};
    use pretty_assertions::assert_eq;

    #[test]
    fn it_decodes_revert_data_into_a_reason() {
        let data = Revert {
            reason: "user exists".to_string(),
        }
        .abi_encode();
        let error = JsonRpcError::Rpc {
            code: 3,
            message: "execution reverted".to_string(),
            data: Some(data.into()),
        };

        match ContractError::from(error) {
            ContractError::Reverted { reason } => assert!(reason.contains("user exists")),
            other => panic!("expected a revert, got {other:?}"),
        }
    }

    #[test]
    fn it_falls_back_to_the_message_without_revert_data() {
        let error = JsonRpcError::Rpc {
            code: -32000,
            message: "execution reverted".to_string(),
            data: None,
        };

        assert_eq!(
            ContractError::from(error),
            ContractError::Reverted {
                reason: "execution reverted".to_string()
            }
        );
    }

    #[test]
    fn it_treats_other_rpc_errors_as_transport_failures_for_calls() {
        let error = JsonRpcError::Rpc {
            code: -32602,
            message: "invalid params".to_string(),
            data: None,
        };

        assert!(matches!(
            ContractError::from(error),
            ContractError::Transport(_)
        ));
    }

    #[test]
    fn it_keeps_code_and_message_for_relay_rejections() {
        let error = JsonRpcError::Rpc {
            code: -32000,
            message: "nonce too low".to_string(),
            data: None,
        };

        assert_eq!(
            RelayError::from(error),
            RelayError::Rejected {
                code: -32000,
                message: "nonce too low".to_string()
            }
        );
    }

    #[test]
    fn it_maps_http_failures_to_transport() {
        let error = JsonRpcError::Status {
            status: 502,
            reason: "Bad Gateway".to_string(),
        };

        assert_eq!(
            RelayError::from(error),
            RelayError::Transport("HTTP 502 - Bad Gateway".to_string())
        );
    }
}
