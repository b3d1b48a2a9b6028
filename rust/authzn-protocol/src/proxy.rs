//! Calldata carried by a proxied view call.
//!
//! The account manager verifies the assertion and then runs the inner
//! calldata against the user's account. Only two account methods are ever
//! proxied: `sign(bytes32)` and `staticcall(address, bytes)`.

use crate::abi::{Account, AuthenticatorResponse, ClientDataField, SignatureRSV};
use crate::{AuthznError, DecodeError};
use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::{SolCall, SolInterface};
use authzn_credentials::Assertion;

/// Which account method a proxied call invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnerOperation {
    /// `sign(bytes32) returns (SignatureRSV)`
    Sign,
    /// `staticcall(address, bytes) returns (bool, bytes)`
    Staticcall,
}

/// A call against the user's account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InnerCall {
    /// Have the account sign `digest`.
    Sign {
        /// The 32-byte digest to sign.
        digest: B256,
    },
    /// Have the account call `target` with `data`, read-only.
    Staticcall {
        /// The contract to call.
        target: Address,
        /// The calldata to send.
        data: Bytes,
    },
}

/// What a proxied call returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InnerResult {
    /// The account's signature.
    Signature(SignatureRSV),
    /// The data returned by the target of a successful `staticcall`.
    Data(Bytes),
}

impl InnerCall {
    /// The account method this call invokes.
    pub fn operation(&self) -> InnerOperation {
        match self {
            InnerCall::Sign { .. } => InnerOperation::Sign,
            InnerCall::Staticcall { .. } => InnerOperation::Staticcall,
        }
    }

    /// ABI-encode the call.
    pub fn encode(&self) -> Bytes {
        match self {
            InnerCall::Sign { digest } => Account::signCall { digest: *digest }.abi_encode(),
            InnerCall::Staticcall { target, data } => Account::staticcallCall {
                in_contract: *target,
                in_data: data.clone(),
            }
            .abi_encode(),
        }
        .into()
    }

    /// Decode calldata addressed to an account.
    pub fn decode(calldata: &[u8]) -> Result<Self, DecodeError> {
        let call = Account::AccountCalls::abi_decode(calldata)
            .map_err(|e| DecodeError::new("account calldata", e))?;
        Ok(match call {
            Account::AccountCalls::sign(call) => InnerCall::Sign {
                digest: call.digest,
            },
            Account::AccountCalls::staticcall(call) => InnerCall::Staticcall {
                target: call.in_contract,
                data: call.in_data,
            },
        })
    }
}

/// Decode what the account returned for an `operation`.
///
/// A `staticcall` whose target reverted is an error, never an empty result.
pub fn decode_result(
    operation: InnerOperation,
    returned: &[u8],
) -> Result<InnerResult, AuthznError> {
    match operation {
        InnerOperation::Sign => Ok(InnerResult::Signature(decode_signature(returned)?)),
        InnerOperation::Staticcall => unwrap_staticcall_result(returned).map(InnerResult::Data),
    }
}

/// Decode the result of an account `sign`.
pub fn decode_signature(returned: &[u8]) -> Result<SignatureRSV, DecodeError> {
    Account::signCall::abi_decode_returns(returned).map_err(|e| DecodeError::new("sign result", e))
}

/// Wrap `data` for `target` in an account `staticcall`.
pub fn wrap_staticcall(target: Address, data: impl Into<Bytes>) -> Bytes {
    InnerCall::Staticcall {
        target,
        data: data.into(),
    }
    .encode()
}

/// Pull the target's return data out of a `staticcall` result.
pub fn unwrap_staticcall_result(returned: &[u8]) -> Result<Bytes, AuthznError> {
    let result = Account::staticcallCall::abi_decode_returns(returned)
        .map_err(|e| DecodeError::new("staticcall result", e))?;
    if !result.success {
        return Err(AuthznError::Reverted {
            reason: alloy_sol_types::decode_revert_reason(&result.out_data)
                .unwrap_or_else(|| format!("inner call reverted with {}", result.out_data)),
        });
    }
    Ok(result.out_data)
}

/// How the account manager refers to a credential: `keccak256(credentialId)`.
pub fn credential_id_hash(credential_id: &[u8]) -> B256 {
    keccak256(credential_id)
}

/// The raw credential id behind a stored `bytes32` word.
///
/// Ids are stored left-padded to 32 bytes, so the leading zero bytes are
/// dropped again. An id that itself starts with zero bytes cannot be told
/// apart from its padding.
pub fn credential_id_from_word(word: &B256) -> Vec<u8> {
    let start = word
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(word.len());
    word[start..].to_vec()
}

/// Shape an assertion the way the account manager verifies it.
pub fn authenticator_response(assertion: &Assertion) -> AuthenticatorResponse {
    AuthenticatorResponse {
        authenticatorData: Bytes::copy_from_slice(&assertion.authenticator_data),
        clientDataTokens: assertion
            .client_data_tokens
            .iter()
            .map(|token| ClientDataField {
                t: token.kind as u8,
                k: token.key.clone(),
                v: token.value.clone(),
            })
            .collect(),
        sigR: U256::from_be_bytes(assertion.r),
        sigS: U256::from_be_bytes(assertion.s),
    }
}
