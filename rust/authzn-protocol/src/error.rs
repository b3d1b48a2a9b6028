//! Error types for the account protocol.

use authzn_common::{AuthznAsyncError, time::Duration};
use authzn_credentials::CredentialError;
use thiserror::Error;

/// Why a username cannot be hashed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsernameError {
    /// The username is empty.
    #[error("username is required")]
    Empty,

    /// The username contains characters outside `[A-Za-z0-9_.-]`, or more than
    /// one `@`.
    #[error("username {0:?} contains invalid characters")]
    InvalidCharacters(String),

    /// Registering a username that already has an account.
    #[error("username {0:?} is already registered")]
    AlreadyExists(String),

    /// Signing in with a username that has no account.
    #[error("username {0:?} is not registered")]
    DoesNotExist(String),
}

/// Returned bytes did not have the expected ABI shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to decode {context}: {message}")]
pub struct DecodeError {
    /// What was being decoded.
    pub context: &'static str,
    /// What went wrong.
    pub message: String,
}

impl DecodeError {
    /// A failure to decode `context`, described by `error`.
    pub fn new(context: &'static str, error: impl std::fmt::Display) -> Self {
        Self {
            context,
            message: error.to_string(),
        }
    }
}

/// Errors from reading the account manager or an account.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// The call reverted.
    #[error("call reverted: {reason}")]
    Reverted {
        /// The decoded revert reason, or a hex rendering of the revert data.
        reason: String,
    },

    /// The call never reached the contract.
    #[error("transport error: {0}")]
    Transport(String),

    /// The contract answered with bytes of the wrong shape.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Errors from the transaction relay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// The node refused the request.
    #[error("{code}: {message}")]
    Rejected {
        /// The JSON-RPC error code.
        code: i64,
        /// The node's message.
        message: String,
    },

    /// The request never reached the node.
    #[error("transport error: {0}")]
    Transport(String),

    /// The node answered with something that is not the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Invalid or missing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required setting is absent.
    #[error("missing {0}")]
    Missing(&'static str),

    /// A setting could not be parsed.
    #[error("invalid {name}: {message}")]
    Invalid {
        /// The setting.
        name: &'static str,
        /// Why it was rejected.
        message: String,
    },
}

/// Coarse classification of an [`AuthznError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad user input.
    Validation,
    /// A ceremony failed or was refused.
    Credential,
    /// No credential is registered for the account.
    NoCredentials,
    /// Returned bytes had the wrong shape.
    Decode,
    /// The contract refused to sign a registration.
    Signing,
    /// The node refused a transaction.
    Submission,
    /// An operation did not finish in time.
    Timeout,
    /// A contract call reverted.
    Reverted,
    /// The network could not be reached.
    Network,
    /// Local work was aborted.
    Internal,
    /// The deployment settings disagree with the chain.
    Configuration,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Credential => "credential",
            ErrorKind::NoCredentials => "no credentials",
            ErrorKind::Decode => "decode",
            ErrorKind::Signing => "signing",
            ErrorKind::Submission => "submission",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Reverted => "reverted",
            ErrorKind::Network => "network",
            ErrorKind::Internal => "internal",
            ErrorKind::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

/// Everything the protocol surface can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthznError {
    /// The username is not acceptable.
    #[error(transparent)]
    Validation(#[from] UsernameError),

    /// A WebAuthn ceremony failed.
    #[error(transparent)]
    Credential(CredentialError),

    /// The account has no registered credentials to assert with.
    #[error("no credentials are registered for this account")]
    NoCredentials,

    /// Returned bytes did not match the expected result shape.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The account manager refused to sign the registration transaction.
    #[error("contract refused to sign registration: {reason}")]
    Signing {
        /// The contract's reason.
        reason: String,
    },

    /// The node rejected the transaction.
    #[error("{code}: {message}")]
    Submission {
        /// The JSON-RPC error code.
        code: i64,
        /// The node's message.
        message: String,
    },

    /// An operation did not finish before its deadline.
    #[error("{operation} did not complete within {after:?}")]
    Timeout {
        /// What timed out.
        operation: &'static str,
        /// The deadline that elapsed.
        after: Duration,
    },

    /// A contract call reverted.
    #[error("call reverted: {reason}")]
    Reverted {
        /// The revert reason.
        reason: String,
    },

    /// The network could not be reached, or answered nonsense.
    #[error("network error: {0}")]
    Network(String),

    /// Local work (such as key derivation) was aborted before finishing.
    #[error("internal error: {0}")]
    Internal(String),

    /// The node serves a different chain than the one configured.
    #[error("configured for chain {configured:#x} but the node reports chain {reported:#x}")]
    ChainMismatch {
        /// The chain id in the configuration.
        configured: u64,
        /// The chain id the node reported.
        reported: u64,
    },
}

impl AuthznError {
    /// The kind of failure, for callers that branch on it.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthznError::Validation(_) => ErrorKind::Validation,
            AuthznError::Credential(_) => ErrorKind::Credential,
            AuthznError::NoCredentials => ErrorKind::NoCredentials,
            AuthznError::Decode(_) => ErrorKind::Decode,
            AuthznError::Signing { .. } => ErrorKind::Signing,
            AuthznError::Submission { .. } => ErrorKind::Submission,
            AuthznError::Timeout { .. } => ErrorKind::Timeout,
            AuthznError::Reverted { .. } => ErrorKind::Reverted,
            AuthznError::Network(_) => ErrorKind::Network,
            AuthznError::Internal(_) => ErrorKind::Internal,
            AuthznError::ChainMismatch { .. } => ErrorKind::Configuration,
        }
    }
}

impl From<CredentialError> for AuthznError {
    fn from(error: CredentialError) -> Self {
        match error {
            CredentialError::NoCredentials => AuthznError::NoCredentials,
            CredentialError::TimedOut(after) => AuthznError::Timeout {
                operation: "credential ceremony",
                after,
            },
            other => AuthznError::Credential(other),
        }
    }
}

impl From<AuthznAsyncError> for AuthznError {
    fn from(error: AuthznAsyncError) -> Self {
        AuthznError::Internal(error.to_string())
    }
}

impl From<ContractError> for AuthznError {
    fn from(error: ContractError) -> Self {
        match error {
            ContractError::Reverted { reason } => AuthznError::Reverted { reason },
            ContractError::Transport(message) => AuthznError::Network(message),
            ContractError::Decode(error) => AuthznError::Decode(error),
        }
    }
}

impl From<RelayError> for AuthznError {
    fn from(error: RelayError) -> Self {
        match error {
            RelayError::Rejected { code, message } => AuthznError::Submission { code, message },
            RelayError::Transport(message) => AuthznError::Network(message),
            RelayError::Malformed(message) => AuthznError::Network(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_maps_ceremony_timeouts_to_timeout() {
        let error = AuthznError::from(CredentialError::TimedOut(Duration::from_secs(60)));
        assert_eq!(error.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn it_keeps_the_node_code_on_rejection() {
        let error = AuthznError::from(RelayError::Rejected {
            code: -32000,
            message: "nonce too low".into(),
        });
        assert_eq!(error.kind(), ErrorKind::Submission);
        assert_eq!(error.to_string(), "-32000: nonce too low");
    }

    #[test]
    fn it_reports_both_chain_ids_on_mismatch() {
        let error = AuthznError::ChainMismatch {
            configured: 0x5aff,
            reported: 0x5afe,
        };
        assert_eq!(error.kind(), ErrorKind::Configuration);
        assert_eq!(
            error.to_string(),
            "configured for chain 0x5aff but the node reports chain 0x5afe"
        );
    }

    #[test]
    fn it_separates_empty_candidates_from_other_ceremony_failures() {
        assert_eq!(
            AuthznError::from(CredentialError::NoCredentials).kind(),
            ErrorKind::NoCredentials
        );
        assert_eq!(
            AuthznError::from(CredentialError::NotAllowed("cancelled".into())).kind(),
            ErrorKind::Credential
        );
    }
}
