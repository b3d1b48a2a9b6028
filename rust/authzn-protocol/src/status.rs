//! Progress snapshots for the user-facing layer.

use crate::{AuthznError, ErrorKind, TransactionReceipt, UsernameCheck};
use alloy_primitives::B256;
use std::fmt;

/// Where the client is in its current operation.
///
/// Snapshots are published on a `watch` channel (see
/// [`crate::AuthznClient::subscribe`]); `Display` renders the text shown to
/// the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Status {
    /// Nothing in progress.
    #[default]
    Idle,
    /// Looking the username up.
    CheckingUsername,
    /// The username lookup finished.
    UsernameChecked(UsernameCheck),
    /// Waiting for the platform to create a credential.
    RequestingCredential,
    /// Waiting for the contract to sign the registration.
    AwaitingSponsorSignature,
    /// The registration was relayed and awaits inclusion.
    Submitted {
        /// The relayed transaction.
        transaction_hash: B256,
    },
    /// The registration was included.
    Registered(TransactionReceipt),
    /// Reading the account's credential ids.
    FetchingCredentials,
    /// Waiting for the platform to sign the challenge.
    AwaitingAssertion,
    /// The proxied call returned.
    Completed,
    /// The operation failed.
    Failed {
        /// What kind of failure.
        kind: ErrorKind,
        /// The error's message.
        message: String,
    },
}

impl From<&AuthznError> for Status {
    fn from(error: &AuthznError) -> Self {
        Status::Failed {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => Ok(()),
            Status::CheckingUsername => f.write_str("..."),
            Status::UsernameChecked(check) => f.write_str(check.reason),
            Status::RequestingCredential => f.write_str("Requesting WebAuthN Creation"),
            Status::AwaitingSponsorSignature => f.write_str("Requesting sponsor signature"),
            Status::Submitted { transaction_hash } => {
                write!(f, "Registering (tx: {transaction_hash})")
            }
            Status::Registered(receipt) => write!(
                f,
                "Registered (block: {}, tx: {}, gas: {})",
                receipt.block_number, receipt.transaction_hash, receipt.gas_used
            ),
            Status::FetchingCredentials => f.write_str("Fetching Credentials"),
            Status::AwaitingAssertion => f.write_str("Fetching Credentials & Signing"),
            Status::Completed => f.write_str("Done"),
            Status::Failed { kind, message } => write!(f, "Error ({kind}): {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UsernameStatus;

    #[test]
    fn it_renders_registration_progress() {
        let hash = B256::repeat_byte(0xab);
        assert_eq!(
            Status::Submitted {
                transaction_hash: hash
            }
            .to_string(),
            format!("Registering (tx: {hash})")
        );
        assert_eq!(
            Status::Registered(TransactionReceipt {
                block_number: 7,
                transaction_hash: hash,
                gas_used: 21_000,
            })
            .to_string(),
            format!("Registered (block: 7, tx: {hash}, gas: 21000)")
        );
    }

    #[test]
    fn it_keeps_the_error_kind_in_failures() {
        let status = Status::from(&AuthznError::Submission {
            code: -32000,
            message: "nonce too low".into(),
        });
        assert_eq!(status.to_string(), "Error (submission): -32000: nonce too low");
    }

    #[test]
    fn it_renders_username_checks_with_their_reason() {
        let status = Status::UsernameChecked(UsernameStatus::AlreadyExists.into());
        assert_eq!(status.to_string(), "Already Exists!");
    }
}
