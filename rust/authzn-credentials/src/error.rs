//! Error types for WebAuthn operations.

use std::time::Duration;
use thiserror::Error;

/// Errors from the credential ceremonies and from shaping their output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// The WebAuthn API is not available in this environment.
    #[error("WebAuthn API not available: {0}")]
    NotAvailable(String),

    /// The user cancelled the prompt, or the platform refused the request.
    #[error("ceremony cancelled or not allowed: {0}")]
    NotAllowed(String),

    /// The authenticator already holds a credential for this user.
    #[error("a credential for this user already exists on the authenticator")]
    DuplicateCredential,

    /// The authenticator produced a key for an algorithm other than ES256.
    #[error("unsupported credential algorithm {0} (only ES256 is accepted)")]
    UnsupportedAlgorithm(i64),

    /// The ceremony did not complete before its deadline.
    #[error("ceremony did not complete within {0:?}")]
    TimedOut(Duration),

    /// There is no registered credential to assert with.
    #[error("no credentials are registered for this account")]
    NoCredentials,

    /// The attestation object or its embedded key could not be parsed.
    #[error("invalid attestation: {0}")]
    InvalidAttestation(String),

    /// The assertion could not be shaped into what the contract verifies.
    #[error("invalid assertion: {0}")]
    InvalidAssertion(String),

    /// A JavaScript interop error occurred.
    #[error("JS error: {0}")]
    JsError(String),
}

/// Errors from verifying an assertion against a registered key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The ECDSA signature is malformed or does not verify.
    #[error("invalid ECDSA signature: {0}")]
    InvalidSignature(String),

    /// The registered key is not a valid P-256 point.
    #[error("invalid public key")]
    InvalidKey,

    /// The `clientDataJSON` could not be parsed as JSON.
    #[error("invalid clientDataJSON: {0}")]
    InvalidClientData(String),

    /// The client data was produced by some ceremony other than `webauthn.get`.
    #[error("unexpected ceremony type {0:?}")]
    UnexpectedType(String),

    /// The challenge in `clientDataJSON` does not match the expected one.
    #[error("challenge mismatch")]
    ChallengeMismatch,

    /// The authenticator data is too short to hold the fixed header.
    #[error("invalid authenticator data")]
    InvalidAuthenticatorData,
}
