//! WebAuthn ceremonies for authzn accounts.
//!
//! The platform authenticator is an injected capability: anything that
//! implements [`Authenticator`] (two operations, `create` and `get`) can back a
//! [`CredentialBroker`]. The broker adds what the account contract expects on
//! top of the raw ceremony output:
//!
//! - registration yields the credential id and its attested COSE P-256 key
//! - assertion yields the authenticator data, the `clientDataJSON` split into
//!   order-preserving tokens, and the ECDSA signature split into `r` and `s`
//!
//! Implementations:
//! - **Browser** (`wasm32-unknown-unknown`): `navigator.credentials`
//! - **Software** (feature `software`, on by default): an in-process P-256
//!   authenticator for headless use and tests

mod attestation;
mod authenticator;
mod broker;
mod client_data;
mod cose;
mod error;
mod verifier;

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
mod browser;
#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
pub use browser::BrowserAuthenticator;

#[cfg(feature = "software")]
mod software;
#[cfg(feature = "software")]
pub use software::SoftwareAuthenticator;

pub use attestation::{AttestedCredential, parse_attestation_object};
pub use authenticator::{
    AssertionResponse, AttestationResponse, Authenticator, RelyingParty, UserIdentity,
};
pub use broker::{Assertion, Credential, CredentialBroker};
pub use client_data::{ClientDataToken, TokenKind, render_tokens, tokenize_client_data};
pub use cose::{COSE_ALG_ES256, CoseKey};
pub use error::{CredentialError, VerifyError};
pub use verifier::AssertionVerifier;

/// Encode a challenge the way a platform writes it into `clientDataJSON`.
pub fn encode_challenge(challenge: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(challenge)
}
