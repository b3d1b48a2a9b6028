//! The platform capability behind every ceremony.

use crate::CredentialError;
use async_trait::async_trait;
use authzn_common::ConditionalSync;
use std::time::Duration;

/// The relying party a credential is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    /// The relying party identifier (the origin's host, e.g. `"auth.example"`).
    pub id: String,
    /// A human-readable relying party name.
    pub name: String,
}

/// The account a credential is created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// An opaque user handle. For authzn accounts this is the username hash.
    pub id: Vec<u8>,
    /// The account name shown by the platform.
    pub name: String,
    /// A human-readable display name.
    pub display_name: String,
}

/// Raw output of a `create` ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationResponse {
    /// The credential id (`rawId`).
    pub raw_id: Vec<u8>,
    /// The CBOR attestation object.
    pub attestation_object: Vec<u8>,
    /// The `clientDataJSON` bytes.
    pub client_data_json: Vec<u8>,
}

/// Raw output of a `get` ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResponse {
    /// The id of the credential that signed (`rawId`).
    pub raw_id: Vec<u8>,
    /// The authenticator data that was signed over.
    pub authenticator_data: Vec<u8>,
    /// The `clientDataJSON` bytes whose hash was signed over.
    pub client_data_json: Vec<u8>,
    /// The DER-encoded ECDSA signature.
    pub signature: Vec<u8>,
}

/// A platform authenticator: the two WebAuthn ceremonies and nothing else.
///
/// Both operations wait on user presence and may never complete on their
/// own. `timeout` is forwarded to the platform as a hint; callers enforce the
/// actual deadline.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait Authenticator: ConditionalSync {
    /// Create a new ES256 credential for `user` scoped to `rp`.
    async fn create(
        &self,
        rp: &RelyingParty,
        user: &UserIdentity,
        challenge: &[u8],
        timeout: Duration,
    ) -> Result<AttestationResponse, CredentialError>;

    /// Sign `challenge` with one of the `allowed` credentials.
    async fn get(
        &self,
        allowed: &[Vec<u8>],
        challenge: &[u8],
        timeout: Duration,
    ) -> Result<AssertionResponse, CredentialError>;
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<T> Authenticator for std::sync::Arc<T>
where
    T: Authenticator + ?Sized,
{
    async fn create(
        &self,
        rp: &RelyingParty,
        user: &UserIdentity,
        challenge: &[u8],
        timeout: Duration,
    ) -> Result<AttestationResponse, CredentialError> {
        (**self).create(rp, user, challenge, timeout).await
    }

    async fn get(
        &self,
        allowed: &[Vec<u8>],
        challenge: &[u8],
        timeout: Duration,
    ) -> Result<AssertionResponse, CredentialError> {
        (**self).get(allowed, challenge, timeout).await
    }
}
