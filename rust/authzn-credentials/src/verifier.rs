//! Off-chain verification of assertions against a registered key.
//!
//! Mirrors the on-chain check:
//! 1. `clientDataJSON` must be a `webauthn.get` carrying the expected challenge
//! 2. the signed message is `authenticatorData || SHA-256(clientDataJSON)`
//! 3. `(r, s)` must verify under the registered P-256 key

use crate::{Assertion, CoseKey, VerifyError, encode_challenge};
use p256::ecdsa::{Signature, VerifyingKey, signature::Verifier as _};
use sha2::{Digest, Sha256};

/// Length of the fixed authenticator data header: rpIdHash, flags, signCount.
const AUTH_DATA_HEADER_LEN: usize = 37;

/// Verifies assertions made by one registered credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionVerifier {
    key: VerifyingKey,
}

impl AssertionVerifier {
    /// Create a verifier from the key stored at registration.
    pub fn from_cose(key: &CoseKey) -> Result<Self, VerifyError> {
        let key = key.verifying_key().map_err(|_| VerifyError::InvalidKey)?;
        Ok(Self { key })
    }

    /// The inner P-256 verifying key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.key
    }

    /// Verify a shaped [`Assertion`] over `challenge`.
    pub fn verify_assertion(
        &self,
        challenge: &[u8],
        assertion: &Assertion,
    ) -> Result<(), VerifyError> {
        self.verify(
            challenge,
            &assertion.authenticator_data,
            &assertion.client_data_json,
            &assertion.r,
            &assertion.s,
        )
    }

    /// Verify the raw parts of an assertion over `challenge`.
    pub fn verify(
        &self,
        challenge: &[u8],
        authenticator_data: &[u8],
        client_data_json: &[u8],
        r: &[u8; 32],
        s: &[u8; 32],
    ) -> Result<(), VerifyError> {
        if authenticator_data.len() < AUTH_DATA_HEADER_LEN {
            return Err(VerifyError::InvalidAuthenticatorData);
        }

        validate_client_data(challenge, client_data_json)?;

        let client_data_hash = Sha256::digest(client_data_json);
        let mut signed_data = Vec::with_capacity(authenticator_data.len() + 32);
        signed_data.extend_from_slice(authenticator_data);
        signed_data.extend_from_slice(&client_data_hash);

        let signature = Signature::from_scalars(
            p256::FieldBytes::clone_from_slice(r),
            p256::FieldBytes::clone_from_slice(s),
        )
        .map_err(|e| VerifyError::InvalidSignature(e.to_string()))?;

        self.key
            .verify(&signed_data, &signature)
            .map_err(|e| VerifyError::InvalidSignature(e.to_string()))
    }
}

fn validate_client_data(challenge: &[u8], client_data_json: &[u8]) -> Result<(), VerifyError> {
    #[derive(serde::Deserialize)]
    struct ClientData {
        #[serde(rename = "type")]
        kind: String,
        challenge: String,
    }

    let client_data: ClientData = serde_json::from_slice(client_data_json)
        .map_err(|e| VerifyError::InvalidClientData(e.to_string()))?;

    if client_data.kind != "webauthn.get" {
        return Err(VerifyError::UnexpectedType(client_data.kind));
    }

    if client_data.challenge != encode_challenge(challenge) {
        return Err(VerifyError::ChallengeMismatch);
    }

    Ok(())
}
