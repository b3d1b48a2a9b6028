//! Ceremonies with the parameters the account contract expects.

use crate::{
    Authenticator, ClientDataToken, CoseKey, CredentialError, RelyingParty, UserIdentity,
    parse_attestation_object, tokenize_client_data,
};
use authzn_common::time::{Duration, timeout};

/// Default deadline for a ceremony. Matches the timeout browsers apply when
/// none is requested.
const DEFAULT_CEREMONY_TIMEOUT: Duration = Duration::from_secs(60);

/// A registered credential: its id and attested public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// The credential id chosen by the authenticator.
    pub id: Vec<u8>,
    /// The attested ES256 public key.
    pub public_key: CoseKey,
}

/// A challenge signed by a registered credential, shaped for on-chain
/// verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    /// The id of the credential that signed.
    pub credential_id: Vec<u8>,
    /// The authenticator data that was signed over.
    pub authenticator_data: Vec<u8>,
    /// The original `clientDataJSON`.
    pub client_data_json: Vec<u8>,
    /// `clientDataJSON` as order-preserving tokens.
    pub client_data_tokens: Vec<ClientDataToken>,
    /// Big-endian ECDSA `r`.
    pub r: [u8; 32],
    /// Big-endian ECDSA `s`.
    pub s: [u8; 32],
}

/// Wraps an [`Authenticator`] with ceremony deadlines and output validation.
#[derive(Debug, Clone)]
pub struct CredentialBroker<A> {
    authenticator: A,
    timeout: Duration,
}

impl<A> CredentialBroker<A>
where
    A: Authenticator,
{
    /// Wrap `authenticator`, using the default ceremony deadline.
    pub fn new(authenticator: A) -> Self {
        Self {
            authenticator,
            timeout: DEFAULT_CEREMONY_TIMEOUT,
        }
    }

    /// Set the ceremony deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The ceremony deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The wrapped authenticator.
    pub fn authenticator(&self) -> &A {
        &self.authenticator
    }

    /// Create a credential for `user` scoped to `rp`, signing over
    /// `challenge`.
    ///
    /// The attested credential id must match the id the platform reported,
    /// and the key must be ES256.
    pub async fn register(
        &self,
        rp: &RelyingParty,
        user: &UserIdentity,
        challenge: &[u8],
    ) -> Result<Credential, CredentialError> {
        tracing::debug!(rp = %rp.id, user = %user.name, "requesting credential creation");

        let response = timeout(
            self.timeout,
            self.authenticator
                .create(rp, user, challenge, self.timeout),
        )
        .await
        .map_err(|_| CredentialError::TimedOut(self.timeout))??;

        let attested = parse_attestation_object(&response.attestation_object)?;
        if attested.credential_id != response.raw_id {
            return Err(CredentialError::InvalidAttestation(
                "attested credential id differs from rawId".into(),
            ));
        }

        tracing::debug!(
            credential_bytes = attested.credential_id.len(),
            "credential created"
        );

        Ok(Credential {
            id: attested.credential_id,
            public_key: attested.public_key,
        })
    }

    /// Sign `challenge` with one of `candidates`.
    ///
    /// Fails with [`CredentialError::NoCredentials`] without prompting when
    /// there is nothing to choose from.
    pub async fn assert(
        &self,
        candidates: &[Vec<u8>],
        challenge: &[u8],
    ) -> Result<Assertion, CredentialError> {
        if candidates.is_empty() {
            return Err(CredentialError::NoCredentials);
        }

        tracing::debug!(candidates = candidates.len(), "requesting assertion");

        let response = timeout(
            self.timeout,
            self.authenticator.get(candidates, challenge, self.timeout),
        )
        .await
        .map_err(|_| CredentialError::TimedOut(self.timeout))??;

        if !candidates.contains(&response.raw_id) {
            return Err(CredentialError::InvalidAssertion(
                "platform answered with a credential outside the candidate set".into(),
            ));
        }

        let client_data_tokens = tokenize_client_data(&response.client_data_json)?;
        let (r, s) = split_der_signature(&response.signature)?;

        Ok(Assertion {
            credential_id: response.raw_id,
            authenticator_data: response.authenticator_data,
            client_data_json: response.client_data_json,
            client_data_tokens,
            r,
            s,
        })
    }
}

/// Split a DER ECDSA signature into fixed-width big-endian scalars.
fn split_der_signature(der: &[u8]) -> Result<([u8; 32], [u8; 32]), CredentialError> {
    let signature = p256::ecdsa::Signature::from_der(der)
        .map_err(|e| CredentialError::InvalidAssertion(format!("signature: {e}")))?;
    let (r_bytes, s_bytes) = signature.split_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&r_bytes);
    s.copy_from_slice(&s_bytes);
    Ok((r, s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::{SigningKey, signature::Signer as _};

    #[test]
    fn it_splits_der_into_fixed_width_scalars() {
        let sk = SigningKey::from_bytes(&[8u8; 32].into()).unwrap();
        let signature: p256::ecdsa::Signature = sk.sign(b"payload");
        let der = signature.to_der();

        let (r, s) = split_der_signature(der.as_bytes()).unwrap();
        let (expected_r, expected_s) = signature.split_bytes();
        assert_eq!(&r[..], &expected_r[..]);
        assert_eq!(&s[..], &expected_s[..]);
    }

    #[test]
    fn it_rejects_non_der_signatures() {
        assert!(matches!(
            split_der_signature(&[0u8; 64]),
            Err(CredentialError::InvalidAssertion(_))
        ));
    }
}
