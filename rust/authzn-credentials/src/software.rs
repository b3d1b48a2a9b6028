//! An in-process P-256 authenticator.
//!
//! Produces the same artifacts a platform authenticator would (a `none`
//! attestation object, browser-shaped `clientDataJSON`, DER signatures) so
//! everything downstream of the broker can run without a browser.

use crate::attestation::{build_attestation_object, build_registration_auth_data};
use crate::{
    AssertionResponse, AttestationResponse, Authenticator, CoseKey, CredentialError,
    RelyingParty, UserIdentity, encode_challenge,
};
use async_trait::async_trait;
use p256::ecdsa::{DerSignature, SigningKey, signature::Signer as _};
use parking_lot::Mutex;
use rand_core::{OsRng, RngCore as _};
use sha2::{Digest, Sha256};
use std::time::Duration;

const FLAG_USER_PRESENT: u8 = 0x01;
const FLAG_USER_VERIFIED: u8 = 0x04;
const DEFAULT_CREDENTIAL_ID_LEN: usize = 32;

struct StoredCredential {
    id: Vec<u8>,
    rp_id: String,
    user_id: Vec<u8>,
    key: SigningKey,
    sign_count: u32,
}

/// A software authenticator holding its keys in memory.
pub struct SoftwareAuthenticator {
    origin: String,
    credential_id_len: usize,
    credentials: Mutex<Vec<StoredCredential>>,
}

impl std::fmt::Debug for SoftwareAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareAuthenticator")
            .field("origin", &self.origin)
            .field("credential_id_len", &self.credential_id_len)
            .field("credentials", &self.credentials.lock().len())
            .finish()
    }
}

impl SoftwareAuthenticator {
    /// Create an authenticator that reports `origin` in its client data.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            credential_id_len: DEFAULT_CREDENTIAL_ID_LEN,
            credentials: Mutex::new(Vec::new()),
        }
    }

    /// Issue credential ids of `len` bytes (default: 32). Platforms commonly
    /// issue 16 or 20 byte ids.
    pub fn with_credential_id_len(mut self, len: usize) -> Self {
        self.credential_id_len = len.max(1);
        self
    }

    /// Length of the credential ids this authenticator issues.
    pub fn credential_id_len(&self) -> usize {
        self.credential_id_len
    }

    /// The origin written into `clientDataJSON`.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Number of credentials held.
    pub fn len(&self) -> usize {
        self.credentials.lock().len()
    }

    /// Whether no credentials are held.
    pub fn is_empty(&self) -> bool {
        self.credentials.lock().is_empty()
    }

    /// Drop the credential with `id`, as if the user deleted the passkey.
    pub fn forget(&self, id: &[u8]) -> bool {
        let mut credentials = self.credentials.lock();
        let before = credentials.len();
        credentials.retain(|credential| credential.id != id);
        credentials.len() != before
    }

    fn client_data(&self, kind: &str, challenge: &[u8]) -> Vec<u8> {
        serde_json::json!({
            "type": kind,
            "challenge": encode_challenge(challenge),
            "origin": self.origin,
            "crossOrigin": false,
        })
        .to_string()
        .into_bytes()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Authenticator for SoftwareAuthenticator {
    async fn create(
        &self,
        rp: &RelyingParty,
        user: &UserIdentity,
        challenge: &[u8],
        _timeout: Duration,
    ) -> Result<AttestationResponse, CredentialError> {
        let mut credentials = self.credentials.lock();
        if credentials
            .iter()
            .any(|c| c.rp_id == rp.id && c.user_id == user.id)
        {
            return Err(CredentialError::DuplicateCredential);
        }

        let key = SigningKey::random(&mut OsRng);
        let mut id = vec![0u8; self.credential_id_len];
        OsRng.fill_bytes(&mut id);
        // A leading zero byte does not survive left-padded bytes32 storage.
        if id[0] == 0 {
            id[0] = 1;
        }

        let rp_id_hash: [u8; 32] = Sha256::digest(rp.id.as_bytes()).into();
        let public_key = CoseKey::from_verifying_key(key.verifying_key());
        let auth_data = build_registration_auth_data(&rp_id_hash, &id, &public_key);

        credentials.push(StoredCredential {
            id: id.clone(),
            rp_id: rp.id.clone(),
            user_id: user.id.clone(),
            key,
            sign_count: 0,
        });

        Ok(AttestationResponse {
            raw_id: id,
            attestation_object: build_attestation_object(&auth_data),
            client_data_json: self.client_data("webauthn.create", challenge),
        })
    }

    async fn get(
        &self,
        allowed: &[Vec<u8>],
        challenge: &[u8],
        _timeout: Duration,
    ) -> Result<AssertionResponse, CredentialError> {
        let mut credentials = self.credentials.lock();
        let credential = credentials
            .iter_mut()
            .find(|c| allowed.contains(&c.id))
            .ok_or_else(|| {
                CredentialError::NotAllowed("no matching credential on this authenticator".into())
            })?;

        credential.sign_count = credential.sign_count.wrapping_add(1);

        let rp_id_hash = Sha256::digest(credential.rp_id.as_bytes());
        let mut authenticator_data = Vec::with_capacity(37);
        authenticator_data.extend_from_slice(&rp_id_hash);
        authenticator_data.push(FLAG_USER_PRESENT | FLAG_USER_VERIFIED);
        authenticator_data.extend_from_slice(&credential.sign_count.to_be_bytes());

        let client_data_json = self.client_data("webauthn.get", challenge);

        let mut message = authenticator_data.clone();
        message.extend_from_slice(&Sha256::digest(&client_data_json));
        let signature: DerSignature = credential.key.sign(&message);

        Ok(AssertionResponse {
            raw_id: credential.id.clone(),
            authenticator_data,
            client_data_json,
            signature: signature.as_bytes().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_attestation_object;
    use testresult::TestResult;

    fn rp() -> RelyingParty {
        RelyingParty {
            id: "localhost".into(),
            name: "authzn".into(),
        }
    }

    fn user(id: u8) -> UserIdentity {
        UserIdentity {
            id: vec![id; 32],
            name: "alice".into(),
            display_name: "alice".into(),
        }
    }

    #[tokio::test]
    async fn it_refuses_a_second_credential_for_the_same_user() -> TestResult {
        let authenticator = SoftwareAuthenticator::new("http://localhost");
        authenticator
            .create(&rp(), &user(1), &[0u8; 32], Duration::from_secs(1))
            .await?;

        let second = authenticator
            .create(&rp(), &user(1), &[0u8; 32], Duration::from_secs(1))
            .await;
        assert_eq!(second, Err(CredentialError::DuplicateCredential));

        authenticator
            .create(&rp(), &user(2), &[0u8; 32], Duration::from_secs(1))
            .await?;
        assert_eq!(authenticator.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn it_attests_its_own_key() -> TestResult {
        let authenticator = SoftwareAuthenticator::new("http://localhost");
        let response = authenticator
            .create(&rp(), &user(1), &[0u8; 32], Duration::from_secs(1))
            .await?;

        let attested = parse_attestation_object(&response.attestation_object)?;
        assert_eq!(attested.credential_id, response.raw_id);
        assert_eq!(attested.rp_id_hash, <[u8; 32]>::from(Sha256::digest(b"localhost")));
        Ok(())
    }

    #[tokio::test]
    async fn it_issues_ids_of_the_configured_length() -> TestResult {
        let authenticator =
            SoftwareAuthenticator::new("http://localhost").with_credential_id_len(16);
        let response = authenticator
            .create(&rp(), &user(1), &[0u8; 32], Duration::from_secs(1))
            .await?;

        assert_eq!(response.raw_id.len(), 16);
        assert_ne!(response.raw_id[0], 0);
        let attested = parse_attestation_object(&response.attestation_object)?;
        assert_eq!(attested.credential_id, response.raw_id);
        Ok(())
    }

    #[tokio::test]
    async fn it_increments_the_sign_count() -> TestResult {
        let authenticator = SoftwareAuthenticator::new("http://localhost");
        let created = authenticator
            .create(&rp(), &user(1), &[0u8; 32], Duration::from_secs(1))
            .await?;
        let allowed = vec![created.raw_id];

        let first = authenticator
            .get(&allowed, &[1u8; 32], Duration::from_secs(1))
            .await?;
        let second = authenticator
            .get(&allowed, &[1u8; 32], Duration::from_secs(1))
            .await?;

        assert_eq!(&first.authenticator_data[33..37], &1u32.to_be_bytes());
        assert_eq!(&second.authenticator_data[33..37], &2u32.to_be_bytes());
        Ok(())
    }

    #[tokio::test]
    async fn it_refuses_to_sign_with_a_forgotten_credential() -> TestResult {
        let authenticator = SoftwareAuthenticator::new("http://localhost");
        let created = authenticator
            .create(&rp(), &user(1), &[0u8; 32], Duration::from_secs(1))
            .await?;
        assert!(authenticator.forget(&created.raw_id));

        let result = authenticator
            .get(&[created.raw_id], &[1u8; 32], Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(CredentialError::NotAllowed(_))));
        Ok(())
    }
}
