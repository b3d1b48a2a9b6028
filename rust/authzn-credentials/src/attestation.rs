//! Attestation object parsing.
//!
//! Only the attested credential data matters to the account contract: the
//! credential id and the COSE public key. The attestation statement itself is
//! not checked here; the contract does not rely on it either.

use crate::{CoseKey, CredentialError};
use ciborium::value::Value;

const RP_ID_HASH_LEN: usize = 32;
const FLAG_USER_PRESENT: u8 = 0x01;
const FLAG_ATTESTED_CREDENTIAL_DATA: u8 = 0x40;
/// rpIdHash (32) + flags (1) + signCount (4)
const FIXED_HEADER_LEN: usize = RP_ID_HASH_LEN + 1 + 4;
const AAGUID_LEN: usize = 16;

/// The credential a registration ceremony produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredential {
    /// The SHA-256 of the relying party id the credential is scoped to.
    pub rp_id_hash: [u8; 32],
    /// The credential id chosen by the authenticator.
    pub credential_id: Vec<u8>,
    /// The credential's public key.
    pub public_key: CoseKey,
}

/// Parse a CBOR attestation object (`{fmt, attStmt, authData}`) and pull the
/// attested credential data out of its `authData`.
pub fn parse_attestation_object(bytes: &[u8]) -> Result<AttestedCredential, CredentialError> {
    let value: Value = ciborium::from_reader(bytes)
        .map_err(|e| CredentialError::InvalidAttestation(format!("attestation object: {e}")))?;
    let Value::Map(entries) = value else {
        return Err(CredentialError::InvalidAttestation(
            "attestation object is not a CBOR map".into(),
        ));
    };

    let auth_data = entries
        .iter()
        .find_map(|(k, v)| match (k, v) {
            (Value::Text(key), Value::Bytes(data)) if key == "authData" => Some(data),
            _ => None,
        })
        .ok_or_else(|| CredentialError::InvalidAttestation("missing authData".into()))?;

    parse_authenticator_data(auth_data)
}

fn parse_authenticator_data(data: &[u8]) -> Result<AttestedCredential, CredentialError> {
    let header_end = FIXED_HEADER_LEN + AAGUID_LEN + 2;
    if data.len() < header_end {
        return Err(CredentialError::InvalidAttestation(format!(
            "authData too short ({} bytes)",
            data.len()
        )));
    }

    let flags = data[RP_ID_HASH_LEN];
    if flags & FLAG_USER_PRESENT == 0 {
        return Err(CredentialError::InvalidAttestation(
            "user presence flag not set".into(),
        ));
    }
    if flags & FLAG_ATTESTED_CREDENTIAL_DATA == 0 {
        return Err(CredentialError::InvalidAttestation(
            "authData carries no attested credential data".into(),
        ));
    }

    let mut rp_id_hash = [0u8; 32];
    rp_id_hash.copy_from_slice(&data[..RP_ID_HASH_LEN]);

    let length_at = FIXED_HEADER_LEN + AAGUID_LEN;
    let id_len = u16::from_be_bytes([data[length_at], data[length_at + 1]]) as usize;
    let id_end = header_end + id_len;
    if data.len() <= id_end {
        return Err(CredentialError::InvalidAttestation(
            "credential id overruns authData".into(),
        ));
    }

    Ok(AttestedCredential {
        rp_id_hash,
        credential_id: data[header_end..id_end].to_vec(),
        public_key: CoseKey::from_cbor(&data[id_end..])?,
    })
}

/// Build `authData` for a freshly created credential (UP and AT flags set).
#[cfg(any(test, feature = "software"))]
pub(crate) fn build_registration_auth_data(
    rp_id_hash: &[u8; 32],
    credential_id: &[u8],
    public_key: &CoseKey,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(FIXED_HEADER_LEN + AAGUID_LEN + 2 + credential_id.len() + 77);
    data.extend_from_slice(rp_id_hash);
    data.push(FLAG_USER_PRESENT | FLAG_ATTESTED_CREDENTIAL_DATA);
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(&[0u8; AAGUID_LEN]);
    data.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
    data.extend_from_slice(credential_id);
    data.extend_from_slice(&public_key.to_cbor());
    data
}

/// Wrap `authData` in a `none`-format attestation object.
#[cfg(any(test, feature = "software"))]
pub(crate) fn build_attestation_object(auth_data: &[u8]) -> Vec<u8> {
    let map = Value::Map(vec![
        (Value::Text("fmt".into()), Value::Text("none".into())),
        (Value::Text("attStmt".into()), Value::Map(Vec::new())),
        (Value::Text("authData".into()), Value::Bytes(auth_data.to_vec())),
    ]);
    let mut buf = Vec::new();
    ciborium::into_writer(&map, &mut buf).expect("attestation encoding is infallible");
    buf
}
