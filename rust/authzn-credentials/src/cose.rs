//! COSE_Key handling for ES256 credential public keys.

use crate::CredentialError;
use ciborium::value::{Integer, Value};
use p256::{EncodedPoint, FieldBytes, ecdsa::VerifyingKey};

/// COSE algorithm identifier for ECDSA w/ SHA-256 on P-256.
pub const COSE_ALG_ES256: i64 = -7;

const COSE_KTY_EC2: i64 = 2;
const COSE_CRV_P256: i64 = 1;

/// An EC2 P-256 public key as it appears in attested credential data.
///
/// The account contract stores exactly these five fields, so they are kept
/// as-is rather than collapsed into a SEC1 point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseKey {
    /// Key type (`2` = EC2).
    pub kty: u8,
    /// Signature algorithm (`-7` = ES256).
    pub alg: i8,
    /// Curve (`1` = P-256).
    pub crv: u8,
    /// Big-endian affine x coordinate.
    pub x: [u8; 32],
    /// Big-endian affine y coordinate.
    pub y: [u8; 32],
}

impl CoseKey {
    /// Build the COSE form of a P-256 verifying key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        // Uncompressed points always carry both coordinates.
        if let (Some(px), Some(py)) = (point.x(), point.y()) {
            x.copy_from_slice(px);
            y.copy_from_slice(py);
        }
        Self {
            kty: COSE_KTY_EC2 as u8,
            alg: COSE_ALG_ES256 as i8,
            crv: COSE_CRV_P256 as u8,
            x,
            y,
        }
    }

    /// Decode a CBOR-encoded COSE_Key, accepting only EC2 / ES256 / P-256.
    ///
    /// Trailing bytes after the map (authenticator extensions) are ignored.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, CredentialError> {
        let value: Value = ciborium::from_reader(bytes)
            .map_err(|e| CredentialError::InvalidAttestation(format!("COSE key: {e}")))?;
        let Value::Map(entries) = value else {
            return Err(CredentialError::InvalidAttestation(
                "COSE key is not a CBOR map".into(),
            ));
        };

        let integer = |label: i64| -> Result<i64, CredentialError> {
            match lookup(&entries, label) {
                Some(Value::Integer(i)) => i64::try_from(*i).map_err(|_| {
                    CredentialError::InvalidAttestation(format!("COSE label {label} out of range"))
                }),
                _ => Err(CredentialError::InvalidAttestation(format!(
                    "COSE label {label} missing or not an integer"
                ))),
            }
        };
        let coordinate = |label: i64| -> Result<[u8; 32], CredentialError> {
            match lookup(&entries, label) {
                Some(Value::Bytes(b)) if b.len() == 32 => {
                    let mut out = [0u8; 32];
                    out.copy_from_slice(b);
                    Ok(out)
                }
                _ => Err(CredentialError::InvalidAttestation(format!(
                    "COSE label {label} must be a 32-byte coordinate"
                ))),
            }
        };

        let alg = integer(3)?;
        if alg != COSE_ALG_ES256 {
            return Err(CredentialError::UnsupportedAlgorithm(alg));
        }
        let kty = integer(1)?;
        if kty != COSE_KTY_EC2 {
            return Err(CredentialError::InvalidAttestation(format!(
                "expected EC2 key type, got {kty}"
            )));
        }
        let crv = integer(-1)?;
        if crv != COSE_CRV_P256 {
            return Err(CredentialError::InvalidAttestation(format!(
                "expected P-256 curve, got {crv}"
            )));
        }

        let key = Self {
            kty: kty as u8,
            alg: alg as i8,
            crv: crv as u8,
            x: coordinate(-2)?,
            y: coordinate(-3)?,
        };
        key.verifying_key().map_err(|_| {
            CredentialError::InvalidAttestation("COSE coordinates are not on P-256".into())
        })?;
        Ok(key)
    }

    /// Encode as a CBOR COSE_Key map (kty, alg, crv, x, y).
    pub fn to_cbor(&self) -> Vec<u8> {
        let map = Value::Map(vec![
            (int(1), int(self.kty as i64)),
            (int(3), int(self.alg as i64)),
            (int(-1), int(self.crv as i64)),
            (int(-2), Value::Bytes(self.x.to_vec())),
            (int(-3), Value::Bytes(self.y.to_vec())),
        ]);
        let mut buf = Vec::new();
        ciborium::into_writer(&map, &mut buf).expect("COSE key encoding is infallible");
        buf
    }

    /// The P-256 verifying key these coordinates describe.
    pub fn verifying_key(&self) -> Result<VerifyingKey, p256::ecdsa::Error> {
        let point = EncodedPoint::from_affine_coordinates(
            FieldBytes::from_slice(&self.x),
            FieldBytes::from_slice(&self.y),
            false,
        );
        VerifyingKey::from_encoded_point(&point)
    }
}

fn int(value: i64) -> Value {
    Value::Integer(Integer::from(value))
}

fn lookup(entries: &[(Value, Value)], label: i64) -> Option<&Value> {
    entries.iter().find_map(|(k, v)| match k {
        Value::Integer(i) if i128::from(*i) == label as i128 => Some(v),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::SigningKey;

    fn key(seed: u8) -> CoseKey {
        let sk = SigningKey::from_bytes(&[seed; 32].into()).unwrap();
        CoseKey::from_verifying_key(sk.verifying_key())
    }

    #[test]
    fn it_decodes_what_it_encodes() {
        let original = key(9);
        let decoded = CoseKey::from_cbor(&original.to_cbor()).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.alg as i64, COSE_ALG_ES256);
    }

    #[test]
    fn it_ignores_trailing_extension_bytes() {
        let original = key(3);
        let mut bytes = original.to_cbor();
        bytes.extend_from_slice(&[0xa0]);
        assert_eq!(CoseKey::from_cbor(&bytes).unwrap(), original);
    }

    #[test]
    fn it_rejects_non_es256_keys() {
        let mut original = key(4);
        original.alg = -8;
        let err = CoseKey::from_cbor(&original.to_cbor()).unwrap_err();
        assert_eq!(err, CredentialError::UnsupportedAlgorithm(-8));
    }

    #[test]
    fn it_rejects_points_off_the_curve() {
        let mut original = key(5);
        original.y = [0x42; 32];
        assert!(matches!(
            CoseKey::from_cbor(&original.to_cbor()),
            Err(CredentialError::InvalidAttestation(_))
        ));
    }

    #[test]
    fn it_recovers_the_verifying_key() {
        let sk = SigningKey::from_bytes(&[11u8; 32].into()).unwrap();
        let cose = CoseKey::from_verifying_key(sk.verifying_key());
        assert_eq!(&cose.verifying_key().unwrap(), sk.verifying_key());
    }
}
