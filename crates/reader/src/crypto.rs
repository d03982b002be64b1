//! Nonce generation and ECDSA signature verification
//!
//! Tokens publish their key as a base64 DER `SubjectPublicKeyInfo` and sign with
//! ECDSA over SHA-256, DER encoded. NIST P-256 is what Android keystores produce;
//! secp256k1 keys are accepted as well.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use p256::pkcs8::spki::SubjectPublicKeyInfoRef;
use p256::pkcs8::{AssociatedOid, DecodePublicKey};
use rand::RngCore;
use tracing::trace;

/// Failure to decode the material a verification needs
///
/// Distinct from a signature that decodes but does not match, which is a
/// plain `false` from [`verify`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// Key is not valid DER or not a valid point
    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    /// Key is not an elliptic curve key
    #[error("Unsupported key type")]
    UnsupportedKeyType,

    /// Key is on a curve we cannot verify
    #[error("Unsupported curve")]
    UnsupportedCurve,

    /// Signature is not a valid DER ECDSA signature
    #[error("Malformed signature")]
    MalformedSignature,

    /// Base64 decoding failed
    #[error("Invalid base64 encoding: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
}

/// A decoded token key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    /// NIST P-256
    P256(p256::ecdsa::VerifyingKey),
    /// secp256k1
    K256(k256::ecdsa::VerifyingKey),
}

impl PublicKey {
    /// Decode a DER `SubjectPublicKeyInfo`, dispatching on its curve
    pub fn from_der(der: &[u8]) -> Result<Self, VerificationError> {
        let spki = SubjectPublicKeyInfoRef::try_from(der)
            .map_err(|e| VerificationError::InvalidKey(e.to_string()))?;

        if spki.algorithm.oid != p256::elliptic_curve::ALGORITHM_OID {
            return Err(VerificationError::UnsupportedKeyType);
        }
        let curve = spki
            .algorithm
            .parameters_oid()
            .map_err(|_| VerificationError::UnsupportedCurve)?;

        if curve == p256::NistP256::OID {
            p256::ecdsa::VerifyingKey::from_public_key_der(der)
                .map(Self::P256)
                .map_err(|e| VerificationError::InvalidKey(e.to_string()))
        } else if curve == k256::Secp256k1::OID {
            k256::ecdsa::VerifyingKey::from_public_key_der(der)
                .map(Self::K256)
                .map_err(|e| VerificationError::InvalidKey(e.to_string()))
        } else {
            Err(VerificationError::UnsupportedCurve)
        }
    }

    /// Decode a base64 DER `SubjectPublicKeyInfo`
    pub fn from_base64(encoded: &str) -> Result<Self, VerificationError> {
        Self::from_der(&BASE64.decode(encoded)?)
    }

    /// Check a DER ECDSA/SHA-256 signature over `message`
    pub fn verify(&self, message: &[u8], signature_der: &[u8]) -> Result<bool, VerificationError> {
        use p256::ecdsa::signature::Verifier;

        match self {
            Self::P256(key) => {
                let signature = p256::ecdsa::Signature::from_der(signature_der)
                    .map_err(|_| VerificationError::MalformedSignature)?;
                Ok(key.verify(message, &signature).is_ok())
            }
            Self::K256(key) => {
                let signature = k256::ecdsa::Signature::from_der(signature_der)
                    .map_err(|_| VerificationError::MalformedSignature)?;
                // k256 only accepts low-S signatures
                let signature = signature.normalize_s().unwrap_or(signature);
                Ok(key.verify(message, &signature).is_ok())
            }
        }
    }
}

/// Verify a base64 DER signature over `message` with a base64 DER public key
pub fn verify(message: &[u8], signature: &str, public_key: &str) -> Result<bool, VerificationError> {
    let key = PublicKey::from_base64(public_key)?;
    let signature = BASE64.decode(signature)?;
    let valid = key.verify(message, &signature)?;
    trace!(valid, message_len = message.len(), "Checked signature");
    Ok(valid)
}

/// Fresh hex-encoded nonce of `len` random bytes
pub fn generate_nonce(len: usize) -> String {
    let mut nonce = vec![0u8; len];
    rand::rng().fill_bytes(&mut nonce);
    hex::encode(nonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::SigningKey;
    use p256::ecdsa::signature::Signer;
    use p256::pkcs8::EncodePublicKey;
    use rand_v8::rngs::OsRng;

    fn p256_fixture(message: &[u8]) -> (String, String) {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_key = signing_key
            .verifying_key()
            .to_public_key_der()
            .unwrap();
        let signature: p256::ecdsa::Signature = signing_key.sign(message);
        (
            BASE64.encode(public_key.as_bytes()),
            BASE64.encode(signature.to_der().as_bytes()),
        )
    }

    #[test]
    fn test_p256_signature() {
        let message = b"{\"nonce\":\"00\"}u1";
        let (public_key, signature) = p256_fixture(message);

        assert_eq!(verify(message, &signature, &public_key), Ok(true));
        assert_eq!(verify(b"{\"nonce\":\"01\"}u1", &signature, &public_key), Ok(false));
    }

    #[test]
    fn test_k256_signature() {
        let message = b"challenge";
        let signing_key = k256::ecdsa::SigningKey::random(&mut OsRng);
        let public_key = signing_key.verifying_key().to_public_key_der().unwrap();
        let signature: k256::ecdsa::Signature = signing_key.sign(message);

        let key = PublicKey::from_der(public_key.as_bytes()).unwrap();
        assert!(matches!(key, PublicKey::K256(_)));
        assert_eq!(key.verify(message, signature.to_der().as_bytes()), Ok(true));
    }

    #[test]
    fn test_ed25519_key_is_not_ec() {
        let mut der = hex::decode("302a300506032b6570032100").unwrap();
        der.extend_from_slice(&[0x11; 32]);
        assert_eq!(PublicKey::from_der(&der), Err(VerificationError::UnsupportedKeyType));
    }

    #[test]
    fn test_p384_key_is_unsupported_curve() {
        // id-ecPublicKey with secp384r1 parameters and an uncompressed point
        let mut der = hex::decode("3076301006072a8648ce3d020106052b81040022036200").unwrap();
        der.push(0x04);
        der.extend_from_slice(&[0x5A; 96]);

        assert_eq!(PublicKey::from_der(&der), Err(VerificationError::UnsupportedCurve));
        assert_eq!(
            verify(b"m", "MEUC", &BASE64.encode(&der)),
            Err(VerificationError::UnsupportedCurve)
        );
    }

    #[test]
    fn test_malformed_inputs() {
        let (public_key, _) = p256_fixture(b"m");

        assert!(matches!(
            verify(b"m", "MEUC", "not base64!"),
            Err(VerificationError::InvalidEncoding(_))
        ));
        assert_eq!(
            verify(b"m", &BASE64.encode(b"\x30\x01"), &public_key),
            Err(VerificationError::MalformedSignature)
        );
        assert!(matches!(
            verify(b"m", "MEUC", &BASE64.encode(b"\x30\x59\x30")),
            Err(VerificationError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_nonce() {
        let nonce = generate_nonce(16);
        assert_eq!(nonce.len(), 32);
        assert!(hex::decode(&nonce).is_ok());
        assert_ne!(nonce, generate_nonce(16));
    }
}
