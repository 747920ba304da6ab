// Crypto - Hashing and signature capability used by the ledger and consensus
//
// Digests, keys and signatures all travel as lowercase hex strings so they
// can be embedded directly in the wire format and in log lines.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use thiserror::Error;

/// Hash arbitrary bytes with Blake3, returning the digest as lowercase hex.
pub fn hash(data: &[u8]) -> String {
    hex::encode(blake3::hash(data).as_bytes())
}

/// Sign a message, returning the signature as hex.
pub fn sign(message: &[u8], key: &SigningKey) -> String {
    hex::encode(key.sign(message).to_bytes())
}

/// Verify a hex signature against a hex-encoded public key.
///
/// Returns `Ok(false)` when the signature does not match the message; key or
/// signature material that cannot be decoded at all is a [`CryptoError`].
pub fn verify(message: &[u8], signature_hex: &str, public_key_hex: &str) -> Result<bool, CryptoError> {
    let key_bytes: [u8; 32] = hex::decode(public_key_hex)?
        .try_into()
        .map_err(|_| CryptoError::MalformedKey)?;
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| CryptoError::MalformedKey)?;

    let sig_bytes: [u8; 64] = hex::decode(signature_hex)?
        .try_into()
        .map_err(|_| CryptoError::MalformedSignature)?;
    let signature = Signature::from_bytes(&sig_bytes);

    Ok(key.verify(message, &signature).is_ok())
}

/// Hex encoding of the public half of a signing key.
pub fn public_key_hex(key: &SigningKey) -> String {
    hex::encode(key.verifying_key().to_bytes())
}

/// Failures of the underlying primitives. Always surfaced, never swallowed.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("malformed hex input: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("public key material has the wrong length or is not a valid key")]
    MalformedKey,

    #[error("signature material has the wrong length")]
    MalformedSignature,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash(b"posyg"), hash(b"posyg"));
        assert_ne!(hash(b"posyg"), hash(b"gysop"));
    }

    #[test]
    fn sign_then_verify_roundtrip() {
        let key = SigningKey::generate(&mut OsRng);
        let signature = sign(b"finalize block 7", &key);
        let public = public_key_hex(&key);

        assert!(verify(b"finalize block 7", &signature, &public).unwrap());
        assert!(!verify(b"finalize block 8", &signature, &public).unwrap());
    }

    #[test]
    fn garbage_key_material_is_an_error() {
        let key = SigningKey::generate(&mut OsRng);
        let signature = sign(b"msg", &key);

        assert!(verify(b"msg", &signature, "not-hex").is_err());
        assert!(verify(b"msg", &signature, "deadbeef").is_err());
        assert!(verify(b"msg", "deadbeef", &public_key_hex(&key)).is_err());
    }
}
