//! Body key generation and digest verification.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::{CryptoError, CryptoResult, SecretBytes};

/// Key size used for message bodies (AES-256).
pub const KEY_SIZE: usize = 32;

/// Length of a [`KeyDigest`].
pub const DIGEST_SIZE: usize = 32;

/// Generate a random AES key of `size` bytes.
pub fn generate_key(size: usize) -> CryptoResult<SecretBytes> {
    if !matches!(size, 16 | 24 | 32) {
        return Err(CryptoError::InvalidKeyLength(size));
    }

    let mut key = vec![0u8; size];
    OsRng
        .try_fill_bytes(&mut key)
        .map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(SecretBytes::new(key))
}

/// SHA-256 of a body key.
///
/// Stored next to the ciphertext so a reconstructed key can be checked
/// before it is used. It can't be turned back into the key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KeyDigest([u8; DIGEST_SIZE]);

impl KeyDigest {
    pub fn of(key: &SecretBytes) -> Self {
        Self(Sha256::digest(key.expose()).into())
    }

    /// Rebuild a digest loaded from storage.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; DIGEST_SIZE]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Constant-time check of a candidate key against this digest.
    pub fn verify(&self, candidate: &SecretBytes) -> bool {
        let actual = Self::of(candidate);
        bool::from(self.0.ct_eq(&actual.0))
    }
}

impl std::fmt::Debug for KeyDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyDigest(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_key_sizes() {
        for size in [16, 24, 32] {
            assert_eq!(generate_key(size).unwrap().len(), size);
        }
        assert!(matches!(generate_key(31), Err(CryptoError::InvalidKeyLength(31))));
    }

    #[test]
    fn test_generated_keys_differ() {
        let a = generate_key(KEY_SIZE).unwrap();
        let b = generate_key(KEY_SIZE).unwrap();
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn test_digest_verifies_only_original_key() {
        let key = generate_key(KEY_SIZE).unwrap();
        let digest = KeyDigest::of(&key);
        assert!(digest.verify(&key));

        let mut tampered = key.expose().to_vec();
        tampered[0] ^= 0x01;
        assert!(!digest.verify(&SecretBytes::new(tampered)));
        assert!(!digest.verify(&SecretBytes::default()));
    }

    #[test]
    fn test_digest_from_slice() {
        let key = SecretBytes::from_slice(&[5u8; 32]);
        let digest = KeyDigest::of(&key);
        let restored = KeyDigest::from_slice(digest.as_bytes()).unwrap();
        assert_eq!(restored, digest);
        assert!(KeyDigest::from_slice(&[0u8; 31]).is_none());
    }
}
