//! AES-GCM encryption of message bodies.
//!
//! Output layout is `nonce (12) || ciphertext || tag (16)`. The key size picks
//! the AES variant, anything other than 16/24/32 bytes is rejected.

use aes_gcm::{
    aead::{consts::U12, Aead, AeadCore, KeyInit, OsRng},
    aes::Aes192,
    Aes128Gcm, Aes256Gcm, AesGcm, Nonce,
};

use super::{CryptoError, CryptoResult, SecretBytes};

type Aes192Gcm = AesGcm<Aes192, U12>;

/// GCM nonce length in bytes.
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> CryptoResult<Vec<u8>> {
    match key.len() {
        16 => seal::<Aes128Gcm>(plaintext, key),
        24 => seal::<Aes192Gcm>(plaintext, key),
        32 => seal::<Aes256Gcm>(plaintext, key),
        other => Err(CryptoError::InvalidKeyLength(other)),
    }
}

/// Decrypt a blob produced by [`encrypt`].
///
/// Never returns unauthenticated data: short blobs, tampering and wrong keys
/// all surface as [`CryptoError::AuthenticationFailure`].
pub fn decrypt(blob: &[u8], key: &[u8]) -> CryptoResult<SecretBytes> {
    match key.len() {
        16 => open::<Aes128Gcm>(blob, key),
        24 => open::<Aes192Gcm>(blob, key),
        32 => open::<Aes256Gcm>(blob, key),
        other => Err(CryptoError::InvalidKeyLength(other)),
    }
}

fn seal<C>(plaintext: &[u8], key: &[u8]) -> CryptoResult<Vec<u8>>
where
    C: Aead + AeadCore<NonceSize = U12> + KeyInit,
{
    let cipher = C::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
    let nonce = C::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

fn open<C>(blob: &[u8], key: &[u8]) -> CryptoResult<SecretBytes>
where
    C: Aead + AeadCore<NonceSize = U12> + KeyInit,
{
    if blob.len() < NONCE_SIZE {
        return Err(CryptoError::AuthenticationFailure);
    }

    let cipher = C::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map(SecretBytes::new)
        .map_err(|_| CryptoError::AuthenticationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round_trip_all_key_sizes() {
        for size in [16usize, 24, 32] {
            let key = vec![0x42u8; size];
            let blob = encrypt(b"launch codes", &key).unwrap();
            assert_eq!(blob.len(), NONCE_SIZE + 12 + TAG_SIZE);

            let plaintext = decrypt(&blob, &key).unwrap();
            assert_eq!(plaintext.expose(), b"launch codes");
        }
    }

    #[test]
    fn test_empty_plaintext_round_trips() {
        let key = [9u8; 32];
        let blob = encrypt(b"", &key).unwrap();
        assert_eq!(blob.len(), NONCE_SIZE + TAG_SIZE);
        assert!(decrypt(&blob, &key).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_key_length_rejected() {
        assert!(matches!(
            encrypt(b"hi", &[0u8; 20]),
            Err(CryptoError::InvalidKeyLength(20))
        ));
        assert!(matches!(
            decrypt(&[0u8; 40], &[0u8; 0]),
            Err(CryptoError::InvalidKeyLength(0))
        ));
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let key = [1u8; 32];
        let a = encrypt(b"same", &key).unwrap();
        let b = encrypt(b"same", &key).unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
    }

    #[test]
    fn test_short_blob_fails_authentication() {
        let key = [1u8; 32];
        assert!(matches!(
            decrypt(&[0u8; NONCE_SIZE - 1], &key),
            Err(CryptoError::AuthenticationFailure)
        ));
        // Nonce present but no tag.
        assert!(matches!(
            decrypt(&[0u8; NONCE_SIZE], &key),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let blob = encrypt(b"secret", &[1u8; 32]).unwrap();
        assert!(matches!(
            decrypt(&blob, &[2u8; 32]),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_round_trip(plaintext in proptest::collection::vec(any::<u8>(), 0..=1000)) {
            let key = [7u8; 32];
            let blob = encrypt(&plaintext, &key).unwrap();
            let decrypted = decrypt(&blob, &key).unwrap();
            prop_assert_eq!(decrypted.expose(), plaintext.as_slice());
        }

        #[test]
        fn prop_bit_flip_detected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..=256),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let key = [3u8; 16];
            let mut blob = encrypt(&plaintext, &key).unwrap();
            let at = index.index(blob.len());
            blob[at] ^= 1 << bit;
            prop_assert!(matches!(decrypt(&blob, &key), Err(CryptoError::AuthenticationFailure)));
        }
    }
}
