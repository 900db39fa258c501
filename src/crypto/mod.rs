//! Cryptographic primitives for message locking.
//!
//! Uses:
//! - AES-GCM for authenticated encryption of message bodies
//! - Shamir secret sharing over GF(2^8) for splitting the body key
//! - SHA-256 digests for verifying a reconstructed key
//!
//! Key material and shares travel as [`SecretBytes`], which never prints its
//! contents and is zeroized on drop.

pub mod cipher;
pub mod key;
pub mod secret;
pub mod shamir;

pub use cipher::{decrypt, encrypt, NONCE_SIZE, TAG_SIZE};
pub use key::{generate_key, KeyDigest, KEY_SIZE};
pub use secret::SecretBytes;
pub use shamir::{combine, split, MAX_SHARES, MIN_THRESHOLD};

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid AES key length: {0} bytes (expected 16, 24 or 32)")]
    InvalidKeyLength(usize),

    #[error("Authentication failed - ciphertext tampered, corrupted or wrong key")]
    AuthenticationFailure,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Random number generator failure: {0}")]
    Rng(String),

    #[error("Invalid threshold parameters: threshold {threshold}, total shares {total}")]
    InvalidThresholdParameters { threshold: usize, total: usize },

    #[error("Secret must not be empty")]
    EmptySecret,

    #[error("Invalid share set: {0}")]
    InvalidShares(&'static str),
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;
