//! Zeroizing container for key material, shares and decrypted bodies.

use std::fmt;
use zeroize::Zeroizing;

/// Owned secret bytes.
///
/// Deliberately has no `Display` impl and a redacted `Debug`, so the contents
/// can't leak through `{}`/`{:?}` formatting in logs or error messages. The
/// buffer is wiped when the value is dropped.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretBytes(Zeroizing<Vec<u8>>);

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Copy a borrowed slice into a new secret buffer.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }

    /// Borrow the raw bytes. Callers must not copy them into
    /// long-lived, non-zeroizing storage.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Zeroizing<Vec<u8>>> for SecretBytes {
    fn from(bytes: Zeroizing<Vec<u8>>) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for SecretBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes(<{} bytes redacted>)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretBytes::new(b"launch codes".to_vec());
        let rendered = format!("{:?}", secret);
        assert!(!rendered.contains("launch"));
        assert!(rendered.contains("12 bytes"));
    }

    #[test]
    fn test_takes_over_zeroizing_buffer() {
        let secret = SecretBytes::from(Zeroizing::new(vec![7u8; 32]));
        assert_eq!(secret.expose(), &[7u8; 32]);
    }

    #[test]
    fn test_expose_returns_original_bytes() {
        let secret = SecretBytes::from(vec![1, 2, 3]);
        assert_eq!(secret.expose(), &[1, 2, 3]);
        assert_eq!(secret.len(), 3);
    }
}
