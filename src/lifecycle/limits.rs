//! Size and range limits for message submissions.

use super::EngineError;
use crate::crypto::KEY_SIZE;

/// Maximum creator label length, in characters.
pub const MAX_CREATOR_LABEL_CHARS: usize = 16;

/// Maximum plaintext size in bytes.
pub const MAX_PLAINTEXT_BYTES: usize = 1000;

/// Maximum encrypted body size (nonce + ciphertext + tag).
pub const MAX_ENCRYPTED_BODY_BYTES: usize = 1024;

/// Keyholder bounds, applied to both N and M.
pub const MIN_KEYHOLDERS: usize = 2;
pub const MAX_KEYHOLDERS: usize = 256;

/// Every share of a message key: one byte per key byte plus the x-coordinate.
pub const SHARE_BYTES: usize = KEY_SIZE + 1;

/// Check a new message request. Order: label, plaintext, N, then M.
pub fn validate_submission(
    creator_label: &str,
    plaintext: &[u8],
    total: usize,
    threshold: usize,
) -> Result<(), EngineError> {
    let label_chars = creator_label.chars().count();
    if label_chars > MAX_CREATOR_LABEL_CHARS {
        return Err(EngineError::Validation(format!(
            "creator label is too long: {label_chars} characters, max {MAX_CREATOR_LABEL_CHARS}"
        )));
    }

    if plaintext.len() > MAX_PLAINTEXT_BYTES {
        return Err(EngineError::Validation(format!(
            "message is too large: {} bytes, max {MAX_PLAINTEXT_BYTES}",
            plaintext.len()
        )));
    }

    if !(MIN_KEYHOLDERS..=MAX_KEYHOLDERS).contains(&total)
        || !(MIN_KEYHOLDERS..=MAX_KEYHOLDERS).contains(&threshold)
        || threshold > total
    {
        return Err(EngineError::InvalidThresholdParameters { threshold, total });
    }

    Ok(())
}

/// Check a submitted share payload before it is stored.
///
/// A malformed share must never reach a slot: once the quorum is reached it
/// would fail the combine and wipe the message.
pub fn validate_share_payload(payload: &[u8]) -> Result<(), EngineError> {
    if payload.len() != SHARE_BYTES {
        return Err(EngineError::Validation(format!(
            "share must be {SHARE_BYTES} bytes, got {}",
            payload.len()
        )));
    }
    if payload[SHARE_BYTES - 1] == 0 {
        return Err(EngineError::Validation(
            "share has a zero x-coordinate".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_bounds() {
        assert!(validate_submission("", b"", 2, 2).is_ok());
        assert!(validate_submission("sixteen-chars-ok", &[0u8; 1000], 256, 256).is_ok());
    }

    #[test]
    fn test_label_counts_characters_not_bytes() {
        // 16 two-byte characters
        let label = "ж".repeat(16);
        assert!(validate_submission(&label, b"x", 3, 2).is_ok());
        let label = "ж".repeat(17);
        assert!(matches!(
            validate_submission(&label, b"x", 3, 2),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_plaintext_too_large() {
        assert!(matches!(
            validate_submission("alice", &[0u8; 1001], 3, 2),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_threshold_ranges() {
        for (total, threshold) in [(1, 1), (257, 2), (5, 1), (3, 4), (300, 300)] {
            assert!(matches!(
                validate_submission("alice", b"x", total, threshold),
                Err(EngineError::InvalidThresholdParameters { .. })
            ));
        }
    }

    #[test]
    fn test_label_checked_before_thresholds() {
        let label = "x".repeat(17);
        assert!(matches!(
            validate_submission(&label, b"x", 1, 5),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_share_payload_shape() {
        assert!(validate_share_payload(&[1u8; SHARE_BYTES]).is_ok());
        for len in [0, 1, SHARE_BYTES - 1, SHARE_BYTES + 1, 64] {
            assert!(matches!(
                validate_share_payload(&vec![1u8; len]),
                Err(EngineError::Validation(_))
            ));
        }

        let mut zero_x = [1u8; SHARE_BYTES];
        zero_x[SHARE_BYTES - 1] = 0;
        assert!(matches!(
            validate_share_payload(&zero_x),
            Err(EngineError::Validation(_))
        ));
    }
}
