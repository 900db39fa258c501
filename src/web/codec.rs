//! Text forms of a share.
//!
//! Shares go out as standard base64. On the way in, the decimal byte list
//! printed by older tooling is accepted as well, with or without brackets
//! (`"[12 200 7]"`, `"12 200 7"`).

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::crypto::SecretBytes;
use crate::error::{AppError, AppResult};

pub fn encode_share(share: &SecretBytes) -> String {
    STANDARD.encode(share.expose())
}

pub fn decode_share(text: &str) -> AppResult<SecretBytes> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::bad_request("share is empty"));
    }

    if text.starts_with('[') || text.ends_with(']') {
        return decode_byte_list(text.trim_matches(|c: char| c == '[' || c == ']'));
    }

    match STANDARD.decode(text) {
        Ok(bytes) => Ok(SecretBytes::new(bytes)),
        Err(_) => decode_byte_list(text),
    }
}

fn decode_byte_list(inner: &str) -> AppResult<SecretBytes> {
    let mut bytes = Vec::new();
    for token in inner.split_whitespace() {
        match token.parse::<u8>() {
            Ok(b) => bytes.push(b),
            Err(_) => {
                // Wipe what was parsed so far.
                drop(SecretBytes::new(bytes));
                return Err(AppError::bad_request("share is neither base64 nor a byte list"));
            }
        }
    }
    Ok(SecretBytes::new(bytes))
}
