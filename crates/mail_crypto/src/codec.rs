//! Byte/string conversions used at every boundary of the crate.
//!
//! Base64 is the padded STANDARD alphabet everywhere; nothing here uses the
//! URL-safe variant.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::CryptoError;

/// Decode UTF-8, failing on invalid sequences instead of substituting U+FFFD.
pub fn bytes_to_utf8(bytes: &[u8]) -> Result<String, CryptoError> {
    Ok(String::from_utf8(bytes.to_vec())?)
}

pub fn utf8_to_bytes(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

pub fn base64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn base64_decode(s: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(STANDARD.decode(s)?)
}

/// Decode base64 into a fixed 32-byte array (keys, digests).
pub fn base64_decode_32(s: &str) -> Result<[u8; 32], CryptoError> {
    let bytes = base64_decode(s)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey(format!("expected 32 bytes, got {len}")))
}
