//! Authenticated Encryption with Associated Data
//!
//! Uses XChaCha20-Poly1305 (192-bit nonce).
//! Key size: 32 bytes.  Nonce: 24 bytes (random).  Tag: 16 bytes.
//! Framing is left to the caller; see `tagged_box`.

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng, Payload},
    XChaCha20Poly1305, XNonce,
};
use zeroize::Zeroizing;

use crate::error::CryptoError;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;

/// Encrypt `plaintext` under a fresh random nonce and return `(nonce, ciphertext+tag)`.
/// `aad` is authenticated but not encrypted.
pub fn seal(
    key: &[u8; KEY_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<([u8; NONCE_LEN], Vec<u8>), CryptoError> {
    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::Encryption)?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut AeadOsRng);

    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::Encryption)?;

    let mut nonce_out = [0u8; NONCE_LEN];
    nonce_out.copy_from_slice(&nonce);
    Ok((nonce_out, ciphertext))
}

/// Authenticate and decrypt `ciphertext` (ct+tag) under an explicit nonce.
pub fn open(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if ciphertext.len() < TAG_LEN {
        return Err(CryptoError::Decryption);
    }
    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::Decryption)?;
    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::Decryption)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_with_aad() {
        let key = [7u8; KEY_LEN];
        let (nonce, ct) = seal(&key, b"hello", b"ctx").unwrap();
        assert_eq!(ct.len(), 5 + TAG_LEN);
        assert_eq!(&open(&key, &nonce, &ct, b"ctx").unwrap()[..], b"hello");
    }

    #[test]
    fn wrong_aad_fails() {
        let key = [7u8; KEY_LEN];
        let (nonce, ct) = seal(&key, b"hello", b"ctx").unwrap();
        assert!(open(&key, &nonce, &ct, b"other").unwrap_err().is_decryption());
    }

    #[test]
    fn nonces_are_fresh() {
        let key = [1u8; KEY_LEN];
        let (a, _) = seal(&key, b"same", b"").unwrap();
        let (b, _) = seal(&key, b"same", b"").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn short_or_foreign_ciphertext_fails() {
        let key = [1u8; KEY_LEN];
        let nonce = [0u8; NONCE_LEN];
        assert!(open(&key, &nonce, &[0u8; 10], b"").unwrap_err().is_decryption());
        assert!(open(&key, &nonce, &[0u8; TAG_LEN + 3], b"").unwrap_err().is_decryption());
    }
}
