//! Reversible byte <-> word encoding with a rolling 3-bit checksum.
//!
//! Encoding prepends a zero byte and slides an 11-bit window over every
//! adjacent byte pair: word `i` indexes `((p[i] << 8) | p[i + 1]) % 2048` in
//! the BIP39 English list. Each word therefore carries one data byte in its
//! low 8 bits and the low 3 bits of the previous byte in its high 3 bits.
//! Decoding walks backwards and checks every carry; the first word's carry
//! must be zero.
//!
//! Only 3 bits link neighbouring words, so a single substituted word whose
//! low 3 bits and carry happen to match goes unnoticed (31 of the 2047
//! alternatives at any position), and the last word is never cross-checked.
//! Verification phrases append a derived checksum byte to cover that.

use bip39::Language;

use crate::{
    error::{ChecksumError, CryptoError},
    kdf::{self, KeyPurpose},
    signature::SigningPublicKey,
};

const WORD_MASK: u16 = 0x07FF;

/// The shared, immutable 2048-word dictionary.
pub fn wordlist() -> &'static [&'static str; 2048] {
    Language::English.word_list()
}

fn word_index(word: &str) -> Result<u16, CryptoError> {
    Language::English
        .find_word(&word.to_lowercase())
        .ok_or_else(|| CryptoError::UnknownWord(word.to_string()))
}

/// Encode `bytes` as one word per byte.
pub fn encode(bytes: &[u8]) -> Vec<&'static str> {
    let list = wordlist();
    let mut prev = 0u8;
    bytes
        .iter()
        .map(|&b| {
            let index = ((u16::from(prev) << 8) | u16::from(b)) & WORD_MASK;
            prev = b;
            list[usize::from(index)]
        })
        .collect()
}

/// Inverse of [`encode`]. Words are matched case-insensitively.
pub fn decode<S: AsRef<str>>(words: &[S]) -> Result<Vec<u8>, CryptoError> {
    let indices = words
        .iter()
        .map(|w| word_index(w.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = vec![0u8; indices.len()];
    for i in (0..indices.len()).rev() {
        let index = indices[i];
        out[i] = (index & 0xFF) as u8;
        let carry = (index >> 8) as u8;
        if i == 0 {
            if carry != 0 {
                return Err(ChecksumError::Leading.into());
            }
        } else if carry != (indices[i - 1] & 0x07) as u8 {
            return Err(ChecksumError::Intermediate { position: i }.into());
        }
    }
    Ok(out)
}

pub fn encode_phrase(bytes: &[u8]) -> String {
    encode(bytes).join(" ")
}

/// Decode a whitespace-separated phrase.
pub fn decode_phrase(phrase: &str) -> Result<Vec<u8>, CryptoError> {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    decode(&words)
}

// ── Signing key verification phrases ─────────────────────────────────────────

fn key_checksum(public: &SigningPublicKey) -> Result<u8, CryptoError> {
    let digest = kdf::derive_subkey(
        public.as_bytes(),
        &[],
        KeyPurpose::SigningKeyVerificationNumber,
    )?;
    Ok(digest[0])
}

/// Phrase for reading a signing key aloud: `pubkey || checksum byte`, 33 words.
pub fn verification_phrase(public: &SigningPublicKey) -> Result<String, CryptoError> {
    let mut bytes = public.as_bytes().to_vec();
    bytes.push(key_checksum(public)?);
    Ok(encode_phrase(&bytes))
}

/// Decode a verification phrase back into the signing key it names.
pub fn verify_phrase(phrase: &str) -> Result<SigningPublicKey, CryptoError> {
    let bytes = decode_phrase(phrase)?;
    let (key_bytes, checksum) = match bytes.as_slice() {
        [key @ .., checksum] if key.len() == 32 => (key, *checksum),
        _ => {
            return Err(CryptoError::InvalidKey(format!(
                "verification phrase must have 33 words, got {}",
                bytes.len()
            )))
        }
    };
    let mut key = [0u8; 32];
    key.copy_from_slice(key_bytes);
    let public = SigningPublicKey::from_bytes(key);
    if key_checksum(&public)? != checksum {
        return Err(ChecksumError::Digest.into());
    }
    Ok(public)
}
