use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// AEAD or box authentication failed. Deliberately carries no detail so
    /// "wrong key" and "tampered data" look identical to the caller.
    #[error("Decryption failed")]
    Decryption,

    #[error("Encryption failed")]
    Encryption,

    #[error("Datagram {datagram_type} version {found} is outside accepted range {expected}")]
    VersionMismatch {
        datagram_type: String,
        expected: String,
        found: String,
    },

    #[error("Datagram type mismatch: expected {expected}, payload is tagged {found}")]
    TypeConfusion { expected: String, found: String },

    #[error("Mnemonic checksum failure: {0}")]
    Checksum(#[from] ChecksumError),

    #[error("Unknown mnemonic word: {0}")]
    UnknownWord(String),

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Signature error: {0}")]
    Signature(String),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Self-verification failures of the mnemonic codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChecksumError {
    /// Carry bits of word `position` disagree with the low bits of the
    /// preceding word.
    #[error("intermediate checksum mismatch at word {position}")]
    Intermediate { position: usize },

    /// The leading carry did not decode to zero.
    #[error("leading checksum mismatch")]
    Leading,

    /// The derived checksum byte of a verification phrase does not match
    /// the key it accompanies.
    #[error("verification checksum mismatch")]
    Digest,
}

impl CryptoError {
    pub fn is_decryption(&self) -> bool {
        matches!(self, Self::Decryption)
    }
}
