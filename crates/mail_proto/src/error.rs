use mail_crypto::CryptoError;
use thiserror::Error;

/// Terminal failures of composing or opening a message. Any of these aborts
/// the whole operation; per-recipient lookup failures are reported in
/// [`crate::compose::EncryptedMessage::failures`] instead.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Invalid settings: {0}")]
    Settings(String),

    /// An authenticated attachment whose bytes disagree with its metadata.
    #[error("Attachment {filename} does not match its metadata")]
    AttachmentMismatch { filename: String },
}

/// Why one recipient's public key could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyResolutionError {
    #[error("key lookup for {address} failed: {reason}")]
    Lookup { address: String, reason: String },

    #[error("key lookup for {address} timed out")]
    Timeout { address: String },

    #[error("directory returned an invalid key for {address}")]
    InvalidKey { address: String },
}

impl KeyResolutionError {
    pub fn address(&self) -> &str {
        match self {
            Self::Lookup { address, .. } | Self::Timeout { address } | Self::InvalidKey { address } => {
                address
            }
        }
    }
}
