//! Send request shared between the composing client and the mail service.
//! These map directly to JSON bodies on the wire.

use mail_crypto::EncryptedSessionKey;
use serde::{Deserialize, Serialize};

// ── Addresses ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRequest {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AddressRequest {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    pub fn named(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
        }
    }
}

/// An address plus the session key boxed for it. Recipients without their
/// own key travel with `encrypted_session_key: None` and are covered by
/// [`SendEmailRequest::external_encrypted_session_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientKeyEntry {
    #[serde(flatten)]
    pub recipient: AddressRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_session_key: Option<EncryptedSessionKey>,
}

// ── Content ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRequest {
    /// Base64 envelope of the attachment bytes.
    pub encrypted_content: String,
    /// Base64 envelope of the attachment metadata.
    pub encrypted_metadata: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    pub from: RecipientKeyEntry,
    #[serde(default)]
    pub to: Vec<RecipientKeyEntry>,
    #[serde(default)]
    pub cc: Vec<RecipientKeyEntry>,
    #[serde(default)]
    pub bcc: Vec<RecipientKeyEntry>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRequest>,
    pub encrypted_subject: String,
    pub encrypted_text: String,
    pub encrypted_html: String,
    pub encrypted_text_as_html: String,
    /// Session key boxed to the external delivery service. Present exactly
    /// when some entry has no key of its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_encrypted_session_key: Option<EncryptedSessionKey>,
    /// Plaintext subject for notification previews. Never filled in by the
    /// encryptor; callers opt in with [`SendEmailRequest::with_raw_subject`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_subject: Option<String>,
}

impl SendEmailRequest {
    pub fn with_raw_subject(mut self, subject: impl Into<String>) -> Self {
        self.raw_subject = Some(subject.into());
        self
    }

    /// Every entry in `from`, `to`, `cc`, `bcc` order.
    pub fn entries(&self) -> impl Iterator<Item = &RecipientKeyEntry> {
        std::iter::once(&self.from)
            .chain(&self.to)
            .chain(&self.cc)
            .chain(&self.bcc)
    }

    /// First entry addressed to `address`, compared case-insensitively.
    pub fn entry_for(&self, address: &str) -> Option<&RecipientKeyEntry> {
        self.entries()
            .find(|e| e.recipient.address.eq_ignore_ascii_case(address))
    }

    pub fn has_external_recipients(&self) -> bool {
        self.entries().any(|e| e.encrypted_session_key.is_none())
    }
}
