//! Registry of every datagram the mail client encrypts.
//!
//! All current datagrams are `0.1.0` and accept any `0.1.*` payload.
//! Bumping a minor version is a wire break and needs a migration path.

use mail_crypto::{DatagramIdentity, JsonDatagram};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const RAW_MIME: &str = "ddl://mail/RawMimeDatagram";
pub const ATTACHMENT: &str = "ddl://mail/AttachmentDatagram";
pub const ATTACHMENT_METADATA: &str = "ddl://mail/AttachmentMetadataDatagram";
pub const MAIL_SUBJECT: &str = "ddl://mail/MailSubjectDatagram";
pub const MAIL_TEXT: &str = "ddl://mail/MailTextDatagram";
pub const MAIL_HTML: &str = "ddl://mail/MailHTMLDatagram";
pub const MAIL_TEXT_AS_HTML: &str = "ddl://mail/MailTextAsHTMLDatagram";
pub const DRAFT_CONTENT: &str = "ddl://mail/DraftContentDatagram";
pub const PRIVATE_KEYS: &str = "ddl://mail/PrivateKeysDatagram";

fn identity(datagram_type: &str) -> DatagramIdentity {
    DatagramIdentity::minor_series(datagram_type, 0, 1, 0)
}

/// Header shared by datagrams that carry nothing outside the body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyHeader {}

// ── Bodies ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMimeBody {
    pub mime: String,
}

/// Attachment bytes, base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentBody {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMetadataBody {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    /// BLAKE3 hex digest of the plaintext content.
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSubjectBody {
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailTextBody {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailHtmlBody {
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailTextAsHtmlBody {
    pub text_as_html: String,
}

/// Unsent draft, encrypted to the author only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftContentBody {
    pub subject: String,
    pub text: String,
    pub html: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
}

/// Private key halves, base64. Only ever serialized inside an envelope.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct PrivateKeysBody {
    pub private_key: String,
    pub signing_private_key: String,
}

impl std::fmt::Debug for PrivateKeysBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKeysBody(..)")
    }
}

// ── Datagrams ────────────────────────────────────────────────────────────────

pub type RawMimeDatagram = JsonDatagram<EmptyHeader, RawMimeBody>;
pub type AttachmentDatagram = JsonDatagram<EmptyHeader, AttachmentBody>;
pub type AttachmentMetadataDatagram = JsonDatagram<EmptyHeader, AttachmentMetadataBody>;
pub type MailSubjectDatagram = JsonDatagram<EmptyHeader, MailSubjectBody>;
pub type MailTextDatagram = JsonDatagram<EmptyHeader, MailTextBody>;
pub type MailHtmlDatagram = JsonDatagram<EmptyHeader, MailHtmlBody>;
pub type MailTextAsHtmlDatagram = JsonDatagram<EmptyHeader, MailTextAsHtmlBody>;
pub type DraftContentDatagram = JsonDatagram<EmptyHeader, DraftContentBody>;
pub type PrivateKeysDatagram = JsonDatagram<EmptyHeader, PrivateKeysBody>;

pub fn raw_mime() -> RawMimeDatagram {
    JsonDatagram::new(identity(RAW_MIME))
}

pub fn attachment() -> AttachmentDatagram {
    JsonDatagram::new(identity(ATTACHMENT))
}

pub fn attachment_metadata() -> AttachmentMetadataDatagram {
    JsonDatagram::new(identity(ATTACHMENT_METADATA))
}

pub fn mail_subject() -> MailSubjectDatagram {
    JsonDatagram::new(identity(MAIL_SUBJECT))
}

pub fn mail_text() -> MailTextDatagram {
    JsonDatagram::new(identity(MAIL_TEXT))
}

pub fn mail_html() -> MailHtmlDatagram {
    JsonDatagram::new(identity(MAIL_HTML))
}

pub fn mail_text_as_html() -> MailTextAsHtmlDatagram {
    JsonDatagram::new(identity(MAIL_TEXT_AS_HTML))
}

pub fn draft_content() -> DraftContentDatagram {
    JsonDatagram::new(identity(DRAFT_CONTENT))
}

pub fn private_keys() -> PrivateKeysDatagram {
    JsonDatagram::new(identity(PRIVATE_KEYS))
}

/// Identities of every registered datagram.
pub fn registry() -> Vec<DatagramIdentity> {
    [
        RAW_MIME,
        ATTACHMENT,
        ATTACHMENT_METADATA,
        MAIL_SUBJECT,
        MAIL_TEXT,
        MAIL_HTML,
        MAIL_TEXT_AS_HTML,
        DRAFT_CONTENT,
        PRIVATE_KEYS,
    ]
    .into_iter()
    .map(identity)
    .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use mail_crypto::{CryptoError, Datagram, SessionKey};

    use super::*;

    #[test]
    fn type_strings_are_unique() {
        let ids = registry();
        let unique: HashSet<_> = ids.iter().map(|id| id.datagram_type.clone()).collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn constructors_match_registry() {
        let ids = registry();
        for id in [
            mail_subject().identity().clone(),
            mail_text_as_html().identity().clone(),
            private_keys().identity().clone(),
        ] {
            assert!(ids.contains(&id));
        }
    }

    #[test]
    fn text_and_html_are_not_interchangeable() {
        let sbox = SessionKey::generate().tagged_box();
        let ct = sbox
            .encrypt(
                &mail_text(),
                &EmptyHeader::default(),
                &MailTextBody { text: "hi".into() },
            )
            .unwrap();
        assert!(matches!(
            sbox.decrypt(&mail_html(), &ct),
            Err(CryptoError::TypeConfusion { .. })
        ));
    }

    #[test]
    fn draft_roundtrip() {
        let sbox = SessionKey::generate().tagged_box();
        let draft = DraftContentBody {
            subject: "plans".into(),
            text: "tbd".into(),
            to: vec!["bob@example.com".into()],
            ..Default::default()
        };
        let ct = sbox.encrypt(&draft_content(), &EmptyHeader::default(), &draft).unwrap();
        assert_eq!(sbox.decrypt(&draft_content(), &ct).unwrap().body, draft);
    }

    #[test]
    fn metadata_wire_names_are_camel_case() {
        let meta = AttachmentMetadataBody {
            filename: "a.txt".into(),
            content_type: "text/plain".into(),
            size: 1,
            checksum: "00".into(),
            content_id: None,
            inline: false,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["contentType"], "text/plain");
        assert!(json.get("contentId").is_none());
    }
}
