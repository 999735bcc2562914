//! Outgoing message encryption and the matching recipient-side open.
//!
//! One fresh session key per message. Every content field and attachment is
//! sealed under it with its own datagram; the session key is then boxed to
//! each recipient that has a public key, to the sender, and once to the
//! external delivery service if any recipient has no key.
//!
//! Composition walks a fixed sequence of states:
//!
//!   Drafting -> EncryptingBody -> ResolvingRecipientKeys
//!            -> WrappingSessionKeys -> ReadyToSend
//!
//! A failed key lookup only removes that recipient; any crypto failure
//! aborts the whole message.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use mail_crypto::{
    asymmetric, codec, DecryptCache, EncryptionKeypair, EncryptionPublicKey, SessionKey,
    TaggedSecretBox,
};
use tracing::{debug, info, warn};

use crate::{
    api::{AddressRequest, AttachmentRequest, RecipientKeyEntry, SendEmailRequest},
    datagrams::{
        self, AttachmentBody, AttachmentMetadataBody, EmptyHeader, MailHtmlBody, MailSubjectBody,
        MailTextAsHtmlBody, MailTextBody,
    },
    error::{ComposeError, KeyResolutionError},
    settings::ComposeSettings,
};

// ── Key directory ────────────────────────────────────────────────────────────

/// Looks up recipients' encryption keys.
#[async_trait]
pub trait PublicKeyResolver: Send + Sync {
    /// `Ok(None)` means the address has no key and is delivered externally.
    async fn resolve(
        &self,
        address: &str,
    ) -> Result<Option<EncryptionPublicKey>, KeyResolutionError>;
}

// ── Composition state ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeState {
    Drafting,
    EncryptingBody,
    ResolvingRecipientKeys,
    WrappingSessionKeys,
    ReadyToSend,
}

impl ComposeState {
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Drafting => Some(Self::EncryptingBody),
            Self::EncryptingBody => Some(Self::ResolvingRecipientKeys),
            Self::ResolvingRecipientKeys => Some(Self::WrappingSessionKeys),
            Self::WrappingSessionKeys => Some(Self::ReadyToSend),
            Self::ReadyToSend => None,
        }
    }
}

struct Progress(ComposeState);

impl Progress {
    fn advance(&mut self) -> Result<(), ComposeError> {
        let next = self
            .0
            .next()
            .ok_or_else(|| ComposeError::Assertion("compose already finished".into()))?;
        debug!(target: "mail_proto", event = "compose_state", from = ?self.0, to = ?next);
        self.0 = next;
        Ok(())
    }
}

// ── Input / output ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
    pub content_id: Option<String>,
    pub inline: bool,
}

impl OutgoingAttachment {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            content,
            content_id: None,
            inline: false,
        }
    }
}

/// Plaintext message as the user composed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: AddressRequest,
    pub to: Vec<AddressRequest>,
    pub cc: Vec<AddressRequest>,
    pub bcc: Vec<AddressRequest>,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub text_as_html: String,
    pub attachments: Vec<OutgoingAttachment>,
}

impl OutgoingMessage {
    pub fn new(from: AddressRequest) -> Self {
        Self {
            from,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: String::new(),
            text: String::new(),
            html: String::new(),
            text_as_html: String::new(),
            attachments: Vec::new(),
        }
    }

    fn recipients(&self) -> impl Iterator<Item = (AddressField, &AddressRequest)> {
        let to = self.to.iter().map(|r| (AddressField::To, r));
        let cc = self.cc.iter().map(|r| (AddressField::Cc, r));
        let bcc = self.bcc.iter().map(|r| (AddressField::Bcc, r));
        to.chain(cc).chain(bcc)
    }

    fn validate(&self) -> Result<(), ComposeError> {
        if self.from.address.trim().is_empty() {
            return Err(ComposeError::Assertion("sender address is empty".into()));
        }
        if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
            return Err(ComposeError::Assertion("message has no recipients".into()));
        }
        if let Some((field, _)) = self.recipients().find(|(_, r)| r.address.trim().is_empty()) {
            return Err(ComposeError::Assertion(format!("empty address in {field:?}")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressField {
    To,
    Cc,
    Bcc,
}

/// A recipient left out of the request because its key could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientFailure {
    pub field: AddressField,
    pub recipient: AddressRequest,
    pub error: KeyResolutionError,
}

#[derive(Debug, Clone)]
pub struct EncryptedMessage {
    pub request: SendEmailRequest,
    pub failures: Vec<RecipientFailure>,
}

impl EncryptedMessage {
    /// True when every requested recipient made it into the request.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

struct SealedContent {
    subject: String,
    text: String,
    html: String,
    text_as_html: String,
    attachments: Vec<AttachmentRequest>,
}

// ── Encryptor ────────────────────────────────────────────────────────────────

pub struct MessageEncryptor<R> {
    resolver: R,
    external_service_key: Option<EncryptionPublicKey>,
    resolve_timeout: Duration,
}

impl<R: PublicKeyResolver> MessageEncryptor<R> {
    pub fn new(resolver: R, settings: &ComposeSettings) -> Result<Self, ComposeError> {
        Ok(Self {
            resolver,
            external_service_key: settings.external_service_key()?,
            resolve_timeout: settings.resolve_timeout(),
        })
    }

    pub async fn encrypt_message(
        &self,
        sender: &EncryptionKeypair,
        message: &OutgoingMessage,
    ) -> Result<EncryptedMessage, ComposeError> {
        let mut progress = Progress(ComposeState::Drafting);
        message.validate()?;

        progress.advance()?;
        let session_key = SessionKey::generate();
        let content = seal_content(&session_key.tagged_box(), message)?;

        progress.advance()?;
        let targets: Vec<_> = message.recipients().collect();
        let resolved = self.resolve_all(&targets).await;

        progress.advance()?;
        let mut request = SendEmailRequest {
            from: RecipientKeyEntry {
                recipient: message.from.clone(),
                encrypted_session_key: Some(asymmetric::encrypt_session_key(
                    &session_key,
                    sender,
                    &sender.public,
                )?),
            },
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            attachments: content.attachments,
            encrypted_subject: content.subject,
            encrypted_text: content.text,
            encrypted_html: content.html,
            encrypted_text_as_html: content.text_as_html,
            external_encrypted_session_key: None,
            raw_subject: None,
        };
        let mut failures = Vec::new();
        let mut external = 0usize;

        for ((field, recipient), outcome) in targets.into_iter().zip(resolved) {
            let encrypted_session_key = match outcome {
                Ok(Some(public)) => Some(asymmetric::encrypt_session_key(
                    &session_key,
                    sender,
                    &public,
                )?),
                Ok(None) => {
                    external += 1;
                    None
                }
                Err(error) => {
                    warn!(
                        target: "mail_proto",
                        event = "recipient_key_unresolved",
                        field = ?field,
                        error = %error,
                    );
                    failures.push(RecipientFailure {
                        field,
                        recipient: recipient.clone(),
                        error,
                    });
                    continue;
                }
            };
            let entry = RecipientKeyEntry {
                recipient: recipient.clone(),
                encrypted_session_key,
            };
            match field {
                AddressField::To => request.to.push(entry),
                AddressField::Cc => request.cc.push(entry),
                AddressField::Bcc => request.bcc.push(entry),
            }
        }

        if external > 0 {
            let service = self.external_service_key.as_ref().ok_or_else(|| {
                ComposeError::Assertion(
                    "message has external recipients but no external service key is configured"
                        .into(),
                )
            })?;
            request.external_encrypted_session_key = Some(asymmetric::encrypt_session_key(
                &session_key,
                sender,
                service,
            )?);
        }

        progress.advance()?;
        info!(
            target: "mail_proto",
            event = "message_encrypted",
            recipients = request.to.len() + request.cc.len() + request.bcc.len(),
            external,
            failed = failures.len(),
            attachments = request.attachments.len(),
        );
        Ok(EncryptedMessage { request, failures })
    }

    async fn resolve_all(
        &self,
        targets: &[(AddressField, &AddressRequest)],
    ) -> Vec<Result<Option<EncryptionPublicKey>, KeyResolutionError>> {
        let lookups = targets.iter().map(|(_, recipient)| async move {
            match tokio::time::timeout(self.resolve_timeout, self.resolver.resolve(&recipient.address))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(KeyResolutionError::Timeout {
                    address: recipient.address.clone(),
                }),
            }
        });
        join_all(lookups).await
    }
}

fn seal_content(sbox: &TaggedSecretBox, message: &OutgoingMessage) -> Result<SealedContent, ComposeError> {
    let header = EmptyHeader::default();
    let subject = sbox.encrypt_b64(
        &datagrams::mail_subject(),
        &header,
        &MailSubjectBody {
            subject: message.subject.clone(),
        },
    )?;
    let text = sbox.encrypt_b64(
        &datagrams::mail_text(),
        &header,
        &MailTextBody {
            text: message.text.clone(),
        },
    )?;
    let html = sbox.encrypt_b64(
        &datagrams::mail_html(),
        &header,
        &MailHtmlBody {
            html: message.html.clone(),
        },
    )?;
    let text_as_html = sbox.encrypt_b64(
        &datagrams::mail_text_as_html(),
        &header,
        &MailTextAsHtmlBody {
            text_as_html: message.text_as_html.clone(),
        },
    )?;
    let attachments = message
        .attachments
        .iter()
        .map(|a| seal_attachment(sbox, a))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SealedContent {
        subject,
        text,
        html,
        text_as_html,
        attachments,
    })
}

fn seal_attachment(
    sbox: &TaggedSecretBox,
    attachment: &OutgoingAttachment,
) -> Result<AttachmentRequest, ComposeError> {
    let header = EmptyHeader::default();
    let metadata = AttachmentMetadataBody {
        filename: attachment.filename.clone(),
        content_type: attachment.content_type.clone(),
        size: attachment.content.len() as u64,
        checksum: blake3::hash(&attachment.content).to_hex().to_string(),
        content_id: attachment.content_id.clone(),
        inline: attachment.inline,
    };
    Ok(AttachmentRequest {
        encrypted_content: sbox.encrypt_b64(
            &datagrams::attachment(),
            &header,
            &AttachmentBody {
                content: codec::base64_encode(&attachment.content),
            },
        )?,
        encrypted_metadata: sbox.encrypt_b64(&datagrams::attachment_metadata(), &header, &metadata)?,
    })
}

// ── Recipient side ───────────────────────────────────────────────────────────

/// Open the session key boxed for `entry` with the recipient's keys.
pub fn open_session_key(
    entry: &RecipientKeyEntry,
    my_keys: &EncryptionKeypair,
    cache: Option<&DecryptCache>,
) -> Result<SessionKey, ComposeError> {
    let wrapped = entry.encrypted_session_key.as_ref().ok_or_else(|| {
        ComposeError::Assertion(format!(
            "no session key was boxed for {}",
            entry.recipient.address
        ))
    })?;
    Ok(asymmetric::decrypt_session_key(wrapped, my_keys, cache)?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedAttachment {
    pub metadata: AttachmentMetadataBody,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedMessage {
    pub subject: String,
    pub text: String,
    pub html: String,
    pub text_as_html: String,
    pub attachments: Vec<DecryptedAttachment>,
}

impl DecryptedMessage {
    pub fn open(request: &SendEmailRequest, session_key: &SessionKey) -> Result<Self, ComposeError> {
        let sbox = session_key.tagged_box();
        Ok(Self {
            subject: sbox
                .decrypt_b64(&datagrams::mail_subject(), &request.encrypted_subject)?
                .body
                .subject,
            text: sbox
                .decrypt_b64(&datagrams::mail_text(), &request.encrypted_text)?
                .body
                .text,
            html: sbox
                .decrypt_b64(&datagrams::mail_html(), &request.encrypted_html)?
                .body
                .html,
            text_as_html: sbox
                .decrypt_b64(&datagrams::mail_text_as_html(), &request.encrypted_text_as_html)?
                .body
                .text_as_html,
            attachments: request
                .attachments
                .iter()
                .map(|a| open_attachment(&sbox, a))
                .collect::<Result<_, _>>()?,
        })
    }
}

fn open_attachment(
    sbox: &TaggedSecretBox,
    attachment: &AttachmentRequest,
) -> Result<DecryptedAttachment, ComposeError> {
    let metadata = sbox
        .decrypt_b64(&datagrams::attachment_metadata(), &attachment.encrypted_metadata)?
        .body;
    let encoded = sbox
        .decrypt_b64(&datagrams::attachment(), &attachment.encrypted_content)?
        .body;
    let content = codec::base64_decode(&encoded.content)?;
    if content.len() as u64 != metadata.size
        || blake3::hash(&content).to_hex().as_str() != metadata.checksum
    {
        return Err(ComposeError::AttachmentMismatch {
            filename: metadata.filename,
        });
    }
    Ok(DecryptedAttachment { metadata, content })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn states_advance_in_order() {
        let mut progress = Progress(ComposeState::Drafting);
        let mut seen = vec![progress.0];
        while progress.0 != ComposeState::ReadyToSend {
            progress.advance().unwrap();
            seen.push(progress.0);
        }
        assert_eq!(
            seen,
            vec![
                ComposeState::Drafting,
                ComposeState::EncryptingBody,
                ComposeState::ResolvingRecipientKeys,
                ComposeState::WrappingSessionKeys,
                ComposeState::ReadyToSend,
            ]
        );
        assert!(progress.advance().is_err());
    }

    #[test]
    fn validation_rejects_bad_addresses() {
        let mut message = OutgoingMessage::new(AddressRequest::new("alice@example.com"));
        assert!(matches!(message.validate(), Err(ComposeError::Assertion(_))));

        message.cc.push(AddressRequest::new("  "));
        assert!(message.validate().is_err());

        message.cc[0] = AddressRequest::new("bob@example.com");
        assert!(message.validate().is_ok());

        message.from = AddressRequest::new("");
        assert!(message.validate().is_err());
    }

    #[test]
    fn attachment_checksum_is_enforced() {
        let sk = SessionKey::generate();
        let sbox = sk.tagged_box();
        let original = OutgoingAttachment::new("a.txt", "text/plain", b"first".to_vec());
        let other = OutgoingAttachment::new("a.txt", "text/plain", b"other".to_vec());

        let sealed = seal_attachment(&sbox, &original).unwrap();
        let opened = open_attachment(&sbox, &sealed).unwrap();
        assert_eq!(opened.content, b"first");
        assert_eq!(opened.metadata.size, 5);

        let mixed = AttachmentRequest {
            encrypted_content: seal_attachment(&sbox, &other).unwrap().encrypted_content,
            encrypted_metadata: sealed.encrypted_metadata,
        };
        assert!(matches!(
            open_attachment(&sbox, &mixed),
            Err(ComposeError::AttachmentMismatch { ref filename }) if filename == "a.txt"
        ));
    }

    #[test]
    fn session_key_missing_for_external_entry() {
        let entry = RecipientKeyEntry {
            recipient: AddressRequest::new("carol@elsewhere.org"),
            encrypted_session_key: None,
        };
        let keys = EncryptionKeypair::generate();
        assert!(matches!(
            open_session_key(&entry, &keys, None),
            Err(ComposeError::Assertion(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]
        #[test]
        fn attachments_of_any_content(content in prop::collection::vec(any::<u8>(), 0..2048)) {
            let sbox = SessionKey::generate().tagged_box();
            let attachment = OutgoingAttachment::new("blob.bin", "application/octet-stream", content.clone());
            let opened = open_attachment(&sbox, &seal_attachment(&sbox, &attachment).unwrap()).unwrap();
            prop_assert_eq!(opened.content, content);
        }
    }
}
