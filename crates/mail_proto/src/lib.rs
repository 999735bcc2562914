//! mail_proto — Datagrams, wire types and message orchestration for end-to-end mail
//!
//! Everything that leaves the client is either ciphertext produced under a
//! registered datagram or a session key boxed to one public key.
//!
//! # Modules
//! - `datagrams` — Registry of every typed, versioned payload
//! - `api`       — Send request shared between client and mail service
//! - `compose`   — Outgoing message encryption and recipient-side open
//! - `account`   — Password-derived secrets and private key storage
//! - `settings`  — Compose-time configuration
//! - `error`     — Compose and key resolution errors

pub mod account;
pub mod api;
pub mod compose;
pub mod datagrams;
pub mod error;
pub mod settings;

pub use account::{AccountSecrets, SignedPublicKeys, UserKeys};
pub use api::{AddressRequest, AttachmentRequest, RecipientKeyEntry, SendEmailRequest};
pub use compose::{
    ComposeState, DecryptedMessage, EncryptedMessage, MessageEncryptor, OutgoingAttachment,
    OutgoingMessage, PublicKeyResolver,
};
pub use error::{ComposeError, KeyResolutionError};
pub use settings::ComposeSettings;
