//! mail_crypto — end-to-end mail encryption primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Decryption failures are a single opaque error (no oracle).
//!
//! # Module layout
//! - `codec`        — UTF-8 and base64 conversions
//! - `aead`         — XChaCha20-Poly1305 encrypt/decrypt helpers
//! - `datagram`     — versioned header/body identities and serializers
//! - `tagged_box`   — datagram envelope with type/version bound as AAD
//! - `session_key`  — per-message symmetric key
//! - `asymmetric`   — X25519 box for wrapping session keys
//! - `cache`        — optional caller-owned decrypt memoization
//! - `kdf`          — Argon2id stretching / HKDF purpose-scoped subkeys
//! - `signature`    — context-bound Ed25519 signatures
//! - `mnemonic`     — word encoding with rolling checksum, verification phrases
//! - `error`        — unified error type

pub mod aead;
pub mod asymmetric;
pub mod cache;
pub mod codec;
pub mod datagram;
pub mod error;
pub mod kdf;
pub mod mnemonic;
pub mod session_key;
pub mod signature;
pub mod tagged_box;

pub use asymmetric::{EncryptedSessionKey, EncryptionKeypair, EncryptionPublicKey, WirePublicKey};
pub use cache::DecryptCache;
pub use datagram::{AadMeta, Datagram, DatagramIdentity, JsonDatagram};
pub use error::{ChecksumError, CryptoError};
pub use session_key::SessionKey;
pub use signature::{SignatureContext, SigningKeypair, SigningPublicKey};
pub use tagged_box::{Decrypted, TaggedSecretBox};
