//! Context-bound Ed25519 signatures.
//!
//! The signed bytes are the canonical JSON array
//! `[context, additional_context | "NO_CONTEXT", message]`, so a signature made
//! for one context never verifies under another.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::ZeroizeOnDrop;

use crate::{codec, error::CryptoError};

pub const NO_CONTEXT: &str = "NO_CONTEXT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureContext {
    SessionKey,
    EmailContent,
    UserPublicKey,
}

impl SignatureContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionKey => "SESSION_KEY",
            Self::EmailContent => "EMAIL_CONTENT",
            Self::UserPublicKey => "USER_PUBLIC_KEY",
        }
    }
}

/// 32-byte Ed25519 verifying key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SigningPublicKey([u8; 32]);

impl SigningPublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_b64(&self) -> String {
        codec::base64_encode(&self.0)
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        Ok(Self(codec::base64_decode_32(s)?))
    }
}

/// Ed25519 signing keypair. Secret bytes are zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct SigningKeypair {
    #[zeroize(skip)]
    pub public: SigningPublicKey,
    secret_bytes: [u8; 32],
}

impl SigningKeypair {
    pub fn generate() -> Self {
        Self::from_secret_bytes(SigningKey::generate(&mut OsRng).to_bytes())
    }

    pub fn from_secret_bytes(secret_bytes: [u8; 32]) -> Self {
        let public = SigningPublicKey(SigningKey::from_bytes(&secret_bytes).verifying_key().to_bytes());
        Self {
            public,
            secret_bytes,
        }
    }

    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret_bytes
    }
}

impl std::fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeypair")
            .field("public", &self.public.to_b64())
            .finish_non_exhaustive()
    }
}

fn canonical_bytes(
    message: &str,
    context: SignatureContext,
    additional_context: Option<&str>,
) -> Result<Vec<u8>, CryptoError> {
    let tuple = [
        context.as_str(),
        additional_context.unwrap_or(NO_CONTEXT),
        message,
    ];
    Ok(serde_json::to_vec(&tuple)?)
}

/// Sign `message` under `context`; returns a base64 64-byte signature.
pub fn sign(
    message: &str,
    keys: &SigningKeypair,
    context: SignatureContext,
    additional_context: Option<&str>,
) -> Result<String, CryptoError> {
    let bytes = canonical_bytes(message, context, additional_context)?;
    let signature = SigningKey::from_bytes(&keys.secret_bytes).sign(&bytes);
    Ok(codec::base64_encode(&signature.to_bytes()))
}

/// Malformed keys or signatures verify as `false`.
pub fn verify(
    message: &str,
    signature: &str,
    public: &SigningPublicKey,
    context: SignatureContext,
    additional_context: Option<&str>,
) -> bool {
    let Ok(bytes) = canonical_bytes(message, context, additional_context) else {
        return false;
    };
    let Ok(vk) = VerifyingKey::from_bytes(&public.0) else {
        return false;
    };
    let Ok(sig_bytes) = codec::base64_decode(signature) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
        return false;
    };
    vk.verify_strict(&bytes, &Signature::from_bytes(&sig_bytes)).is_ok()
}
