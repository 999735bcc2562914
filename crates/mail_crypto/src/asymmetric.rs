//! Hybrid encryption: X25519 + XSalsa20-Poly1305 box.
//!
//! Output of [`encrypt_asymmetric`] is base64(`nonce (24) || ciphertext + tag`).
//! A fresh nonce is drawn from the OS RNG on every call.

use crypto_box::{
    aead::{Aead, AeadCore, OsRng},
    PublicKey, SalsaBox, SecretKey,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::{
    cache::DecryptCache,
    codec,
    error::CryptoError,
    session_key::SessionKey,
};

pub const PUBLIC_KEY_LEN: usize = 32;
const BOX_NONCE_LEN: usize = 24;
const BOX_TAG_LEN: usize = 16;

// ── Keys ─────────────────────────────────────────────────────────────────────

/// 32-byte X25519 public key, base64 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncryptionPublicKey([u8; PUBLIC_KEY_LEN]);

impl EncryptionPublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub fn to_b64(&self) -> String {
        codec::base64_encode(&self.0)
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        Ok(Self(codec::base64_decode_32(s)?))
    }

    pub fn to_wire(&self) -> WirePublicKey {
        WirePublicKey { key: self.to_b64() }
    }

    fn to_box_key(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

/// Encryption keypair. The secret half is zeroized on drop by `crypto_box`.
pub struct EncryptionKeypair {
    pub public: EncryptionPublicKey,
    secret: SecretKey,
}

impl EncryptionKeypair {
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::generate(&mut OsRng))
    }

    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self::from_secret(SecretKey::from(bytes))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public = EncryptionPublicKey(*secret.public_key().as_bytes());
        Self { public, secret }
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.to_bytes())
    }
}

impl std::fmt::Debug for EncryptionKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKeypair")
            .field("public", &self.public.to_b64())
            .finish_non_exhaustive()
    }
}

// ── Box encrypt / decrypt ────────────────────────────────────────────────────

pub fn encrypt_asymmetric(
    my_keys: &EncryptionKeypair,
    their_public: &EncryptionPublicKey,
    plaintext: &[u8],
) -> Result<String, CryptoError> {
    let salsa_box = SalsaBox::new(&their_public.to_box_key(), &my_keys.secret);
    let nonce = SalsaBox::generate_nonce(&mut OsRng);
    let ciphertext = salsa_box
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::Encryption)?;

    let mut out = Vec::with_capacity(BOX_NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(codec::base64_encode(&out))
}

pub fn decrypt_asymmetric(
    my_keys: &EncryptionKeypair,
    their_public: &EncryptionPublicKey,
    payload: &str,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let data = codec::base64_decode(payload).map_err(|_| CryptoError::Decryption)?;
    if data.len() < BOX_NONCE_LEN + BOX_TAG_LEN {
        return Err(CryptoError::Decryption);
    }
    let (nonce, ciphertext) = data.split_at(BOX_NONCE_LEN);
    let salsa_box = SalsaBox::new(&their_public.to_box_key(), &my_keys.secret);
    let plaintext = salsa_box
        .decrypt(crypto_box::Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Decryption)?;
    Ok(Zeroizing::new(plaintext))
}

/// [`decrypt_asymmetric`] memoized through an optional caller-owned cache.
/// Failures are never cached.
pub fn decrypt_asymmetric_cached(
    cache: Option<&DecryptCache>,
    my_keys: &EncryptionKeypair,
    their_public: &EncryptionPublicKey,
    payload: &str,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let Some(cache) = cache else {
        return decrypt_asymmetric(my_keys, their_public, payload);
    };
    let key = DecryptCache::key(&my_keys.secret_bytes(), their_public.as_bytes(), payload);
    if let Some(hit) = cache.get(&key) {
        debug!(target: "mail_crypto", event = "decrypt_cache_hit");
        return Ok(hit);
    }
    let plaintext = decrypt_asymmetric(my_keys, their_public, payload)?;
    cache.insert(key, &plaintext);
    Ok(plaintext)
}

// ── Session key wrapping ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePublicKey {
    /// Base64 X25519 public key.
    pub key: String,
}

/// A session key boxed to one recipient, tagged with the encrypting party's
/// public key so the recipient knows which key to open it with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedSessionKey {
    pub encrypted_key: String,
    pub encrypted_by: WirePublicKey,
}

pub fn encrypt_session_key(
    session_key: &SessionKey,
    my_keys: &EncryptionKeypair,
    their_public: &EncryptionPublicKey,
) -> Result<EncryptedSessionKey, CryptoError> {
    Ok(EncryptedSessionKey {
        encrypted_key: encrypt_asymmetric(my_keys, their_public, session_key.as_bytes())?,
        encrypted_by: my_keys.public.to_wire(),
    })
}

pub fn decrypt_session_key(
    encrypted: &EncryptedSessionKey,
    my_keys: &EncryptionKeypair,
    cache: Option<&DecryptCache>,
) -> Result<SessionKey, CryptoError> {
    let sender = EncryptionPublicKey::from_b64(&encrypted.encrypted_by.key)?;
    let raw = decrypt_asymmetric_cached(cache, my_keys, &sender, &encrypted.encrypted_key)?;
    SessionKey::from_slice(&raw).map_err(|_| CryptoError::Decryption)
}
