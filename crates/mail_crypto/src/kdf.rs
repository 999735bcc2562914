//! Key derivation functions
//!
//! `stretch_secret` — Argon2id, turns a user password into a 32-byte master
//!   secret. The salt is per account and stored alongside (not secret).
//!
//! `derive_subkey` — HKDF-SHA256, derives purpose-scoped 32-byte subkeys
//!   (login key, private-key wrapping secret, verification checksum) from a
//!   master secret. Same inputs always give the same key; a different
//!   purpose gives an unrelated key.

use std::time::Duration;

use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{codec, error::CryptoError};

pub const DERIVED_KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 16;

// ── Argon2id ─────────────────────────────────────────────────────────────────

/// Argon2id cost parameters. Output length is always 32 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// Interactive desktop profile: 64 MiB, 3 passes, 1 lane.
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    fn to_argon2(self) -> Result<Params, CryptoError> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(DERIVED_KEY_LEN),
        )
        .map_err(|e| CryptoError::KeyDerivation(format!("argon2 params: {e}")))
    }
}

pub fn stretch_secret(
    secret: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; DERIVED_KEY_LEN]>, CryptoError> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);
    let mut output = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    argon2
        .hash_password_into(secret, salt, &mut output[..])
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(output)
}

/// Run [`stretch_secret`] on the blocking pool so async callers stay
/// responsive. Exceeding `timeout` is reported as a derivation failure; the
/// underlying computation is not cancelled.
pub async fn stretch_secret_blocking(
    secret: Zeroizing<Vec<u8>>,
    salt: Vec<u8>,
    params: KdfParams,
    timeout: Duration,
) -> Result<Zeroizing<[u8; DERIVED_KEY_LEN]>, CryptoError> {
    let task = tokio::task::spawn_blocking(move || stretch_secret(&secret, &salt, &params));
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(CryptoError::KeyDerivation(format!("argon2 task failed: {join}"))),
        Err(_) => Err(CryptoError::KeyDerivation(format!(
            "argon2 exceeded {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Fresh random salt; generate once per account and store it.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

// ── HKDF-SHA256 ──────────────────────────────────────────────────────────────

/// Closed set of HKDF `info` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    Login,
    PrivateKeys,
    SigningKeyVerificationNumber,
}

impl KeyPurpose {
    pub fn as_info(&self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::PrivateKeys => "PRIVATE_KEYS",
            Self::SigningKeyVerificationNumber => "SIGNING_KEY_VERIFICATION_NUMBER",
        }
    }
}

/// Text encoding for subkeys handed to string-based consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubkeyEncoding {
    /// Lowercase hex, e.g. for SRP verifiers.
    Hex,
    Base64,
}

pub fn derive_subkey(
    master_secret: &[u8],
    salt: &[u8],
    purpose: KeyPurpose,
) -> Result<Zeroizing<[u8; DERIVED_KEY_LEN]>, CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), master_secret);
    let mut out = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    hk.expand(purpose.as_info().as_bytes(), &mut out[..])
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(out)
}

pub fn derive_subkey_encoded(
    master_secret: &[u8],
    salt: &[u8],
    purpose: KeyPurpose,
    encoding: SubkeyEncoding,
) -> Result<Zeroizing<String>, CryptoError> {
    let key = derive_subkey(master_secret, salt, purpose)?;
    Ok(Zeroizing::new(match encoding {
        SubkeyEncoding::Hex => hex::encode(&key[..]),
        SubkeyEncoding::Base64 => codec::base64_encode(&key[..]),
    }))
}
