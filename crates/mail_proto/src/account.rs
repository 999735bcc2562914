//! Account key material.
//!
//! A password is stretched once with Argon2id into a master secret. Two
//! HKDF subkeys come out of it: a hex login key handed to the auth service
//! and a wrapping secret that seals the user's private keys for storage.
//! The server never sees either the password or the wrapping secret.

use std::time::Duration;

use mail_crypto::{
    codec,
    error::CryptoError,
    kdf::{self, KdfParams, KeyPurpose, SubkeyEncoding},
    signature::{self, SignatureContext},
    EncryptionKeypair, EncryptionPublicKey, SigningKeypair, SigningPublicKey, TaggedSecretBox,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use zeroize::Zeroizing;

use crate::{
    datagrams::{self, EmptyHeader, PrivateKeysBody},
    error::ComposeError,
    settings::ComposeSettings,
};

/// A user's long-term keypairs.
#[derive(Debug)]
pub struct UserKeys {
    pub encryption: EncryptionKeypair,
    pub signing: SigningKeypair,
}

impl UserKeys {
    pub fn generate() -> Self {
        Self {
            encryption: EncryptionKeypair::generate(),
            signing: SigningKeypair::generate(),
        }
    }

    /// Public halves with the encryption key signed by the signing key.
    pub fn signed_public_keys(&self) -> Result<SignedPublicKeys, ComposeError> {
        let public_key = self.encryption.public.to_b64();
        let signature = signature::sign(
            &public_key,
            &self.signing,
            SignatureContext::UserPublicKey,
            None,
        )?;
        Ok(SignedPublicKeys {
            public_key,
            signing_public_key: self.signing.public.to_b64(),
            signature,
        })
    }
}

/// Published form of a user's keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPublicKeys {
    pub public_key: String,
    pub signing_public_key: String,
    pub signature: String,
}

impl SignedPublicKeys {
    /// Returns the encryption key only if it is signed by `expected_signer`.
    pub fn verify(
        &self,
        expected_signer: &SigningPublicKey,
    ) -> Result<EncryptionPublicKey, ComposeError> {
        let signer = SigningPublicKey::from_b64(&self.signing_public_key)?;
        if &signer != expected_signer {
            return Err(
                CryptoError::Signature("public key signed by an unexpected key".into()).into(),
            );
        }
        if !signature::verify(
            &self.public_key,
            &self.signature,
            &signer,
            SignatureContext::UserPublicKey,
            None,
        ) {
            return Err(
                CryptoError::Signature("public key signature is invalid".into()).into(),
            );
        }
        Ok(EncryptionPublicKey::from_b64(&self.public_key)?)
    }
}

// ── Password-derived secrets ─────────────────────────────────────────────────

/// Master secret stretched from the account password, plus its salt.
pub struct AccountSecrets {
    master: Zeroizing<[u8; kdf::DERIVED_KEY_LEN]>,
    salt: Vec<u8>,
}

impl AccountSecrets {
    pub fn derive(password: &str, salt: &[u8], params: &KdfParams) -> Result<Self, ComposeError> {
        let master = kdf::stretch_secret(password.as_bytes(), salt, params)?;
        Ok(Self {
            master,
            salt: salt.to_vec(),
        })
    }

    /// [`AccountSecrets::derive`] with the configured Argon2id cost.
    pub fn derive_with_settings(
        password: &str,
        salt: &[u8],
        settings: &ComposeSettings,
    ) -> Result<Self, ComposeError> {
        Self::derive(password, salt, &settings.kdf)
    }

    /// [`AccountSecrets::derive`] on the blocking pool.
    pub async fn derive_async(
        password: &str,
        salt: &[u8],
        params: KdfParams,
        timeout: Duration,
    ) -> Result<Self, ComposeError> {
        let secret = Zeroizing::new(password.as_bytes().to_vec());
        let master = kdf::stretch_secret_blocking(secret, salt.to_vec(), params, timeout).await?;
        info!(target: "mail_proto", event = "account_secrets_derived");
        Ok(Self {
            master,
            salt: salt.to_vec(),
        })
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Hex login key for the authentication handshake.
    pub fn login_key(&self) -> Result<Zeroizing<String>, ComposeError> {
        Ok(kdf::derive_subkey_encoded(
            &self.master[..],
            &self.salt,
            KeyPurpose::Login,
            SubkeyEncoding::Hex,
        )?)
    }

    fn wrapping_box(&self) -> Result<TaggedSecretBox, ComposeError> {
        let key = kdf::derive_subkey(&self.master[..], &self.salt, KeyPurpose::PrivateKeys)?;
        Ok(TaggedSecretBox::from_key(&key))
    }
}

impl std::fmt::Debug for AccountSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccountSecrets(..)")
    }
}

// ── Private key storage ──────────────────────────────────────────────────────

/// Seal both private keys for server-side storage. Returns base64.
pub fn wrap_private_keys(keys: &UserKeys, secrets: &AccountSecrets) -> Result<String, ComposeError> {
    let body = PrivateKeysBody {
        private_key: codec::base64_encode(&keys.encryption.secret_bytes()[..]),
        signing_private_key: codec::base64_encode(keys.signing.secret_bytes()),
    };
    Ok(secrets
        .wrapping_box()?
        .encrypt_b64(&datagrams::private_keys(), &EmptyHeader::default(), &body)?)
}

pub fn unwrap_private_keys(wrapped: &str, secrets: &AccountSecrets) -> Result<UserKeys, ComposeError> {
    let opened = secrets
        .wrapping_box()?
        .decrypt_b64(&datagrams::private_keys(), wrapped)?;
    let encryption = Zeroizing::new(codec::base64_decode_32(&opened.body.private_key)?);
    let signing = Zeroizing::new(codec::base64_decode_32(&opened.body.signing_private_key)?);
    Ok(UserKeys {
        encryption: EncryptionKeypair::from_secret_bytes(*encryption),
        signing: SigningKeypair::from_secret_bytes(*signing),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> KdfParams {
        KdfParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn login_key_is_stable_hex() {
        let salt = kdf::generate_salt();
        let a = AccountSecrets::derive("correct horse", &salt, &light()).unwrap();
        let b = AccountSecrets::derive("correct horse", &salt, &light()).unwrap();
        assert_eq!(a.login_key().unwrap(), b.login_key().unwrap());
        assert_eq!(a.login_key().unwrap().len(), 64);
    }

    #[test]
    fn login_key_differs_from_wrapping_key() {
        let secrets = AccountSecrets::derive("pw", &[3u8; 16], &light()).unwrap();
        let wrapping =
            kdf::derive_subkey(&secrets.master[..], secrets.salt(), KeyPurpose::PrivateKeys).unwrap();
        assert_ne!(secrets.login_key().unwrap().as_str(), hex::encode(&wrapping[..]));
    }

    #[test]
    fn configured_kdf_cost_is_used() {
        let salt = [5u8; 16];
        let settings = ComposeSettings::from_json(
            r#"{"kdf": {"memory_kib": 64, "iterations": 1, "parallelism": 1}}"#,
        )
        .unwrap();
        let configured = AccountSecrets::derive_with_settings("pw", &salt, &settings).unwrap();
        let explicit = AccountSecrets::derive("pw", &salt, &light()).unwrap();
        assert_eq!(configured.login_key().unwrap(), explicit.login_key().unwrap());

        let heavier = KdfParams {
            iterations: 2,
            ..light()
        };
        let other = AccountSecrets::derive("pw", &salt, &heavier).unwrap();
        assert_ne!(configured.login_key().unwrap(), other.login_key().unwrap());
    }

    #[test]
    fn private_keys_roundtrip() {
        let keys = UserKeys::generate();
        let secrets = AccountSecrets::derive("pw", &[1u8; 16], &light()).unwrap();
        let wrapped = wrap_private_keys(&keys, &secrets).unwrap();
        let restored = unwrap_private_keys(&wrapped, &secrets).unwrap();
        assert_eq!(restored.encryption.public, keys.encryption.public);
        assert_eq!(restored.signing.public, keys.signing.public);
    }

    #[test]
    fn wrong_password_cannot_unwrap() {
        let keys = UserKeys::generate();
        let secrets = AccountSecrets::derive("pw", &[1u8; 16], &light()).unwrap();
        let wrong = AccountSecrets::derive("pw2", &[1u8; 16], &light()).unwrap();
        let wrapped = wrap_private_keys(&keys, &secrets).unwrap();
        match unwrap_private_keys(&wrapped, &wrong) {
            Err(ComposeError::Crypto(e)) => assert!(e.is_decryption()),
            other => panic!("expected decryption failure, got {other:?}"),
        }
    }

    #[test]
    fn signed_public_keys_verify() {
        let keys = UserKeys::generate();
        let published = keys.signed_public_keys().unwrap();
        assert_eq!(published.verify(&keys.signing.public).unwrap(), keys.encryption.public);
    }

    #[test]
    fn swapped_public_key_is_rejected() {
        let keys = UserKeys::generate();
        let mut published = keys.signed_public_keys().unwrap();
        published.public_key = EncryptionKeypair::generate().public.to_b64();
        assert!(matches!(
            published.verify(&keys.signing.public),
            Err(ComposeError::Crypto(CryptoError::Signature(_)))
        ));
    }

    #[test]
    fn unexpected_signer_is_rejected() {
        let keys = UserKeys::generate();
        let other = UserKeys::generate();
        let published = keys.signed_public_keys().unwrap();
        assert!(matches!(
            published.verify(&other.signing.public),
            Err(ComposeError::Crypto(CryptoError::Signature(_)))
        ));
    }

    #[tokio::test]
    async fn async_derivation_matches_inline() {
        let salt = [9u8; 16];
        let inline = AccountSecrets::derive("pw", &salt, &light()).unwrap();
        let off_thread = AccountSecrets::derive_async("pw", &salt, light(), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(inline.login_key().unwrap(), off_thread.login_key().unwrap());
    }
}
