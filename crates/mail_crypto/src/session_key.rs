//! Per-message symmetric key.

use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::{aead::KEY_LEN, error::CryptoError, tagged_box::TaggedSecretBox};

/// Ephemeral 32-byte key generated once per composed message. Zeroized on drop.
pub struct SessionKey(Zeroizing<[u8; KEY_LEN]>);

impl SessionKey {
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut key[..]);
        Self(key)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "session key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(Zeroizing::new(key)))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Envelope keyed by this session key.
    pub fn tagged_box(&self) -> TaggedSecretBox {
        TaggedSecretBox::from_key(self.as_bytes())
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_differ() {
        assert_ne!(SessionKey::generate().as_bytes(), SessionKey::generate().as_bytes());
    }

    #[test]
    fn from_slice_checks_length() {
        assert!(SessionKey::from_slice(&[0u8; 16]).is_err());
        assert_eq!(SessionKey::from_slice(&[5u8; 32]).unwrap().as_bytes(), &[5u8; 32]);
    }

    #[test]
    fn debug_hides_key() {
        assert_eq!(format!("{:?}", SessionKey::generate()), "SessionKey(..)");
    }
}
