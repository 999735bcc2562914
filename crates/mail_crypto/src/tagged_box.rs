//! Keyed AEAD envelope for datagrams.
//!
//! Wire format:
//!   [ nonce (24) | aad_len (u16 BE) | aad | ciphertext + tag (16) ]
//!
//! `aad` is the JSON-encoded [`AadMeta`] (datagram type + version) and is
//! passed to XChaCha20-Poly1305 as associated data. The encrypted plaintext
//! is `header_len (u32 BE) | header | body`.
//!
//! Decryption authenticates first, then checks the tag against the datagram
//! the caller asked for. Nothing is deserialized until both checks pass.

use tracing::debug;
use zeroize::Zeroizing;

use crate::{
    aead::{self, KEY_LEN, NONCE_LEN, TAG_LEN},
    codec,
    datagram::{AadMeta, Datagram},
    error::CryptoError,
};

const AAD_LEN_PREFIX: usize = 2;
const HEADER_LEN_PREFIX: usize = 4;

/// Output of a successful [`TaggedSecretBox::decrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted<H, B> {
    pub header: H,
    pub body: B,
    pub metadata: AadMeta,
}

/// Symmetric envelope bound to a single 32-byte key.
pub struct TaggedSecretBox {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl TaggedSecretBox {
    /// Any key length other than 32 bytes is a caller bug and is rejected
    /// outright; keys are never truncated or padded.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_LEN] = key.try_into().map_err(|_| {
            CryptoError::Assertion(format!(
                "secretbox key must be {KEY_LEN} bytes, got {}",
                key.len()
            ))
        })?;
        Ok(Self::from_key(&key))
    }

    pub fn from_key(key: &[u8; KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(*key),
        }
    }

    pub fn encrypt<D: Datagram>(
        &self,
        datagram: &D,
        header: &D::Header,
        body: &D::Body,
    ) -> Result<Vec<u8>, CryptoError> {
        let aad = AadMeta::for_identity(datagram.identity()).to_bytes()?;
        let aad_len = u16::try_from(aad.len())
            .map_err(|_| CryptoError::Assertion("AAD block exceeds u16 length".into()))?;

        let header_bytes = datagram.serialize_header(header)?;
        let body_bytes = datagram.serialize_body(body)?;
        let header_len = u32::try_from(header_bytes.len())
            .map_err(|_| CryptoError::Assertion("datagram header exceeds u32 length".into()))?;

        let mut plaintext = Zeroizing::new(Vec::with_capacity(
            HEADER_LEN_PREFIX + header_bytes.len() + body_bytes.len(),
        ));
        plaintext.extend_from_slice(&header_len.to_be_bytes());
        plaintext.extend_from_slice(&header_bytes);
        plaintext.extend_from_slice(&body_bytes);

        let (nonce, ciphertext) = aead::seal(&self.key, &plaintext, &aad)?;

        let mut out =
            Vec::with_capacity(NONCE_LEN + AAD_LEN_PREFIX + aad.len() + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&aad_len.to_be_bytes());
        out.extend_from_slice(&aad);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn decrypt<D: Datagram>(
        &self,
        datagram: &D,
        data: &[u8],
    ) -> Result<Decrypted<D::Header, D::Body>, CryptoError> {
        let (nonce, aad, ciphertext) = split_frame(data)?;
        let plaintext = aead::open(&self.key, &nonce, ciphertext, aad)?;

        // Authenticated, so a parse failure here means a foreign producer.
        let metadata = AadMeta::from_bytes(aad).map_err(|_| CryptoError::Decryption)?;
        if let Err(e) = metadata.check(datagram.identity()) {
            debug!(
                target: "mail_crypto",
                event = "tagged_box_rejected",
                expected = %datagram.identity().datagram_type,
                found = %metadata.datagram_type,
                version = %metadata.version,
            );
            return Err(e);
        }

        if plaintext.len() < HEADER_LEN_PREFIX {
            return Err(CryptoError::Decryption);
        }
        let (len_bytes, rest) = plaintext.split_at(HEADER_LEN_PREFIX);
        let header_len =
            u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
        if header_len > rest.len() {
            return Err(CryptoError::Decryption);
        }
        let (header_bytes, body_bytes) = rest.split_at(header_len);

        Ok(Decrypted {
            header: datagram.deserialize_header(header_bytes)?,
            body: datagram.deserialize_body(body_bytes)?,
            metadata,
        })
    }

    /// [`encrypt`](Self::encrypt), base64-encoded for transport.
    pub fn encrypt_b64<D: Datagram>(
        &self,
        datagram: &D,
        header: &D::Header,
        body: &D::Body,
    ) -> Result<String, CryptoError> {
        Ok(codec::base64_encode(&self.encrypt(datagram, header, body)?))
    }

    pub fn decrypt_b64<D: Datagram>(
        &self,
        datagram: &D,
        payload: &str,
    ) -> Result<Decrypted<D::Header, D::Body>, CryptoError> {
        let data = codec::base64_decode(payload).map_err(|_| CryptoError::Decryption)?;
        self.decrypt(datagram, &data)
    }
}

/// Split `nonce | aad_len | aad | ct` without trusting any of it yet.
fn split_frame(data: &[u8]) -> Result<([u8; NONCE_LEN], &[u8], &[u8]), CryptoError> {
    if data.len() < NONCE_LEN + AAD_LEN_PREFIX + TAG_LEN {
        return Err(CryptoError::Decryption);
    }
    let (nonce_bytes, rest) = data.split_at(NONCE_LEN);
    let (len_bytes, rest) = rest.split_at(AAD_LEN_PREFIX);
    let aad_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    if aad_len + TAG_LEN > rest.len() {
        return Err(CryptoError::Decryption);
    }
    let (aad, ciphertext) = rest.split_at(aad_len);

    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(nonce_bytes);
    Ok((nonce, aad, ciphertext))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::datagram::{DatagramIdentity, JsonDatagram};

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct NoteHeader {
        folder: String,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct NoteBody {
        text: String,
    }

    fn note_datagram() -> JsonDatagram<NoteHeader, NoteBody> {
        JsonDatagram::new(DatagramIdentity::minor_series("ddl://test/Note", 0, 1, 0))
    }

    // Same shape, different identity.
    fn memo_datagram() -> JsonDatagram<NoteHeader, NoteBody> {
        JsonDatagram::new(DatagramIdentity::minor_series("ddl://test/Memo", 0, 1, 0))
    }

    fn sample() -> (NoteHeader, NoteBody) {
        (
            NoteHeader {
                folder: "inbox".into(),
            },
            NoteBody {
                text: "meet at noon".into(),
            },
        )
    }

    #[test]
    fn roundtrip_returns_header_body_and_metadata() {
        let sb = TaggedSecretBox::new(&[3u8; 32]).unwrap();
        let (header, body) = sample();
        let ct = sb.encrypt(&note_datagram(), &header, &body).unwrap();
        let out = sb.decrypt(&note_datagram(), &ct).unwrap();
        assert_eq!(out.header, header);
        assert_eq!(out.body, body);
        assert_eq!(out.metadata.datagram_type, "ddl://test/Note");
    }

    #[test]
    fn every_bit_flip_is_a_decryption_error() {
        let sb = TaggedSecretBox::new(&[3u8; 32]).unwrap();
        let (header, body) = sample();
        let ct = sb.encrypt(&note_datagram(), &header, &body).unwrap();

        // Covers nonce, length prefix, AAD, ciphertext and tag regions.
        for bit in 0..ct.len() * 8 {
            let mut tampered = ct.clone();
            tampered[bit / 8] ^= 1 << (bit % 8);
            let err = sb.decrypt(&note_datagram(), &tampered).unwrap_err();
            assert!(err.is_decryption(), "bit {bit}: got {err:?}");
        }
    }

    #[test]
    fn other_datagram_is_type_confusion() {
        let sb = TaggedSecretBox::new(&[3u8; 32]).unwrap();
        let (header, body) = sample();
        let ct = sb.encrypt(&note_datagram(), &header, &body).unwrap();
        let err = sb.decrypt(&memo_datagram(), &ct).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::TypeConfusion { ref expected, ref found }
                if expected == "ddl://test/Memo" && found == "ddl://test/Note"
        ));
    }

    #[test]
    fn newer_minor_version_is_rejected() {
        let sb = TaggedSecretBox::new(&[3u8; 32]).unwrap();
        let writer: JsonDatagram<NoteHeader, NoteBody> =
            JsonDatagram::new(DatagramIdentity::minor_series("ddl://test/Note", 0, 2, 0));
        let (header, body) = sample();
        let ct = sb.encrypt(&writer, &header, &body).unwrap();
        let err = sb.decrypt(&note_datagram(), &ct).unwrap_err();
        assert!(matches!(err, CryptoError::VersionMismatch { .. }));
    }

    #[test]
    fn patch_version_is_accepted() {
        let sb = TaggedSecretBox::new(&[3u8; 32]).unwrap();
        let writer: JsonDatagram<NoteHeader, NoteBody> =
            JsonDatagram::new(DatagramIdentity::minor_series("ddl://test/Note", 0, 1, 4));
        let (header, body) = sample();
        let ct = sb.encrypt(&writer, &header, &body).unwrap();
        assert_eq!(sb.decrypt(&note_datagram(), &ct).unwrap().body, body);
    }

    #[test]
    fn wrong_key_is_a_decryption_error() {
        let (header, body) = sample();
        let ct = TaggedSecretBox::new(&[3u8; 32])
            .unwrap()
            .encrypt(&note_datagram(), &header, &body)
            .unwrap();
        let err = TaggedSecretBox::new(&[4u8; 32])
            .unwrap()
            .decrypt(&note_datagram(), &ct)
            .unwrap_err();
        assert!(err.is_decryption());
    }

    #[test]
    fn bad_key_length_fails_fast() {
        assert!(matches!(
            TaggedSecretBox::new(&[0u8; 31]),
            Err(CryptoError::Assertion(_))
        ));
        assert!(TaggedSecretBox::new(&[0u8; 33]).is_err());
    }

    #[test]
    fn b64_payload_roundtrip_and_garbage() {
        let sb = TaggedSecretBox::new(&[9u8; 32]).unwrap();
        let (header, body) = sample();
        let payload = sb.encrypt_b64(&note_datagram(), &header, &body).unwrap();
        assert_eq!(sb.decrypt_b64(&note_datagram(), &payload).unwrap().header, header);
        assert!(sb.decrypt_b64(&note_datagram(), "not base64!").unwrap_err().is_decryption());
    }

    proptest! {
        #[test]
        fn roundtrip_arbitrary_contents(
            key in prop::array::uniform32(any::<u8>()),
            folder in ".*",
            text in ".*",
        ) {
            let sb = TaggedSecretBox::new(&key).unwrap();
            let header = NoteHeader { folder };
            let body = NoteBody { text };
            let ct = sb.encrypt(&note_datagram(), &header, &body).unwrap();
            let out = sb.decrypt(&note_datagram(), &ct).unwrap();
            prop_assert_eq!(out.header, header);
            prop_assert_eq!(out.body, body);
        }
    }
}
