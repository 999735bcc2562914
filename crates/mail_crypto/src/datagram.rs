//! Versioned, typed header/body pairs: the unit of symmetric encryption.
//!
//! A datagram is a strategy object. It names its wire identity
//! (`type`, `version`, accepted `version_constraint`) and knows how to turn
//! its header and body into bytes and back. The tagged envelope binds the
//! identity into the AEAD associated data, so a payload produced under one
//! datagram can never be read back as another.

use std::marker::PhantomData;

use semver::{Comparator, Op, Prerelease, Version, VersionReq};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::CryptoError;

/// Wire identity of a datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatagramIdentity {
    pub datagram_type: String,
    pub version: Version,
    pub version_constraint: VersionReq,
}

impl DatagramIdentity {
    pub fn new(datagram_type: impl Into<String>, version: Version, version_constraint: VersionReq) -> Self {
        Self {
            datagram_type: datagram_type.into(),
            version,
            version_constraint,
        }
    }

    /// Identity at `major.minor.patch` accepting any `major.minor.*` payload.
    pub fn minor_series(datagram_type: impl Into<String>, major: u64, minor: u64, patch: u64) -> Self {
        let constraint = VersionReq {
            comparators: vec![Comparator {
                op: Op::Wildcard,
                major,
                minor: Some(minor),
                patch: None,
                pre: Prerelease::EMPTY,
            }],
        };
        Self::new(datagram_type, Version::new(major, minor, patch), constraint)
    }

    pub fn accepts(&self, version: &Version) -> bool {
        self.version_constraint.matches(version)
    }
}

/// Serialize/deserialize capability for one header/body pair.
pub trait Datagram {
    type Header;
    type Body;

    fn identity(&self) -> &DatagramIdentity;

    fn serialize_header(&self, header: &Self::Header) -> Result<Vec<u8>, CryptoError>;
    fn deserialize_header(&self, bytes: &[u8]) -> Result<Self::Header, CryptoError>;
    fn serialize_body(&self, body: &Self::Body) -> Result<Vec<u8>, CryptoError>;
    fn deserialize_body(&self, bytes: &[u8]) -> Result<Self::Body, CryptoError>;
}

/// Datagram whose header and body are serde types encoded as JSON.
pub struct JsonDatagram<H, B> {
    identity: DatagramIdentity,
    _marker: PhantomData<fn() -> (H, B)>,
}

impl<H, B> JsonDatagram<H, B> {
    pub fn new(identity: DatagramIdentity) -> Self {
        Self {
            identity,
            _marker: PhantomData,
        }
    }
}

impl<H, B> Clone for JsonDatagram<H, B> {
    fn clone(&self) -> Self {
        Self::new(self.identity.clone())
    }
}

impl<H, B> std::fmt::Debug for JsonDatagram<H, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDatagram").field("identity", &self.identity).finish()
    }
}

impl<H, B> Datagram for JsonDatagram<H, B>
where
    H: Serialize + DeserializeOwned,
    B: Serialize + DeserializeOwned,
{
    type Header = H;
    type Body = B;

    fn identity(&self) -> &DatagramIdentity {
        &self.identity
    }

    fn serialize_header(&self, header: &H) -> Result<Vec<u8>, CryptoError> {
        Ok(serde_json::to_vec(header)?)
    }

    fn deserialize_header(&self, bytes: &[u8]) -> Result<H, CryptoError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn serialize_body(&self, body: &B) -> Result<Vec<u8>, CryptoError> {
        Ok(serde_json::to_vec(body)?)
    }

    fn deserialize_body(&self, bytes: &[u8]) -> Result<B, CryptoError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Metadata bound into every tagged envelope as associated data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AadMeta {
    #[serde(rename = "type")]
    pub datagram_type: String,
    pub version: Version,
}

impl AadMeta {
    pub fn for_identity(identity: &DatagramIdentity) -> Self {
        Self {
            datagram_type: identity.datagram_type.clone(),
            version: identity.version.clone(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Check this tag against the datagram the caller expects.
    /// Type is checked before version.
    pub fn check(&self, expected: &DatagramIdentity) -> Result<(), CryptoError> {
        if self.datagram_type != expected.datagram_type {
            return Err(CryptoError::TypeConfusion {
                expected: expected.datagram_type.clone(),
                found: self.datagram_type.clone(),
            });
        }
        if !expected.accepts(&self.version) {
            return Err(CryptoError::VersionMismatch {
                datagram_type: expected.datagram_type.clone(),
                expected: expected.version_constraint.to_string(),
                found: self.version.to_string(),
            });
        }
        Ok(())
    }
}
