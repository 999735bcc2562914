use std::{path::Path, time::Duration};

use anyhow::Context;
use mail_crypto::{kdf::KdfParams, DecryptCache, EncryptionPublicKey};
use serde::{Deserialize, Serialize};

use crate::error::ComposeError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalDeliverySettings {
    /// Base64 X25519 key of the service that delivers to recipients with no
    /// key of their own. Without it such recipients cannot be addressed.
    pub service_public_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Upper bound for each recipient lookup.
    pub timeout_secs: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Entries kept by the session key decrypt cache. `0` disables it.
    pub decrypt_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            decrypt_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeSettings {
    pub external: ExternalDeliverySettings,
    pub resolver: ResolverSettings,
    pub cache: CacheSettings,
    pub kdf: KdfParams,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            external: ExternalDeliverySettings::default(),
            resolver: ResolverSettings::default(),
            cache: CacheSettings::default(),
            kdf: KdfParams::default(),
        }
    }
}

impl ComposeSettings {
    pub fn from_json(json: &str) -> Result<Self, ComposeError> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| ComposeError::Settings(e.to_string()))?;
        settings.external_service_key()?;
        if settings.resolver.timeout_secs == 0 {
            return Err(ComposeError::Settings("resolver.timeout_secs must be > 0".into()));
        }
        Ok(settings)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn external_service_key(&self) -> Result<Option<EncryptionPublicKey>, ComposeError> {
        self.external
            .service_public_key
            .as_deref()
            .map(EncryptionPublicKey::from_b64)
            .transpose()
            .map_err(|e| ComposeError::Settings(format!("external.service_public_key: {e}")))
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolver.timeout_secs)
    }

    pub fn decrypt_cache(&self) -> DecryptCache {
        DecryptCache::new(self.cache.decrypt_capacity)
    }
}
