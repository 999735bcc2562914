//! Optional memoization for asymmetric decryption.
//!
//! The cache is an explicit object owned by the caller, never global state.
//! Entries are keyed by a BLAKE3 digest of the inputs so private key bytes are
//! not kept as map keys. Eviction is least-recently-used; a capacity of zero
//! disables caching entirely.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use zeroize::Zeroizing;

type CacheKey = [u8; 32];

pub struct DecryptCache {
    /// `None` when constructed with capacity 0.
    inner: Option<Mutex<LruCache<CacheKey, Zeroizing<Vec<u8>>>>>,
}

impl DecryptCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn capacity(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |cache| cache.lock().cap().get())
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |cache| cache.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(cache) = &self.inner {
            cache.lock().clear();
        }
    }

    pub(crate) fn key(my_secret: &[u8; 32], their_public: &[u8; 32], payload: &str) -> CacheKey {
        let mut hasher = blake3::Hasher::new_derive_key("mail_crypto decrypt-cache v1");
        hasher.update(my_secret);
        hasher.update(their_public);
        hasher.update(payload.as_bytes());
        hasher.finalize().into()
    }

    /// Lookup; a hit becomes the most recently used entry.
    pub(crate) fn get(&self, key: &CacheKey) -> Option<Zeroizing<Vec<u8>>> {
        self.inner.as_ref()?.lock().get(key).cloned()
    }

    pub(crate) fn insert(&self, key: CacheKey, plaintext: &[u8]) {
        if let Some(cache) = &self.inner {
            cache.lock().put(key, Zeroizing::new(plaintext.to_vec()));
        }
    }
}

impl std::fmt::Debug for DecryptCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptCache")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(payload: &str) -> CacheKey {
        DecryptCache::key(&[1; 32], &[0; 32], payload)
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = DecryptCache::new(2);
        cache.insert(key("a"), b"one");
        cache.insert(key("b"), b"two");
        cache.insert(key("c"), b"three");
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_none());
        assert_eq!(&cache.get(&key("c")).unwrap()[..], b"three");
    }

    #[test]
    fn frequently_read_entry_survives_inserts() {
        let cache = DecryptCache::new(2);
        cache.insert(key("hot"), b"session");
        for cold in ["x", "y", "z"] {
            assert!(cache.get(&key("hot")).is_some());
            cache.insert(key(cold), b"cold");
        }
        assert_eq!(&cache.get(&key("hot")).unwrap()[..], b"session");
        assert!(cache.get(&key("x")).is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        for cache in [DecryptCache::disabled(), DecryptCache::new(0)] {
            cache.insert(key("a"), b"one");
            assert!(cache.is_empty());
            assert_eq!(cache.capacity(), 0);
            assert!(cache.get(&key("a")).is_none());
        }
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = DecryptCache::new(4);
        cache.insert(key("a"), b"one");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 4);
    }

    #[test]
    fn key_depends_on_every_input() {
        let base = DecryptCache::key(&[1; 32], &[2; 32], "p");
        assert_ne!(base, DecryptCache::key(&[9; 32], &[2; 32], "p"));
        assert_ne!(base, DecryptCache::key(&[1; 32], &[9; 32], "p"));
        assert_ne!(base, DecryptCache::key(&[1; 32], &[2; 32], "q"));
    }
}
