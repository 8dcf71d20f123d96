//! Per-issuer cache of verification keys.
//!
//! One entry per issuer URL holding the issuer's whole key set and the time
//! it was fetched. Entries are replaced wholesale (`Arc` swap under the write
//! lock), so a reader either sees the previous key set or the new one, never
//! a partially populated map.
//!
//! An expired entry is reported as a miss but left in place; the next `put`
//! for that issuer overwrites it.

use crate::observability::metrics;
use jsonwebtoken::DecodingKey;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Key set time-to-live (1 hour).
pub const KEY_SET_TTL: Duration = Duration::from_secs(3600);

/// Verification keys of one issuer, keyed by `kid`.
#[derive(Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, DecodingKey>,
}

impl KeySet {
    /// Build a key set from `(kid, key)` pairs.
    ///
    /// A duplicate `kid` keeps the first key seen.
    pub fn from_keys(keys: impl IntoIterator<Item = (String, DecodingKey)>) -> Self {
        let mut map = HashMap::new();
        for (kid, key) in keys {
            map.entry(kid).or_insert(key);
        }
        Self { keys: map }
    }

    /// Look up the verification key for a `kid`.
    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key IDs in this set, sorted.
    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }
}

/// Key material is not printed, only the key IDs.
impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySet").field("kids", &self.kids()).finish()
    }
}

/// Cached key set with the time it was fetched.
#[derive(Debug)]
struct CacheEntry {
    key_set: Arc<KeySet>,
    fetched_at: Instant,
}

/// Issuer-keyed key set cache with a fixed TTL.
///
/// Owned by the service and shared via `Arc`; tests create their own.
pub struct KeyCache {
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    ttl: Duration,
}

impl KeyCache {
    /// Create an empty cache with the standard one-hour TTL.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: KEY_SET_TTL,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the issuer's key set if present and not older than the TTL.
    pub async fn get(&self, issuer: &str) -> Option<Arc<KeySet>> {
        let entry = self.entries.read().await.get(issuer).cloned();

        match entry {
            Some(entry) if entry.fetched_at.elapsed() <= self.ttl => {
                tracing::debug!(target: "auth.cache", issuer = %issuer, "Key set cache hit");
                metrics::record_key_cache_lookup("hit");
                Some(entry.key_set.clone())
            }
            Some(_) => {
                tracing::debug!(target: "auth.cache", issuer = %issuer, "Key set cache entry expired");
                metrics::record_key_cache_lookup("expired");
                None
            }
            None => {
                tracing::debug!(target: "auth.cache", issuer = %issuer, "Key set cache miss");
                metrics::record_key_cache_lookup("miss");
                None
            }
        }
    }

    /// Store a freshly fetched key set, replacing any previous entry.
    pub async fn put(&self, issuer: &str, key_set: KeySet) -> Arc<KeySet> {
        let key_set = Arc::new(key_set);
        let entry = Arc::new(CacheEntry {
            key_set: key_set.clone(),
            fetched_at: Instant::now(),
        });

        self.entries.write().await.insert(issuer.to_string(), entry);

        tracing::debug!(
            target: "auth.cache",
            issuer = %issuer,
            key_count = key_set.len(),
            "Key set cached"
        );
        key_set
    }

    /// Drop the issuer's entry so the next `get` misses regardless of age.
    pub async fn invalidate(&self, issuer: &str) {
        if self.entries.write().await.remove(issuer).is_some() {
            tracing::info!(target: "auth.cache", issuer = %issuer, "Key set cache invalidated");
        }
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}
