//! Reply Cache
//!
//! Short-lived cache of sanitized model replies keyed by contact and message
//! prefix. Purely an optimization: a miss calls the provider again.

use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::text::{normalize, truncate_chars};

/// Characters of the message that take part in the key
pub const KEY_PREFIX_CHARS: usize = 100;

/// Default entry lifetime (5 minutes)
pub const DEFAULT_TTL_SECS: u64 = 300;

const MAX_ENTRIES: u64 = 1_000;

/// Cache statistics, shown to the owner by `status` and `stats`
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} entries, {} hits, {} misses ({:.1}% hit rate)",
            self.entries, self.hits, self.misses, self.hit_rate_percent
        )
    }
}

/// Bounded TTL cache of assistant replies
#[derive(Clone)]
pub struct ReplyCache {
    cache: Cache<String, String>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    enabled: bool,
}

impl ReplyCache {
    /// Create new cache with TTL
    pub fn new(ttl_secs: u64, enabled: bool) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            cache,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            enabled,
        }
    }

    pub fn disabled() -> Self {
        Self::new(DEFAULT_TTL_SECS, false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Key = SHA256(contact + normalized message prefix)
    pub fn compute_key(contact: &str, message: &str) -> String {
        let normalized = normalize(message);
        let prefix = truncate_chars(&normalized, KEY_PREFIX_CHARS);

        let mut hasher = Sha256::new();
        hasher.update(contact.as_bytes());
        hasher.update([0u8]);
        hasher.update(prefix.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }

        if let Some(reply) = self.cache.get(key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache HIT: {}", &key[..16]);
            Some(reply)
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Cache MISS: {}", &key[..16]);
            None
        }
    }

    pub async fn set(&self, key: &str, reply: &str) {
        if !self.enabled {
            return;
        }

        self.cache.insert(key.to_string(), reply.to_string()).await;
        debug!("Cache SET: {}", &key[..16]);
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            entries: self.cache.entry_count(),
            hits,
            misses,
            hit_rate_percent: if total > 0 {
                (hits as f64 / total as f64) * 100.0
            } else {
                0.0
            },
        }
    }
}
