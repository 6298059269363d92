//! TTL + LRU response cache keyed by normalized content.

use caduceus_core::config::CacheConfig;
use caduceus_core::{Timestamp, UserRole};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Cached response payload. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    /// The response text
    pub text: String,

    /// Model that produced the response
    pub model: String,

    /// Input tokens of the original call
    pub input_tokens: u32,

    /// Output tokens of the original call
    pub output_tokens: u32,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: CachedResponse,
    created_at: Timestamp,
    last_used: Timestamp,
}

/// Compute the cache key for a message, role, and routed model.
///
/// The message is normalized (lowercased, whitespace collapsed) so
/// trivially different phrasings of the same request share an entry.
#[must_use]
pub fn cache_key(message: &str, role: UserRole, model: &str) -> String {
    let normalized = normalize(message);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update(b"|");
    hasher.update(role.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(model.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn normalize(message: &str) -> String {
    message
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Bounded response cache with lazy TTL expiry and deterministic eviction.
///
/// On overflow, expired entries are evicted first, then the least recently
/// used entry (ties broken by key so eviction order is reproducible).
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    /// Create a cache from configuration.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl: Duration::seconds(config.ttl_secs),
            capacity: config.capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a key, returning the payload on a live hit.
    ///
    /// An expired entry is removed and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        self.get_at(key, Utc::now()).await
    }

    /// Clock-injected variant of [`get`](Self::get).
    pub async fn get_at(&self, key: &str, now: Timestamp) -> Option<CachedResponse> {
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(key) {
            Some(entry) => now - entry.created_at >= self.ttl,
            None => return None,
        };

        if expired {
            entries.remove(key);
            tracing::debug!(key, "cache entry expired on read");
            return None;
        }

        let entry = entries.get_mut(key)?;
        entry.last_used = now;
        Some(entry.response.clone())
    }

    /// Store a payload under a key, evicting if the cache is full.
    pub async fn insert(&self, key: String, response: CachedResponse) {
        self.insert_at(key, response, Utc::now()).await;
    }

    /// Clock-injected variant of [`insert`](Self::insert).
    pub async fn insert_at(&self, key: String, response: CachedResponse, now: Timestamp) {
        let mut entries = self.entries.lock().await;

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            Self::evict_one(&mut entries, self.ttl, now);
        }

        entries.insert(
            key,
            CacheEntry {
                response,
                created_at: now,
                last_used: now,
            },
        );
    }

    /// Remove expired entries (maintenance sweep). Returns removed count.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Utc::now()).await
    }

    /// Clock-injected variant of [`sweep`](Self::sweep).
    pub async fn sweep_at(&self, now: Timestamp) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| now - entry.created_at < self.ttl);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "cache sweep removed expired entries");
        }
        removed
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Evict exactly one entry: any expired entry first, otherwise the
    /// least recently used (ties broken by key).
    fn evict_one(entries: &mut HashMap<String, CacheEntry>, ttl: Duration, now: Timestamp) {
        let victim = entries
            .iter()
            .find(|(_, e)| now - e.created_at >= ttl)
            .map(|(k, _)| k.clone())
            .or_else(|| {
                entries
                    .iter()
                    .min_by(|(ka, ea), (kb, eb)| {
                        ea.last_used.cmp(&eb.last_used).then_with(|| ka.cmp(kb))
                    })
                    .map(|(k, _)| k.clone())
            });

        if let Some(key) = victim {
            tracing::debug!(key = %key, "evicting cache entry");
            entries.remove(&key);
        }
    }
}
