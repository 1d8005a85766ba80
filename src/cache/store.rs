//! TTL response store.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::metric;

const SOURCE: &str = "quillpost::cache::store";

/// Snapshot of a rendered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
struct Entry {
    response: CachedResponse,
    expires_at: Instant,
}

/// Path+query keyed response cache with a fixed time-to-live.
///
/// Population is last-write-wins; an expired entry is never served and is
/// replaced by the next store for the same key.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Build the cache key for a request target.
    pub fn key(path: &str, query: Option<&str>) -> String {
        match query {
            Some(query) if !query.is_empty() => format!("{path}?{query}"),
            _ => path.to_string(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            debug!(target = SOURCE, key, "cached response expired");
            return None;
        }
        Some(entry.response.clone())
    }

    pub async fn store(&self, key: String, response: CachedResponse) {
        let entry = Entry {
            response,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.insert(key, entry);
        counter!(metric::STORE).increment(1);
    }

    /// Drop every entry regardless of age.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        counter!(metric::CLEAR).increment(1);
        debug!(target = SOURCE, removed, "response cache cleared");
    }

    /// Remove expired entries. Returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
