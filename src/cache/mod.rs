//! Response cache for the global post feed.
//!
//! Rendered responses are kept for a fixed TTL keyed by path and query.
//! Writes to posts never invalidate entries; operators can drop everything
//! through [`ResponseCache::clear`] (exposed on the admin listener).
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 20
//! ```

mod config;
mod middleware;
mod store;

/// Counter names emitted by the cache; described when telemetry starts.
pub mod metric {
    pub const HIT: &str = "quillpost_response_cache_hit_total";
    pub const MISS: &str = "quillpost_response_cache_miss_total";
    pub const STORE: &str = "quillpost_response_cache_store_total";
    pub const CLEAR: &str = "quillpost_response_cache_clear_total";
}

pub use config::CacheConfig;
pub use middleware::{CACHE_STATUS_HEADER, CacheState, response_cache_layer};
pub use store::{CachedResponse, ResponseCache};
