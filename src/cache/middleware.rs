//! Response cache middleware.
//!
//! Serves stored responses for GET requests and stores fresh `200 OK`
//! responses that do not set cookies.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use tracing::{debug, instrument, warn};

use super::{CacheConfig, ResponseCache, metric, store::CachedResponse};

const SOURCE: &str = "quillpost::cache::middleware";
const MAX_CACHED_BODY_BYTES: usize = 4 * 1024 * 1024;
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Shared cache state for middleware and the admin clear endpoint.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub store: Arc<ResponseCache>,
}

impl CacheState {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: Arc::new(ResponseCache::new(config.ttl)),
            config,
        }
    }
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = ResponseCache::key(request.uri().path(), request.uri().query());

    if let Some(cached) = cache.store.get(&key).await {
        counter!(metric::HIT).increment(1);
        debug!(target = SOURCE, key = %key, outcome = "hit", "serving cached response");
        return build_response(cached);
    }

    counter!(metric::MISS).increment(1);
    let response = next.run(request).await;

    if response.status() != StatusCode::OK || response.headers().contains_key(SET_COOKIE) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(target = SOURCE, key = %key, error = %err, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect(),
        body: bytes.clone(),
    };
    cache.store.store(key.clone(), cached).await;
    debug!(target = SOURCE, key = %key, outcome = "miss", "response stored");

    parts
        .headers
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("miss"));
    Response::from_parts(parts, Body::from(bytes))
}

fn build_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }
    builder = builder.header(CACHE_STATUS_HEADER, HeaderValue::from_static("hit"));

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
