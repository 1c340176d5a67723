//! CORS, response caching, and rate limiting (spec §4.8). Grounded on
//! `tandem-memory`'s `ResponseCache` (TTL expiry + LRU eviction over a
//! keyed store), adapted to an in-process GET-response cache instead of an
//! LLM-prompt cache, plus a sliding-window rate limiter and an allowlist
//! CORS layer the teacher's `CorsLayer::new().allow_origin(Any)` does not
//! need (a single-tenant desktop app has no cross-origin concern).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::AppState;

/// Builds an allowlist CORS layer: exact origins plus `*.domain` wildcard
/// entries, matched against the request's `Origin` header. A request with
/// no `Origin` header (same-origin, or a non-browser client) always passes
/// — CORS is a browser enforcement mechanism, not an authentication layer.
pub fn cors_layer(allowed_origins: Vec<String>) -> CorsLayer {
    let allowed = Arc::new(allowed_origins);
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            let Ok(origin) = origin.to_str() else { return false };
            allowed.iter().any(|pattern| origin_matches(pattern, origin))
        }))
}

fn origin_matches(pattern: &str, origin: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(suffix) => origin
            .rsplit_once("://")
            .map(|(_, host)| host == suffix || host.ends_with(&format!(".{suffix}")))
            .unwrap_or(false),
        None => pattern == origin,
    }
}

#[derive(Clone)]
struct CacheEntry {
    body: Vec<u8>,
    content_type: Option<String>,
    etag: String,
    stored_at: Instant,
}

/// In-memory response cache keyed by `(method, path, query, user_hash)`
/// (spec §4.8): TTL expiry plus LRU eviction, only 2xx `GET` responses are
/// cacheable.
#[derive(Clone)]
pub struct ResponseCacheStore {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    order: Arc<RwLock<VecDeque<String>>>,
    ttl: StdDuration,
    capacity: usize,
}

impl ResponseCacheStore {
    pub fn new(ttl: StdDuration, capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            order: Arc::new(RwLock::new(VecDeque::new())),
            ttl,
            capacity,
        }
    }

    pub fn key(method: &Method, path: &str, query: &str, user_hash: &str) -> String {
        format!("{method}:{path}:{query}:{user_hash}")
    }

    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.clone())
    }

    async fn put(&self, key: String, body: Vec<u8>, content_type: Option<String>) {
        let etag = format!("\"{}\"", nimbus_observability::short_hash(&String::from_utf8_lossy(&body)));
        let mut entries = self.entries.write().await;
        let mut order = self.order.write().await;
        if !entries.contains_key(&key) {
            order.push_back(key.clone());
        }
        entries.insert(key.clone(), CacheEntry { body, content_type, etag, stored_at: Instant::now() });

        while entries.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                entries.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

pub async fn response_cache_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    use axum::body::Body;
    use axum::response::IntoResponse;

    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or("").to_string();
    let user_hash = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(nimbus_observability::short_hash)
        .unwrap_or_else(|| "anonymous".to_string());
    let key = ResponseCacheStore::key(request.method(), &path, &query, &user_hash);

    let if_none_match = request
        .headers()
        .get(axum::http::header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Some(cached) = state.response_cache.get(&key).await {
        if if_none_match.as_deref() == Some(cached.etag.as_str()) {
            return StatusCode::NOT_MODIFIED.into_response();
        }
        let mut response = Response::new(Body::from(cached.body));
        if let Some(content_type) = cached.content_type {
            if let Ok(value) = HeaderValue::from_str(&content_type) {
                response.headers_mut().insert(axum::http::header::CONTENT_TYPE, value);
            }
        }
        if let Ok(value) = HeaderValue::from_str(&cached.etag) {
            response.headers_mut().insert(axum::http::header::ETAG, value);
        }
        return response;
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let content_type = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };

    state.response_cache.put(key, bytes.to_vec(), content_type).await;
    Response::from_parts(parts, Body::from(bytes))
}

/// Sliding-window rate limiter keyed by `(user_id, endpoint)` (spec §4.8).
/// Fails open on internal error — a store outage must never itself become
/// an outage for every other request.
#[derive(Clone)]
pub struct RateLimiterStore {
    windows: Arc<RwLock<HashMap<(String, String), VecDeque<Instant>>>>,
    window: StdDuration,
    max_requests: usize,
}

impl RateLimiterStore {
    pub fn new(window: StdDuration, max_requests: usize) -> Self {
        Self { windows: Arc::new(RwLock::new(HashMap::new())), window, max_requests }
    }

    /// Returns `true` if the request is allowed.
    pub async fn check(&self, user_id: &str, endpoint: &str) -> bool {
        let key = (user_id.to_string(), endpoint.to_string());
        let now = Instant::now();
        let mut windows = self.windows.write().await;
        let bucket = windows.entry(key).or_default();
        while let Some(oldest) = bucket.front() {
            if now.duration_since(*oldest) > self.window {
                bucket.pop_front();
            } else {
                break;
            }
        }
        if bucket.len() >= self.max_requests {
            return false;
        }
        bucket.push_back(now);
        true
    }
}

pub async fn rate_limit_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    use axum::response::IntoResponse;

    let user_id = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(nimbus_observability::short_hash)
        .unwrap_or_else(|| "anonymous".to_string());
    let endpoint = request.uri().path().to_string();

    if !state.rate_limiter.check(&user_id, &endpoint).await {
        let error: crate::error::ApiError = nimbus_types::NimbusError::RateLimited { retry_after_ms: Some(1_000) }.into();
        return error.into_response();
    }

    next.run(request).await
}
