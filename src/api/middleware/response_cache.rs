//! Read-through response cache for tenant-scoped GET endpoints

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::{Query, State},
    http::{header, HeaderValue, Method, Request, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::cache::{
    build_key, normalize_path, CacheKeyParams, CacheLookup, CacheStatus, Namespace, ANONYMOUS_USER,
};
use crate::domain::tenant::TenantId;
use crate::infrastructure::cache::CacheStore;

use super::request_context::RequestContext;

pub const CACHE_STATUS_HEADER: &str = "x-cache";
pub const CACHE_KEY_HEADER: &str = "x-cache-key";

/// Default upper bound for a captured body
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Computes the cache key for a request, or `None` to bypass the cache
pub type CacheKeyFn = Arc<dyn Fn(&RequestContext, &Uri) -> Option<String> + Send + Sync>;

/// Decides whether a handler's status may be stored
pub type CacheablePredicate = Arc<dyn Fn(StatusCode) -> bool + Send + Sync>;

/// Captured handler output as stored in the `api` namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Base64 of the exact body bytes
    pub body: String,
}

impl CachedResponse {
    pub fn capture(status: StatusCode, content_type: Option<&HeaderValue>, body: &[u8]) -> Self {
        Self {
            status: status.as_u16(),
            content_type: content_type
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: STANDARD.encode(body),
        }
    }

    /// Rebuilds the response; `None` if the entry cannot be replayed
    fn replay(&self, key: &str) -> Option<Response> {
        let status = StatusCode::from_u16(self.status).ok()?;
        let body = STANDARD.decode(&self.body).ok()?;

        let mut response = (status, body).into_response();
        let headers = response.headers_mut();
        headers.remove(header::CONTENT_TYPE);
        if let Some(ct) = self.content_type.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
            headers.insert(header::CONTENT_TYPE, ct);
        }
        mark(&mut response, CacheStatus::Hit, key);

        Some(response)
    }
}

/// Shared state of [`response_cache_middleware`]
#[derive(Clone)]
pub struct ResponseCache {
    store: CacheStore,
    ttl: Duration,
    max_body_bytes: usize,
    cacheable: CacheablePredicate,
    key_fn: Option<CacheKeyFn>,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("custom_key", &self.key_fn.is_some())
            .finish()
    }
}

impl ResponseCache {
    /// Caches 2xx GET responses for `ttl`
    pub fn new(store: CacheStore, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            cacheable: Arc::new(|status: StatusCode| status.is_success()),
            key_fn: None,
        }
    }

    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    pub fn with_cacheable<F>(mut self, predicate: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        self.cacheable = Arc::new(predicate);
        self
    }

    /// Replaces the default key for the routes this layer wraps
    pub fn with_key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&RequestContext, &Uri) -> Option<String> + Send + Sync + 'static,
    {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Key for a request, `None` when it must bypass the cache
    pub fn key_for(&self, ctx: &RequestContext, uri: &Uri) -> Option<String> {
        match &self.key_fn {
            Some(key_fn) => key_fn(ctx, uri),
            None => {
                let tenant = ctx.tenant.as_ref()?;
                Some(response_cache_key(tenant, ctx.user_id.as_deref(), uri))
            }
        }
    }
}

/// `api:{tenant}:{normalized path}:{sorted query + _user}`
pub fn response_cache_key(tenant: &TenantId, user_id: Option<&str>, uri: &Uri) -> String {
    let pairs = Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map(|Query(pairs)| pairs)
        .unwrap_or_default();

    let mut params = CacheKeyParams::new();
    for (name, value) in pairs {
        // Repeated parameters keep every value, in request order
        let merged = match params.get(&name) {
            Some(existing) if !value.is_empty() => format!("{},{}", existing, value),
            Some(existing) => existing.to_string(),
            None => value,
        };
        params.insert(name, merged);
    }
    params.insert("_user", user_id.unwrap_or(ANONYMOUS_USER));

    build_key(Namespace::Api, tenant, &normalize_path(uri.path()), &params)
}

fn mark(response: &mut Response, status: CacheStatus, key: &str) {
    let headers = response.headers_mut();
    headers.insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(status.as_header_value()),
    );
    if let Ok(value) = HeaderValue::from_str(key) {
        headers.insert(CACHE_KEY_HEADER, value);
    }
}

/// Serves GET requests from the cache and stores cacheable handler output.
///
/// Non-GET requests and requests without a tenant pass straight through
/// without touching the store.
pub async fn response_cache_middleware(
    State(cache): State<ResponseCache>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let ctx = RequestContext::from_headers(request.headers());
    let Some(key) = cache.key_for(&ctx, request.uri()) else {
        return next.run(request).await;
    };

    if let CacheLookup::Hit(cached) = cache.store.get::<CachedResponse>(&key).await {
        match cached.replay(&key) {
            Some(response) => {
                debug!(key = %key, "Response cache hit");
                return response;
            }
            None => debug!(key = %key, "Ignoring unreplayable cached response"),
        }
    }

    let response = next.run(request).await;
    let (parts, body) = response.into_parts();

    // Streamed bodies without a known bound pass through uncaptured
    let within_limit = body
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= cache.max_body_bytes as u64);

    if !(cache.cacheable)(parts.status) || !within_limit {
        if !within_limit {
            debug!(key = %key, "Response body unbounded or too large to cache");
        }
        let mut response = Response::from_parts(parts, body);
        mark(&mut response, CacheStatus::Miss, &key);
        return response;
    }

    let bytes = match to_bytes(body, cache.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to read handler response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let captured =
        CachedResponse::capture(parts.status, parts.headers.get(header::CONTENT_TYPE), &bytes);
    cache.store.set(&key, &captured, cache.ttl).await;

    let mut response = Response::from_parts(parts, Body::from(bytes));
    mark(&mut response, CacheStatus::Miss, &key);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{middleware::from_fn_with_state, routing::get, Router};
    use tower::ServiceExt;

    use crate::infrastructure::cache::InMemoryCache;

    fn store() -> CacheStore {
        CacheStore::new(Arc::new(InMemoryCache::default()))
    }

    fn acme() -> TenantId {
        TenantId::new("acme").unwrap()
    }

    fn app(cache: ResponseCache, calls: Arc<AtomicUsize>) -> Router {
        let list_calls = Arc::clone(&calls);
        let create_calls = Arc::clone(&calls);
        Router::new()
            .route(
                "/v1/properties",
                get(move || {
                    let n = list_calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        (
                            [(header::CONTENT_TYPE, "application/json")],
                            format!(r#"{{"items":[],"call":{}}}"#, n),
                        )
                    }
                })
                .post(move || {
                    create_calls.fetch_add(1, Ordering::SeqCst);
                    async { StatusCode::CREATED }
                }),
            )
            .route(
                "/v1/missing",
                get(|| async { (StatusCode::NOT_FOUND, "no such page") }),
            )
            .layer(from_fn_with_state(cache, response_cache_middleware))
    }

    fn get_request(uri: &str, tenant: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(tenant) = tenant {
            builder = builder.header("x-tenant-id", tenant);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[test]
    fn test_key_sorts_query_and_adds_user() {
        let a: Uri = "/v1/properties/?status=vacant&page=2".parse().unwrap();
        let b: Uri = "/properties?page=2&status=vacant".parse().unwrap();

        let key_a = response_cache_key(&acme(), None, &a);
        assert_eq!(key_a, "api:acme:properties:_user=anon&page=2&status=vacant");
        assert_eq!(key_a, response_cache_key(&acme(), None, &b));
    }

    #[test]
    fn test_key_separates_users_and_tenants() {
        let uri: Uri = "/v1/dashboard".parse().unwrap();
        let globex = TenantId::new("globex").unwrap();

        let anon = response_cache_key(&acme(), None, &uri);
        let user = response_cache_key(&acme(), Some("u1"), &uri);
        let other = response_cache_key(&globex, None, &uri);

        assert_ne!(anon, user);
        assert_ne!(anon, other);
        assert!(other.starts_with("api:globex:dashboard"));
    }

    #[test]
    fn test_key_hashes_unsafe_query_values() {
        let uri: Uri = "/v1/properties?q=big%20house".parse().unwrap();
        let key = response_cache_key(&acme(), None, &uri);

        assert!(key.starts_with("api:acme:properties:h"));
        assert!(!key.contains(' '));
    }

    #[tokio::test]
    async fn test_miss_then_byte_identical_hit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ResponseCache::new(store(), Duration::from_secs(60));
        let app = app(cache, Arc::clone(&calls));

        let first = app
            .clone()
            .oneshot(get_request("/v1/properties?page=1", Some("acme")))
            .await
            .unwrap();
        assert_eq!(first.headers()[CACHE_STATUS_HEADER], "MISS");
        let key = first.headers()[CACHE_KEY_HEADER].to_str().unwrap().to_string();
        let first_body = body_bytes(first).await;

        let second = app
            .oneshot(get_request("/v1/properties?page=1", Some("acme")))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.headers()[CACHE_STATUS_HEADER], "HIT");
        assert_eq!(second.headers()[CACHE_KEY_HEADER], key.as_str());
        assert_eq!(second.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(body_bytes(second).await, first_body);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_get_bypasses_store() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = store();
        let cache = ResponseCache::new(store.clone(), Duration::from_secs(60));
        let app = app(cache, Arc::clone(&calls));

        let request = Request::builder()
            .method("POST")
            .uri("/v1/properties")
            .header("x-tenant-id", "acme")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get(CACHE_STATUS_HEADER).is_none());
        let stats = store.stats();
        assert_eq!(stats.hits + stats.misses + stats.sets, 0);
    }

    #[tokio::test]
    async fn test_request_without_tenant_bypasses_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ResponseCache::new(store(), Duration::from_secs(60));
        let app = app(cache, Arc::clone(&calls));

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(get_request("/v1/properties", None))
                .await
                .unwrap();
            assert!(response.headers().get(CACHE_STATUS_HEADER).is_none());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_status_is_not_stored() {
        let store = store();
        let cache = ResponseCache::new(store.clone(), Duration::from_secs(60));
        let app = app(cache, Arc::new(AtomicUsize::new(0)));

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(get_request("/v1/missing", Some("acme")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(response.headers()[CACHE_STATUS_HEADER], "MISS");
        }

        assert_eq!(store.stats().sets, 0);
    }

    #[tokio::test]
    async fn test_oversized_body_is_served_but_not_stored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = store();
        let cache = ResponseCache::new(store.clone(), Duration::from_secs(60)).with_max_body_bytes(4);
        let app = app(cache, Arc::clone(&calls));

        let response = app
            .clone()
            .oneshot(get_request("/v1/properties", Some("acme")))
            .await
            .unwrap();
        assert_eq!(response.headers()[CACHE_STATUS_HEADER], "MISS");
        assert!(!body_bytes(response).await.is_empty());

        app.oneshot(get_request("/v1/properties", Some("acme")))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.stats().sets, 0);
    }

    #[tokio::test]
    async fn test_streamed_body_is_served_but_not_stored() {
        let store = store();
        let app = Router::new()
            .route(
                "/v1/payments/export",
                get(|| async {
                    let chunks = futures::stream::iter([
                        Ok::<_, std::io::Error>("rent-1,"),
                        Ok("rent-2"),
                    ]);
                    Body::from_stream(chunks)
                }),
            )
            .layer(from_fn_with_state(
                ResponseCache::new(store.clone(), Duration::from_secs(60)),
                response_cache_middleware,
            ));

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(get_request("/v1/payments/export", Some("acme")))
                .await
                .unwrap();
            assert_eq!(response.headers()[CACHE_STATUS_HEADER], "MISS");
            assert_eq!(body_bytes(response).await, b"rent-1,rent-2");
        }

        assert_eq!(store.stats().sets, 0);
        assert_eq!(store.stats().hits, 0);
    }

    #[tokio::test]
    async fn test_custom_key_fn() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ResponseCache::new(store(), Duration::from_secs(60)).with_key_fn(|ctx, _uri| {
            ctx.tenant
                .as_ref()
                .map(|t| format!("api:{}:properties:shared", t))
        });
        let app = app(cache, Arc::clone(&calls));

        app.clone()
            .oneshot(get_request("/v1/properties?page=1", Some("acme")))
            .await
            .unwrap();
        let response = app
            .oneshot(get_request("/v1/properties?page=2", Some("acme")))
            .await
            .unwrap();

        assert_eq!(response.headers()[CACHE_STATUS_HEADER], "HIT");
        assert_eq!(response.headers()[CACHE_KEY_HEADER], "api:acme:properties:shared");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_replay_restores_status_and_type() {
        let captured = CachedResponse::capture(
            StatusCode::ACCEPTED,
            Some(&HeaderValue::from_static("text/plain")),
            b"queued",
        );
        let response = captured.replay("api:acme:jobs:_user=anon").unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(response.headers()[CACHE_STATUS_HEADER], "HIT");
    }
}
