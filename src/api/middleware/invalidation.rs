//! Deletes stale cache entries after successful writes

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, Uri},
    middleware::Next,
    response::Response,
};
use futures::future::join_all;
use tracing::{debug, error, info};

use crate::domain::cache::{InvalidationPattern, Namespace, ResourceType};
use crate::domain::DomainError;
use crate::infrastructure::cache::CacheStore;
use crate::infrastructure::observability::record_invalidation;

use super::request_context::RequestContext;

/// Produces raw patterns from a completed request
pub type DynamicPatternFn =
    Arc<dyn Fn(&RequestContext, &Method, &Uri) -> Vec<String> + Send + Sync>;

/// What a successful write invalidates
#[derive(Clone)]
pub enum InvalidationRule {
    /// Full fan-out for a changed resource type in the request's tenant
    Resource(ResourceType),
    /// One namespace of the request's tenant, optionally narrowed to a key type
    Pattern {
        namespace: Namespace,
        key_type: Option<String>,
    },
    /// Patterns computed from the request. Each must be scoped to the
    /// request's tenant or it is refused.
    Dynamic(DynamicPatternFn),
}

impl std::fmt::Debug for InvalidationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resource(resource) => f.debug_tuple("Resource").field(resource).finish(),
            Self::Pattern {
                namespace,
                key_type,
            } => f
                .debug_struct("Pattern")
                .field("namespace", namespace)
                .field("key_type", key_type)
                .finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Shared state of [`invalidation_middleware`]
#[derive(Debug, Clone)]
pub struct InvalidationTrigger {
    store: CacheStore,
    rules: Arc<Vec<InvalidationRule>>,
}

impl InvalidationTrigger {
    pub fn new(store: CacheStore) -> Self {
        Self {
            store,
            rules: Arc::new(Vec::new()),
        }
    }

    pub fn with_rule(mut self, rule: InvalidationRule) -> Self {
        Arc::make_mut(&mut self.rules).push(rule);
        self
    }

    pub fn on_resource(self, resource: ResourceType) -> Self {
        self.with_rule(InvalidationRule::Resource(resource))
    }

    pub fn on_pattern(self, namespace: Namespace, key_type: Option<&str>) -> Self {
        self.with_rule(InvalidationRule::Pattern {
            namespace,
            key_type: key_type.map(str::to_string),
        })
    }

    pub fn on_request<F>(self, patterns: F) -> Self
    where
        F: Fn(&RequestContext, &Method, &Uri) -> Vec<String> + Send + Sync + 'static,
    {
        self.with_rule(InvalidationRule::Dynamic(Arc::new(patterns)))
    }

    /// Resolves every rule against a request. Patterns that cannot be
    /// resolved are logged and left out.
    pub fn resolve(
        &self,
        ctx: &RequestContext,
        method: &Method,
        uri: &Uri,
    ) -> Vec<InvalidationPattern> {
        let mut resolved = Vec::new();

        for rule in self.rules.iter() {
            for outcome in resolve_rule(rule, ctx, method, uri) {
                match outcome {
                    Ok(pattern) => resolved.push(pattern),
                    Err(e) => error!(error = %e, path = %uri.path(), "Refusing invalidation"),
                }
            }
        }

        resolved.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        resolved.dedup();
        resolved
    }

    /// Deletes all patterns concurrently and returns the number of keys removed
    pub async fn run(&self, patterns: &[InvalidationPattern]) -> usize {
        let deletions = patterns
            .iter()
            .map(|pattern| self.store.delete_pattern(pattern));

        join_all(deletions).await.into_iter().sum()
    }
}

fn resolve_rule(
    rule: &InvalidationRule,
    ctx: &RequestContext,
    method: &Method,
    uri: &Uri,
) -> Vec<Result<InvalidationPattern, DomainError>> {
    match rule {
        InvalidationRule::Resource(resource) => match &ctx.tenant {
            Some(tenant) => match resource.invalidation_patterns(tenant) {
                Ok(patterns) => patterns.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            },
            None => {
                debug!(resource = %resource, "No tenant on request, skipping invalidation");
                Vec::new()
            }
        },
        InvalidationRule::Pattern {
            namespace,
            key_type,
        } => match &ctx.tenant {
            Some(tenant) => vec![InvalidationPattern::new(*namespace, tenant, key_type.as_deref())],
            None => {
                debug!(namespace = %namespace, "No tenant on request, skipping invalidation");
                Vec::new()
            }
        },
        InvalidationRule::Dynamic(patterns) => patterns(ctx, method, uri)
            .iter()
            .map(|raw| scoped_to_request(raw, ctx))
            .collect(),
    }
}

fn scoped_to_request(raw: &str, ctx: &RequestContext) -> Result<InvalidationPattern, DomainError> {
    let pattern = InvalidationPattern::parse(raw)?;

    match &ctx.tenant {
        Some(tenant) if tenant == pattern.tenant() => Ok(pattern),
        Some(_) => Err(DomainError::invalidation_pattern(
            raw,
            "pattern is scoped to another tenant",
        )),
        None => Err(DomainError::invalidation_pattern(
            raw,
            "request carries no tenant",
        )),
    }
}

fn is_mutating(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Runs the configured invalidations after a mutating request succeeds.
///
/// Failed handlers invalidate nothing. Store failures and refused patterns
/// are logged; the handler's response is returned unchanged either way.
pub async fn invalidation_middleware(
    State(trigger): State<InvalidationTrigger>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    if !is_mutating(&method) {
        return next.run(request).await;
    }

    let uri = request.uri().clone();
    let ctx = RequestContext::from_headers(request.headers());

    let response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }

    let patterns = trigger.resolve(&ctx, &method, &uri);
    if patterns.is_empty() {
        return response;
    }

    let deleted = trigger.run(&patterns).await;
    record_invalidation("request", deleted);
    info!(
        method = %method,
        path = %uri.path(),
        patterns = patterns.len(),
        deleted,
        "Invalidated cache after write"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{
        http::StatusCode,
        middleware::from_fn_with_state,
        routing::{get, post},
        Router,
    };
    use tower::ServiceExt;

    use crate::api::middleware::response_cache::{
        response_cache_middleware, ResponseCache, CACHE_KEY_HEADER, CACHE_STATUS_HEADER,
    };
    use crate::domain::tenant::TenantId;
    use crate::infrastructure::cache::InMemoryCache;

    const TTL: Duration = Duration::from_secs(60);

    async fn seeded_store() -> CacheStore {
        let store = CacheStore::new(Arc::new(InMemoryCache::default()));
        for key in [
            "dashboard:acme:stats",
            "properties:acme:list:page:1:limit:50",
            "tenants:acme:list:page:1:limit:50",
            "api:acme:properties:_user=anon",
            "dashboard:globex:stats",
            "properties:globex:list:page:1:limit:50",
        ] {
            assert!(store.set(key, &serde_json::json!({ "k": key }), TTL).await);
        }
        store
    }

    fn app(trigger: InvalidationTrigger) -> Router {
        Router::new()
            .route(
                "/v1/properties",
                post(|| async { StatusCode::CREATED }).put(|| async { StatusCode::OK }),
            )
            .route(
                "/v1/properties/broken",
                post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            )
            .route("/v1/properties/list", get(|| async { "[]" }))
            .layer(from_fn_with_state(trigger, invalidation_middleware))
    }

    fn request(method: &str, uri: &str, tenant: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-tenant-id", tenant)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_successful_write_fans_out_for_tenant() {
        let store = seeded_store().await;
        let trigger = InvalidationTrigger::new(store.clone()).on_resource(ResourceType::Property);

        let response = app(trigger)
            .oneshot(request("POST", "/v1/properties", "acme"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        assert!(!store.exists("dashboard:acme:stats").await);
        assert!(!store.exists("properties:acme:list:page:1:limit:50").await);
        assert!(!store.exists("api:acme:properties:_user=anon").await);
        assert!(store.exists("tenants:acme:list:page:1:limit:50").await);
        assert!(store.exists("dashboard:globex:stats").await);
        assert!(store.exists("properties:globex:list:page:1:limit:50").await);
    }

    #[tokio::test]
    async fn test_failed_write_invalidates_nothing() {
        let store = seeded_store().await;
        let trigger = InvalidationTrigger::new(store.clone()).on_resource(ResourceType::Property);

        let response = app(trigger)
            .oneshot(request("POST", "/v1/properties/broken", "acme"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(store.exists("dashboard:acme:stats").await);
        assert_eq!(store.stats().deletes, 0);
    }

    #[tokio::test]
    async fn test_reads_do_not_invalidate() {
        let store = seeded_store().await;
        let trigger = InvalidationTrigger::new(store.clone()).on_resource(ResourceType::Property);

        app(trigger)
            .oneshot(request("GET", "/v1/properties/list", "acme"))
            .await
            .unwrap();

        assert!(store.exists("properties:acme:list:page:1:limit:50").await);
    }

    #[tokio::test]
    async fn test_static_pattern_rule() {
        let store = seeded_store().await;
        let trigger =
            InvalidationTrigger::new(store.clone()).on_pattern(Namespace::Tenants, Some("list"));

        app(trigger)
            .oneshot(request("POST", "/v1/properties", "acme"))
            .await
            .unwrap();

        assert!(!store.exists("tenants:acme:list:page:1:limit:50").await);
        assert!(store.exists("dashboard:acme:stats").await);
    }

    #[tokio::test]
    async fn test_dynamic_pattern_for_other_tenant_is_refused() {
        let store = seeded_store().await;
        let trigger = InvalidationTrigger::new(store.clone())
            .on_request(|_, _, _| vec!["properties:globex:*".to_string(), "*".to_string()]);

        let response = app(trigger)
            .oneshot(request("POST", "/v1/properties", "acme"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(store.exists("properties:globex:list:page:1:limit:50").await);
        assert!(store.exists("properties:acme:list:page:1:limit:50").await);
    }

    #[tokio::test]
    async fn test_refused_pattern_does_not_block_valid_ones() {
        let store = seeded_store().await;
        let trigger = InvalidationTrigger::new(store.clone()).on_request(|_, _, _| {
            vec!["dashboard:globex:*".to_string(), "dashboard:acme:*".to_string()]
        });

        app(trigger)
            .oneshot(request("PUT", "/v1/properties", "acme"))
            .await
            .unwrap();

        assert!(!store.exists("dashboard:acme:stats").await);
        assert!(store.exists("dashboard:globex:stats").await);
    }

    #[tokio::test]
    async fn test_dynamic_pattern_for_own_tenant_runs() {
        let store = seeded_store().await;
        let trigger = InvalidationTrigger::new(store.clone()).on_request(|ctx, _, _| {
            ctx.tenant
                .iter()
                .map(|t| format!("properties:{}:list*", t))
                .collect()
        });

        app(trigger)
            .oneshot(request("POST", "/v1/properties", "acme"))
            .await
            .unwrap();

        assert!(!store.exists("properties:acme:list:page:1:limit:50").await);
        assert!(store.exists("properties:globex:list:page:1:limit:50").await);
    }

    #[test]
    fn test_resolve_deduplicates() {
        let store = CacheStore::new(Arc::new(InMemoryCache::default()));
        let trigger = InvalidationTrigger::new(store)
            .on_resource(ResourceType::Property)
            .on_pattern(Namespace::Dashboard, None);
        let ctx = RequestContext {
            tenant: Some(TenantId::new("acme").unwrap()),
            user_id: None,
        };
        let uri: Uri = "/v1/properties".parse().unwrap();

        let patterns = trigger.resolve(&ctx, &Method::POST, &uri);
        let dashboard = patterns
            .iter()
            .filter(|p| p.as_str() == "dashboard:acme:*")
            .count();

        assert_eq!(dashboard, 1);
        assert!(patterns.iter().all(|p| p.tenant().as_str() == "acme"));
    }

    #[tokio::test]
    async fn test_write_invalidates_cached_response() {
        let store = CacheStore::new(Arc::new(InMemoryCache::default()));
        let app = Router::new()
            .route(
                "/v1/properties",
                get(|| async { r#"{"items":[1,2]}"# }).post(|| async { StatusCode::CREATED }),
            )
            .layer(from_fn_with_state(
                ResponseCache::new(store.clone(), TTL),
                response_cache_middleware,
            ))
            .layer(from_fn_with_state(
                InvalidationTrigger::new(store.clone()).on_resource(ResourceType::Property),
                invalidation_middleware,
            ));

        let status_of = |response: Response| {
            response.headers()[CACHE_STATUS_HEADER]
                .to_str()
                .unwrap()
                .to_string()
        };

        let first = app.clone().oneshot(request("GET", "/v1/properties", "acme")).await.unwrap();
        assert_eq!(status_of(first), "MISS");
        let second = app.clone().oneshot(request("GET", "/v1/properties", "acme")).await.unwrap();
        assert_eq!(status_of(second), "HIT");

        app.clone()
            .oneshot(request("POST", "/v1/properties", "acme"))
            .await
            .unwrap();

        let third = app.oneshot(request("GET", "/v1/properties", "acme")).await.unwrap();
        assert_eq!(status_of(third), "MISS");
    }

    #[tokio::test]
    async fn test_write_invalidates_cached_response_with_encoded_segment() {
        let store = CacheStore::new(Arc::new(InMemoryCache::default()));
        let app = Router::new()
            .route("/v1/properties", post(|| async { StatusCode::CREATED }))
            .route("/v1/properties/{id}", get(|| async { r#"{"id":"main st"}"# }))
            .layer(from_fn_with_state(
                ResponseCache::new(store.clone(), TTL),
                response_cache_middleware,
            ))
            .layer(from_fn_with_state(
                InvalidationTrigger::new(store.clone()).on_resource(ResourceType::Property),
                invalidation_middleware,
            ));

        let uri = "/v1/properties/main%20st";
        let first = app.clone().oneshot(request("GET", uri, "acme")).await.unwrap();
        assert_eq!(first.headers()[CACHE_STATUS_HEADER], "MISS");
        let key = first.headers()[CACHE_KEY_HEADER].to_str().unwrap().to_string();
        assert!(key.starts_with("api:acme:properties/h"));

        let second = app.clone().oneshot(request("GET", uri, "acme")).await.unwrap();
        assert_eq!(second.headers()[CACHE_STATUS_HEADER], "HIT");

        app.clone()
            .oneshot(request("POST", "/v1/properties", "acme"))
            .await
            .unwrap();

        assert!(!store.exists(&key).await);
        let third = app.oneshot(request("GET", uri, "acme")).await.unwrap();
        assert_eq!(third.headers()[CACHE_STATUS_HEADER], "MISS");
    }
}
