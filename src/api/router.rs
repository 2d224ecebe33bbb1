use axum::{middleware::from_fn, middleware::from_fn_with_state, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::admin;
use super::health;
use super::middleware::{
    invalidation_middleware, logging_middleware, metrics_middleware, response_cache_middleware,
    InvalidationTrigger, ResponseCache,
};
use super::state::AppState;

/// Create a minimal router without state (liveness only)
pub fn create_router() -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::live_check))
        .layer(TraceLayer::new_for_http())
}

/// Create the admin router with application state
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .nest("/admin", admin::create_admin_router())
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Wraps business routes with the response cache and the invalidation trigger.
///
/// The trigger sits outside the cache so a write is invalidated after its
/// handler has completed.
pub fn with_cache_layers<S>(
    routes: Router<S>,
    cache: ResponseCache,
    trigger: InvalidationTrigger,
) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    routes
        .layer(from_fn_with_state(cache, response_cache_middleware))
        .layer(from_fn_with_state(trigger, invalidation_middleware))
}
