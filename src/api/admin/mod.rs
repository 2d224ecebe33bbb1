//! Admin API endpoints for operating the cache

pub mod cache;

use axum::{
    routing::{get, post},
    Router,
};

use super::state::AppState;

/// Create admin API router
pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        .route("/cache/stats", get(cache::get_statistics))
        .route("/cache/health", get(cache::health_check))
        .route("/cache/invalidate", post(cache::invalidate_all))
        .route("/cache/invalidate/pattern", post(cache::invalidate_pattern))
        .route(
            "/cache/tenants/{tenant_id}/invalidate",
            post(cache::invalidate_tenant),
        )
        .route("/cache/tenants/{tenant_id}/warm", post(cache::warm_tenant))
        .route("/cache/warm", post(cache::warm_all))
        .route("/cache/warming", get(cache::warming_progress))
}
