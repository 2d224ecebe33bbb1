//! Rental Management Cache Layer
//!
//! Tenant-scoped caching for a multi-tenant rental-property backend:
//! - Read-through response cache middleware with HIT/MISS signaling
//! - Typed cache for dashboard-style aggregates with miss coalescing
//! - Pattern-based invalidation driven by writes
//! - Daily and on-demand cache warming with progress tracking

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::middleware::response_cache::{ResponseCache, DEFAULT_MAX_BODY_BYTES};
use api::state::AppState;
use domain::{AggregateSource, Namespace};
use infrastructure::{
    cache::{CacheFactory, CacheStore},
    services::{AggregateCache, CacheManager, CacheManagerConfig, WarmingConfig, WarmingScheduler},
    source::{HttpAggregateSource, HttpAggregateSourceConfig},
};
use tracing::info;

/// Create the application state from configuration
pub fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let source = Arc::new(HttpAggregateSource::new(HttpAggregateSourceConfig {
        base_url: config.source.base_url.clone(),
        timeout: config.source.timeout(),
    })?);

    let manager = create_cache_manager(config, source)?;
    Ok(AppState::new(manager))
}

/// Wires store, aggregate cache, warming scheduler and manager together
pub fn create_cache_manager(
    config: &AppConfig,
    source: Arc<dyn AggregateSource>,
) -> anyhow::Result<Arc<CacheManager>> {
    let backend = CacheFactory::new().create(&config.cache)?;
    let store = CacheStore::new(backend).with_operation_timeout(config.cache.operation_timeout());

    let aggregates = Arc::new(
        AggregateCache::new(store, config.cache.ttl_policy()?, source)
            .with_coalescing(config.cache.coalesce_misses),
    );

    let warming = Arc::new(WarmingScheduler::new(
        Arc::clone(&aggregates),
        WarmingConfig {
            daily_at: config.warming.daily_time()?,
            list_page_limit: config.warming.list_page_limit,
            recent_payments_limit: config.warming.recent_payments_limit,
        },
    ));

    let manager_config = CacheManagerConfig {
        health_check_interval: config.manager.health_check_interval(),
        cleanup_interval: config.manager.cleanup_interval(),
        cleanup_namespaces: config.manager.cleanup_namespaces()?,
        daily_warming: config.warming.enabled,
    };

    info!(
        backend = ?config.cache.backend,
        coalesce_misses = config.cache.coalesce_misses,
        daily_warming = config.warming.enabled,
        "Cache layer initialized"
    );

    Ok(Arc::new(CacheManager::new(aggregates, warming, manager_config)))
}

/// Response cache for business routes, using the configured `api` TTL and body limit
pub fn create_response_cache(config: &AppConfig, store: CacheStore) -> anyhow::Result<ResponseCache> {
    let ttl = config.cache.ttl_policy()?.ttl_for(Namespace::Api);
    let max_body = match config.cache.response_max_body_bytes {
        0 => DEFAULT_MAX_BODY_BYTES,
        n => n,
    };

    Ok(ResponseCache::new(store, ttl).with_max_body_bytes(max_body))
}
