//! Cache layer services

mod aggregate_cache;
mod cache_manager;
mod warming;

pub use aggregate_cache::{
    dashboard_key, financial_summary_key, property_list_key, recent_payments_key,
    tenant_list_key, AggregateCache, Cached, InvalidationReport, PatternOutcome,
};
pub use cache_manager::{
    CacheManager, CacheManagerConfig, CacheStatistics, NamespacePurge, PurgeReport,
};
pub use warming::{duration_until_next, WarmingConfig, WarmingScheduler};
