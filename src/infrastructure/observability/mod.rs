//! Observability infrastructure - Prometheus metrics

mod metrics;

pub use metrics::{
    create_metrics_router, init_metrics, record_cache_health, record_cache_operation,
    record_http_request, record_invalidation, record_warming_run, PrometheusMetrics,
};
