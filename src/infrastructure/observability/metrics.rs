//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::MetricsSettings;

static TENANT_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/tenants/[^/]+").expect("valid tenant segment regex"));

static NUMERIC_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+(/|$)").expect("valid numeric segment regex"));

/// Prometheus metrics handle for serving the metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Installs the global Prometheus recorder
pub fn init_metrics(settings: &MetricsSettings) -> Option<PrometheusMetrics> {
    if !settings.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("rental_cache_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::info!("Prometheus metrics initialized at {}", settings.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Router serving the exposition at the configured path
pub fn create_metrics_router(metrics: PrometheusMetrics, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record an HTTP request metric
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

/// Record one cache store operation and its outcome (hit, miss, ok, error, ...)
pub fn record_cache_operation(operation: &'static str, outcome: &'static str) {
    counter!(
        "cache_operations_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record keys removed by an invalidation
pub fn record_invalidation(source: &'static str, deleted: usize) {
    counter!("cache_invalidations_total", "source" => source).increment(1);
    counter!("cache_invalidated_keys_total", "source" => source).increment(deleted as u64);
}

/// Record a finished warming run
pub fn record_warming_run(outcome: &'static str, duration: Duration) {
    counter!("cache_warming_runs_total", "outcome" => outcome).increment(1);
    histogram!("cache_warming_duration_seconds").record(duration.as_secs_f64());
}

/// Record the latest health probe
pub fn record_cache_health(healthy: bool, latency_ms: u64) {
    gauge!("cache_healthy").set(if healthy { 1.0 } else { 0.0 });
    gauge!("cache_health_latency_ms").set(latency_ms as f64);
}

/// Sanitize URL path for metric labels (drop tenant ids and numeric ids)
fn sanitize_path(path: &str) -> String {
    let path = TENANT_SEGMENT.replace_all(path, "/tenants/{tenant_id}");
    let path = NUMERIC_SEGMENT.replace_all(&path, "/{id}$1");

    if path.len() > 50 {
        path.chars().take(50).collect()
    } else {
        path.to_string()
    }
}
