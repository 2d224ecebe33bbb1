//! Cache store - typed, fail-soft access to a cache backend

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::cache::{Cache, CacheLookup, InvalidationPattern, Namespace, MIN_TTL};
use crate::domain::DomainError;

use super::stats::{CacheStats, CacheStatsSnapshot};

/// Default deadline for a single store operation
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Store reachability as reported by a health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheHealthStatus {
    Healthy,
    Unhealthy,
}

/// Result of [`CacheStore::health_check`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheHealth {
    pub status: CacheHealthStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl CacheHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == CacheHealthStatus::Healthy
    }
}

/// Fail-soft wrapper over a [`Cache`] backend.
///
/// Values are stored as JSON text. Every call runs under its own timeout;
/// backend errors and timeouts are logged, counted and turned into a miss or
/// a no-op. Nothing here returns an error to the caller.
#[derive(Debug, Clone)]
pub struct CacheStore {
    backend: Arc<dyn Cache>,
    stats: Arc<CacheStats>,
    operation_timeout: Duration,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn Cache>) -> Self {
        Self {
            backend,
            stats: Arc::new(CacheStats::new()),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Shares counters with another owner
    pub fn with_stats(mut self, stats: Arc<CacheStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn backend(&self) -> &Arc<dyn Cache> {
        &self.backend
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn stats_handle(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    async fn run<T, F>(&self, operation: &'static str, target: &str, fut: F) -> Result<T, String>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        let result = match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "{} timed out after {}ms",
                operation,
                self.operation_timeout.as_millis()
            ),
        };

        self.stats.record_error(operation);
        warn!(operation, target, error = %result, "Cache store unavailable, degrading");
        Err(result)
    }

    /// Reads and decodes a value
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheLookup<T> {
        let raw = match self.run("get", key, self.backend.get_raw(key)).await {
            Ok(raw) => raw,
            Err(reason) => return CacheLookup::StoreError(reason),
        };

        let Some(raw) = raw else {
            self.stats.record_miss();
            debug!(key, "Cache miss");
            return CacheLookup::Miss;
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                self.stats.record_hit();
                debug!(key, "Cache hit");
                CacheLookup::Hit(value)
            }
            Err(e) => {
                self.stats.record_miss();
                debug!(key, error = %e, "Undecodable cache entry, treating as miss");
                CacheLookup::Miss
            }
        }
    }

    /// Encodes and writes a value; `false` if nothing was stored
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                self.stats.record_error("set");
                warn!(key, error = %e, "Failed to serialize cache value");
                return false;
            }
        };

        let ttl = ttl.max(MIN_TTL);

        match self.run("set", key, self.backend.set_raw(key, &json, ttl)).await {
            Ok(()) => {
                self.stats.record_set();
                debug!(key, ttl_secs = ttl.as_secs(), "Cache set");
                true
            }
            Err(_) => false,
        }
    }

    /// Removes one key; returns the number of keys removed
    pub async fn delete(&self, key: &str) -> usize {
        match self.run("delete", key, self.backend.delete(key)).await {
            Ok(true) => {
                self.stats.record_deletes(1);
                1
            }
            Ok(false) => 0,
            Err(_) => 0,
        }
    }

    /// Removes every key matching a tenant-scoped pattern
    pub async fn delete_pattern(&self, pattern: &InvalidationPattern) -> usize {
        self.delete_matching("delete_pattern", pattern.as_str()).await
    }

    /// Removes every key of a namespace across all tenants
    pub async fn purge_namespace(&self, namespace: Namespace) -> usize {
        let pattern = format!("{}:*", namespace.as_str());
        self.delete_matching("purge_namespace", &pattern).await
    }

    async fn delete_matching(&self, operation: &'static str, pattern: &str) -> usize {
        match self
            .run(operation, pattern, self.backend.delete_pattern(pattern))
            .await
        {
            Ok(count) => {
                self.stats.record_deletes(count);
                debug!(pattern, count, "Cache keys deleted");
                count
            }
            Err(_) => 0,
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.run("exists", key, self.backend.exists(key))
            .await
            .unwrap_or(false)
    }

    pub async fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        self.run("ttl", key, self.backend.ttl(key))
            .await
            .ok()
            .flatten()
    }

    /// Approximate number of stored entries
    pub async fn size(&self) -> Option<usize> {
        self.run("size", "*", self.backend.size()).await.ok()
    }

    /// Round-trip probe of the backend
    pub async fn health_check(&self) -> CacheHealth {
        let start = Instant::now();
        let result = tokio::time::timeout(self.operation_timeout, self.backend.ping()).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (status, message) = match result {
            Ok(Ok(())) => (CacheHealthStatus::Healthy, None),
            Ok(Err(e)) => (CacheHealthStatus::Unhealthy, Some(e.to_string())),
            Err(_) => (
                CacheHealthStatus::Unhealthy,
                Some(format!(
                    "ping timed out after {}ms",
                    self.operation_timeout.as_millis()
                )),
            ),
        };

        if let Some(message) = &message {
            warn!(latency_ms, error = %message, "Cache health check failed");
        }

        CacheHealth {
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}
