//! Cache manager - background maintenance and administrative operations

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::cache::{Namespace, ResourceType};
use crate::domain::tenant::TenantId;
use crate::domain::warming::{WarmingRunSummary, WarmingSnapshot, WarmingStage};
use crate::domain::DomainError;
use crate::infrastructure::cache::{CacheHealth, CacheStatsSnapshot, CacheStore};
use crate::infrastructure::observability::{record_cache_health, record_invalidation};

use super::aggregate_cache::{AggregateCache, InvalidationReport};
use super::warming::WarmingScheduler;

/// Background task intervals and cleanup scope
#[derive(Debug, Clone)]
pub struct CacheManagerConfig {
    pub health_check_interval: Duration,
    pub cleanup_interval: Duration,
    /// Namespaces purged on every cleanup tick
    pub cleanup_namespaces: Vec<Namespace>,
    /// Start the daily warming loop with the other tasks
    pub daily_warming: bool,
}

impl Default for CacheManagerConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(3600),
            cleanup_namespaces: Vec::new(),
            daily_warming: true,
        }
    }
}

/// Store statistics with the entry count
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatistics {
    #[serde(flatten)]
    pub counters: CacheStatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    pub warming_running: bool,
}

/// Keys removed by a namespace-wide purge
#[derive(Debug, Clone, Serialize)]
pub struct PurgeReport {
    pub namespaces: Vec<NamespacePurge>,
    pub total_deleted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamespacePurge {
    pub namespace: Namespace,
    pub deleted: usize,
}

/// Owns the cache layer's background tasks and admin entry points
pub struct CacheManager {
    store: CacheStore,
    aggregates: Arc<AggregateCache>,
    warming: Arc<WarmingScheduler>,
    config: CacheManagerConfig,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    last_health: Arc<Mutex<Option<CacheHealth>>>,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

impl CacheManager {
    pub fn new(
        aggregates: Arc<AggregateCache>,
        warming: Arc<WarmingScheduler>,
        config: CacheManagerConfig,
    ) -> Self {
        Self {
            store: aggregates.store().clone(),
            aggregates,
            warming,
            config,
            tasks: Mutex::new(Vec::new()),
            last_health: Arc::new(Mutex::new(None)),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn aggregates(&self) -> &Arc<AggregateCache> {
        &self.aggregates
    }

    pub fn warming(&self) -> &Arc<WarmingScheduler> {
        &self.warming
    }

    pub fn is_running(&self) -> bool {
        !self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Spawns the health probe, the cleanup loop and (if enabled) daily warming
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if !tasks.is_empty() {
            warn!("Cache manager already started");
            return;
        }

        tasks.push(self.spawn_health_loop());
        tasks.push(self.spawn_cleanup_loop());

        if self.config.daily_warming {
            tasks.push(Arc::clone(&self.warming).spawn_daily());
        }

        info!(
            health_check_interval_secs = self.config.health_check_interval.as_secs(),
            cleanup_interval_secs = self.config.cleanup_interval.as_secs(),
            daily_warming = self.config.daily_warming,
            "Cache manager started"
        );
    }

    /// Aborts every background task
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("Cache manager stopped");
    }

    fn spawn_health_loop(&self) -> JoinHandle<()> {
        let store = self.store.clone();
        let last_health = Arc::clone(&self.last_health);
        let period = self.config.health_check_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let health = probe(&store).await;
                *last_health.lock().unwrap_or_else(PoisonError::into_inner) = Some(health);
            }
        })
    }

    fn spawn_cleanup_loop(&self) -> JoinHandle<()> {
        let store = self.store.clone();
        let namespaces = self.config.cleanup_namespaces.clone();
        let period = self.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately; cleanup waits a full period
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let report = purge(&store, &namespaces, "cleanup").await;
                info!(deleted = report.total_deleted, "Periodic cache cleanup finished");
            }
        })
    }

    pub fn statistics(&self) -> CacheStatsSnapshot {
        self.store.stats()
    }

    /// Counters plus the backend's entry count
    pub async fn detailed_statistics(&self) -> CacheStatistics {
        CacheStatistics {
            counters: self.store.stats(),
            size: self.store.size().await,
            warming_running: self.warming.is_running(),
        }
    }

    /// Probes the store now
    pub async fn health_check(&self) -> CacheHealth {
        let health = probe(&self.store).await;
        *self.last_health.lock().unwrap_or_else(PoisonError::into_inner) = Some(health.clone());
        health
    }

    /// Result of the most recent probe, background or on demand
    pub fn last_health(&self) -> Option<CacheHealth> {
        self.last_health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Purges every namespace for every tenant
    pub async fn invalidate_all(&self) -> PurgeReport {
        let report = purge(&self.store, &Namespace::ALL, "admin").await;
        warn!(deleted = report.total_deleted, "Invalidated entire cache");
        report
    }

    /// Invalidates one tenant, narrowed to one resource's fan-out if given
    pub async fn invalidate_for_tenant(
        &self,
        tenant: &TenantId,
        resource: Option<ResourceType>,
    ) -> Result<InvalidationReport, DomainError> {
        match resource {
            Some(resource) => self.aggregates.invalidate_on_data_change(tenant, resource).await,
            None => self.aggregates.invalidate_tenant(tenant).await,
        }
    }

    /// Warms one tenant on a spawned task and waits for it.
    ///
    /// Dropping the returned future detaches the run instead of cancelling it.
    pub async fn warm_tenant(
        &self,
        tenant: &TenantId,
        stage: Option<WarmingStage>,
    ) -> Result<WarmingRunSummary, DomainError> {
        let run = self.warming.spawn_warm_tenant(tenant.clone(), stage)?;
        join_run(run).await
    }

    pub async fn warm_all(&self) -> Result<WarmingRunSummary, DomainError> {
        join_run(self.warming.spawn_warm_all()?).await
    }

    /// Starts a full warming run in the background.
    ///
    /// Fails immediately with a conflict if a run is already in progress.
    pub fn spawn_warm_all(&self) -> Result<JoinHandle<WarmingRunSummary>, DomainError> {
        self.warming.spawn_warm_all()
    }

    pub fn warming_progress(&self) -> WarmingSnapshot {
        self.warming.progress()
    }

    /// Runs the configured cleanup once
    pub async fn run_cleanup(&self) -> PurgeReport {
        purge(&self.store, &self.config.cleanup_namespaces, "cleanup").await
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        for task in self
            .tasks
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            task.abort();
        }
    }
}

async fn join_run(run: JoinHandle<WarmingRunSummary>) -> Result<WarmingRunSummary, DomainError> {
    run.await
        .map_err(|e| DomainError::internal(format!("Warming task failed: {}", e)))
}

async fn probe(store: &CacheStore) -> CacheHealth {
    let health = store.health_check().await;
    record_cache_health(health.is_healthy(), health.latency_ms);
    health
}

async fn purge(store: &CacheStore, namespaces: &[Namespace], source: &'static str) -> PurgeReport {
    let mut purged = Vec::with_capacity(namespaces.len());

    for &namespace in namespaces {
        let deleted = store.purge_namespace(namespace).await;
        purged.push(NamespacePurge { namespace, deleted });
    }

    let total_deleted = purged.iter().map(|p| p.deleted).sum();
    record_invalidation(source, total_deleted);

    PurgeReport {
        namespaces: purged,
        total_deleted,
    }
}
