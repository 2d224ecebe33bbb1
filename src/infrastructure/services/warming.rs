//! Cache warming scheduler

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::domain::aggregate::{FinancialPeriod, PageQuery};
use crate::domain::tenant::TenantId;
use crate::domain::warming::{
    TenantProgress, WarmingFailure, WarmingRunStatus, WarmingRunSummary, WarmingSnapshot,
    WarmingStage,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_warming_run;

use super::aggregate_cache::AggregateCache;

/// Warming scheduler configuration
#[derive(Debug, Clone)]
pub struct WarmingConfig {
    /// Local time of day for the scheduled run
    pub daily_at: NaiveTime,
    /// Page size of the first list page that gets warmed
    pub list_page_limit: u32,
    pub recent_payments_limit: u32,
}

impl Default for WarmingConfig {
    fn default() -> Self {
        Self {
            daily_at: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or_default(),
            list_page_limit: 50,
            recent_payments_limit: 10,
        }
    }
}

#[derive(Debug)]
struct WarmingState {
    status: WarmingRunStatus,
    tenants: BTreeMap<TenantId, TenantProgress>,
    last_run: Option<WarmingRunSummary>,
}

impl Default for WarmingState {
    fn default() -> Self {
        Self {
            status: WarmingRunStatus::Idle,
            tenants: BTreeMap::new(),
            last_run: None,
        }
    }
}

/// Releases the run flag when a run ends, however it ends.
///
/// A run dropped before `finish_run` leaves no stale `Running` progress.
struct RunGuard {
    running: Arc<AtomicBool>,
    state: Arc<RwLock<WarmingState>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.status == WarmingRunStatus::Running {
                warn!(tenants = state.tenants.len(), "Warming run stopped before finishing");
                state.status = WarmingRunStatus::Failed;
                state.tenants.clear();
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Precomputes each tenant's hot aggregates.
///
/// Runs are mutually exclusive: a run requested while another is in
/// progress fails with a conflict. Stages call the aggregate source and
/// write through the aggregate cache setters. A failing stage fails only
/// its tenant; the run moves on to the next tenant.
pub struct WarmingScheduler {
    aggregates: Arc<AggregateCache>,
    config: WarmingConfig,
    running: Arc<AtomicBool>,
    state: Arc<RwLock<WarmingState>>,
}

impl std::fmt::Debug for WarmingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmingScheduler")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

impl WarmingScheduler {
    pub fn new(aggregates: Arc<AggregateCache>, config: WarmingConfig) -> Self {
        Self {
            aggregates,
            config,
            running: Arc::new(AtomicBool::new(false)),
            state: Arc::new(RwLock::new(WarmingState::default())),
        }
    }

    pub fn config(&self) -> &WarmingConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Read-only view of the current run and the last finished one
    pub fn progress(&self) -> WarmingSnapshot {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        WarmingSnapshot {
            status: state.status,
            tenants: state.tenants.values().cloned().collect(),
            last_run: state.last_run.clone(),
        }
    }

    fn try_start(&self) -> Result<RunGuard, DomainError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| RunGuard {
                running: Arc::clone(&self.running),
                state: Arc::clone(&self.state),
            })
            .map_err(|_| DomainError::conflict("A warming run is already in progress"))
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut WarmingState) -> R) -> R {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    fn update_tenant(&self, tenant: &TenantId, f: impl FnOnce(&mut TenantProgress)) {
        self.with_state(|state| {
            if let Some(progress) = state.tenants.get_mut(tenant) {
                f(progress);
            }
        });
    }

    /// Warms every tenant the source knows about
    pub async fn warm_all(&self) -> Result<WarmingRunSummary, DomainError> {
        let _guard = self.try_start()?;
        Ok(self.run_all().await)
    }

    /// Warms one tenant, optionally a single stage
    pub async fn warm_tenant(
        &self,
        tenant: &TenantId,
        stage: Option<WarmingStage>,
    ) -> Result<WarmingRunSummary, DomainError> {
        let _guard = self.try_start()?;
        Ok(self.run_tenant(tenant, stage).await)
    }

    /// Starts a full run on its own task.
    ///
    /// The run flag is taken before spawning, so a conflict is reported here
    /// and dropping the returned handle never cancels the run.
    pub fn spawn_warm_all(self: &Arc<Self>) -> Result<JoinHandle<WarmingRunSummary>, DomainError> {
        let guard = self.try_start()?;
        let scheduler = Arc::clone(self);

        Ok(tokio::spawn(async move {
            let _guard = guard;
            scheduler.run_all().await
        }))
    }

    /// Starts a tenant run on its own task, see [`Self::spawn_warm_all`]
    pub fn spawn_warm_tenant(
        self: &Arc<Self>,
        tenant: TenantId,
        stage: Option<WarmingStage>,
    ) -> Result<JoinHandle<WarmingRunSummary>, DomainError> {
        let guard = self.try_start()?;
        let scheduler = Arc::clone(self);

        Ok(tokio::spawn(async move {
            let _guard = guard;
            scheduler.run_tenant(&tenant, stage).await
        }))
    }

    async fn run_all(&self) -> WarmingRunSummary {
        let started_at = Utc::now();
        let clock = Instant::now();

        info!("Starting cache warming run for all tenants");
        self.with_state(|state| {
            state.status = WarmingRunStatus::Running;
            state.tenants.clear();
        });

        let tenants = match self.aggregates.source().list_tenants().await {
            Ok(tenants) => tenants,
            Err(e) => {
                error!(error = %e, "Could not enumerate tenants for warming");
                let summary = WarmingRunSummary {
                    status: WarmingRunStatus::Failed,
                    tenants_total: 0,
                    tenants_completed: 0,
                    tenants_failed: 0,
                    failures: Vec::new(),
                    error: Some(e.to_string()),
                    started_at,
                    finished_at: Utc::now(),
                };
                return self.finish_run(summary, clock);
            }
        };

        let summary = self.run_tenants(tenants, &WarmingStage::ALL, started_at).await;
        self.finish_run(summary, clock)
    }

    async fn run_tenant(&self, tenant: &TenantId, stage: Option<WarmingStage>) -> WarmingRunSummary {
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(tenant = %tenant, stage = ?stage, "Starting cache warming for tenant");
        self.with_state(|state| {
            state.status = WarmingRunStatus::Running;
            state.tenants.clear();
        });

        let stages: Vec<WarmingStage> = match stage {
            Some(stage) => vec![stage],
            None => WarmingStage::ALL.to_vec(),
        };

        let summary = self.run_tenants(vec![tenant.clone()], &stages, started_at).await;
        self.finish_run(summary, clock)
    }

    async fn run_tenants(
        &self,
        tenants: Vec<TenantId>,
        stages: &[WarmingStage],
        started_at: chrono::DateTime<Utc>,
    ) -> WarmingRunSummary {
        self.with_state(|state| {
            for tenant in &tenants {
                state
                    .tenants
                    .insert(tenant.clone(), TenantProgress::pending(tenant.clone(), stages.len()));
            }
        });

        let mut completed = 0;
        let mut failures = Vec::new();

        for tenant in &tenants {
            match self.warm_stages(tenant, stages).await {
                Ok(()) => completed += 1,
                Err((stage, e)) => failures.push(WarmingFailure {
                    tenant: tenant.clone(),
                    stage,
                    message: e.to_string(),
                }),
            }
        }

        WarmingRunSummary {
            status: WarmingRunStatus::Completed,
            tenants_total: tenants.len(),
            tenants_completed: completed,
            tenants_failed: failures.len(),
            failures,
            error: None,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn warm_stages(
        &self,
        tenant: &TenantId,
        stages: &[WarmingStage],
    ) -> Result<(), (WarmingStage, DomainError)> {
        for &stage in stages {
            self.update_tenant(tenant, |p| p.start_stage(stage));

            if let Err(e) = self.run_stage(tenant, stage).await {
                warn!(tenant = %tenant, stage = %stage, error = %e, "Warming stage failed");
                self.update_tenant(tenant, |p| p.fail(stage, e.to_string()));
                return Err((stage, e));
            }

            self.update_tenant(tenant, |p| p.finish_stage());
        }

        self.update_tenant(tenant, |p| p.complete());
        info!(tenant = %tenant, stages = stages.len(), "Tenant cache warmed");
        Ok(())
    }

    async fn run_stage(&self, tenant: &TenantId, stage: WarmingStage) -> Result<(), DomainError> {
        let source = self.aggregates.source();
        let cache = &self.aggregates;
        let fail = |message: String| DomainError::warming(tenant.as_str(), stage.as_str(), message);
        let rejected = || fail("cache store rejected the write".to_string());

        match stage {
            WarmingStage::Dashboard => {
                let stats = source.dashboard_stats(tenant).await.map_err(|e| fail(e.to_string()))?;
                if !cache.set_dashboard_stats(tenant, &stats, None).await {
                    return Err(rejected());
                }
            }
            WarmingStage::Lists => {
                let query = PageQuery::first_page(self.config.list_page_limit)?;

                let properties = source
                    .property_page(tenant, &query)
                    .await
                    .map_err(|e| fail(e.to_string()))?;
                if !cache.set_property_page(tenant, &query, &properties, None).await {
                    return Err(rejected());
                }

                let renters = source
                    .tenant_page(tenant, &query)
                    .await
                    .map_err(|e| fail(e.to_string()))?;
                if !cache.set_tenant_page(tenant, &query, &renters, None).await {
                    return Err(rejected());
                }
            }
            WarmingStage::Payments => {
                let limit = self.config.recent_payments_limit;
                let payments = source
                    .recent_payments(tenant, limit)
                    .await
                    .map_err(|e| fail(e.to_string()))?;
                if !cache.set_recent_payments(tenant, limit, &payments, None).await {
                    return Err(rejected());
                }
            }
            WarmingStage::Financial => {
                let period = FinancialPeriod::month_of(Utc::now());
                let summary = source
                    .financial_summary(tenant, &period)
                    .await
                    .map_err(|e| fail(e.to_string()))?;
                if !cache.set_financial_summary(tenant, &period, &summary, None).await {
                    return Err(rejected());
                }
            }
        }

        Ok(())
    }

    fn finish_run(&self, summary: WarmingRunSummary, clock: Instant) -> WarmingRunSummary {
        let outcome = match summary.status {
            WarmingRunStatus::Failed => "failed",
            _ if summary.tenants_failed > 0 => "partial",
            _ => "completed",
        };
        record_warming_run(outcome, clock.elapsed());

        info!(
            outcome,
            tenants = summary.tenants_total,
            completed = summary.tenants_completed,
            failed = summary.tenants_failed,
            duration_ms = summary.duration_ms(),
            "Cache warming run finished"
        );

        self.with_state(|state| {
            state.status = summary.status;
            state.tenants.clear();
            state.last_run = Some(summary.clone());
        });

        summary
    }

    /// Spawns the daily run loop
    pub fn spawn_daily(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let wait = duration_until_next(Local::now().naive_local(), self.config.daily_at);
                info!(
                    next_run_in_secs = wait.as_secs(),
                    daily_at = %self.config.daily_at,
                    "Scheduled next cache warming run"
                );
                tokio::time::sleep(wait).await;

                match self.warm_all().await {
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Skipping scheduled cache warming run"),
                }
            }
        })
    }
}

/// Time from `now` until the next occurrence of `at` (tomorrow if already passed)
pub fn duration_until_next(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let today = now.date().and_time(at);
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };

    (next - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregate::{
        AggregateSource, DashboardStats, EntityPage, FinancialSummary, MockAggregateSource,
        PaymentRecord,
    };
    use crate::domain::cache::{CacheLookup, TtlPolicy};
    use crate::domain::warming::TenantWarmingStatus;
    use crate::infrastructure::cache::{CacheStore, InMemoryCache};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio::sync::Notify;

    fn tenant(id: &str) -> TenantId {
        TenantId::new(id).unwrap()
    }

    fn stats() -> DashboardStats {
        DashboardStats {
            total_properties: 4,
            occupied_units: 6,
            vacant_units: 2,
            active_leases: 6,
            open_maintenance_requests: 0,
            monthly_revenue: 7_200.0,
            outstanding_balance: 0.0,
            generated_at: Utc::now(),
        }
    }

    fn page() -> EntityPage {
        EntityPage {
            items: vec![serde_json::json!({ "id": "1" })],
            page: 1,
            limit: 50,
            total: 1,
        }
    }

    fn summary(period: &FinancialPeriod) -> FinancialSummary {
        FinancialSummary {
            period: period.clone(),
            total_income: 1.0,
            total_expenses: 0.0,
            collected: 1.0,
            outstanding: 0.0,
        }
    }

    /// Source answering every tenant except `failing`, whose dashboard fails
    fn source_failing_for(tenants: &[&str], failing: Option<&'static str>) -> MockAggregateSource {
        let mut source = MockAggregateSource::new();
        let all: Vec<TenantId> = tenants.iter().map(|t| tenant(t)).collect();

        source.expect_list_tenants().returning(move || Ok(all.clone()));
        source.expect_dashboard_stats().returning(move |t| {
            if Some(t.as_str()) == failing {
                Err(DomainError::provider("business_api", "500 Internal Server Error"))
            } else {
                Ok(stats())
            }
        });
        source.expect_property_page().returning(|_, _| Ok(page()));
        source.expect_tenant_page().returning(|_, _| Ok(page()));
        source.expect_recent_payments().returning(|_, _| Ok(vec![]));
        source
            .expect_financial_summary()
            .returning(|_, period| Ok(summary(period)));
        source
    }

    fn scheduler_with(source: impl AggregateSource + 'static) -> (WarmingScheduler, Arc<AggregateCache>) {
        let aggregates = Arc::new(AggregateCache::new(
            CacheStore::new(Arc::new(InMemoryCache::new())),
            TtlPolicy::new(),
            Arc::new(source),
        ));
        (
            WarmingScheduler::new(Arc::clone(&aggregates), WarmingConfig::default()),
            aggregates,
        )
    }

    #[tokio::test]
    async fn test_warm_all_populates_every_aggregate() {
        let (scheduler, aggregates) = scheduler_with(source_failing_for(&["acme", "globex"], None));

        let summary = scheduler.warm_all().await.unwrap();
        assert_eq!(summary.status, WarmingRunStatus::Completed);
        assert_eq!(summary.tenants_completed, 2);

        let query = PageQuery::first_page(50).unwrap();
        let period = FinancialPeriod::month_of(Utc::now());
        for t in ["acme", "globex"] {
            let t = tenant(t);
            assert!(aggregates.get_dashboard_stats(&t).await.is_hit());
            assert!(aggregates.get_property_page(&t, &query).await.is_hit());
            assert!(aggregates.get_tenant_page(&t, &query).await.is_hit());
            assert!(aggregates.get_recent_payments(&t, 10).await.is_hit());
            assert!(aggregates.get_financial_summary(&t, &period).await.is_hit());
        }
    }

    #[tokio::test]
    async fn test_warming_isolation() {
        let (scheduler, aggregates) =
            scheduler_with(source_failing_for(&["acme", "broken", "globex"], Some("broken")));

        let summary = scheduler.warm_all().await.unwrap();

        assert_eq!(summary.tenants_total, 3);
        assert_eq!(summary.tenants_completed, 2);
        assert_eq!(summary.tenants_failed, 1);
        assert_eq!(summary.failures[0].tenant, tenant("broken"));
        assert_eq!(summary.failures[0].stage, WarmingStage::Dashboard);

        assert!(aggregates.get_dashboard_stats(&tenant("acme")).await.is_hit());
        assert!(aggregates.get_dashboard_stats(&tenant("globex")).await.is_hit());
        assert!(aggregates.get_dashboard_stats(&tenant("broken")).await.is_miss());
    }

    #[tokio::test]
    async fn test_progress_is_cleared_after_run() {
        let (scheduler, _) = scheduler_with(source_failing_for(&["acme"], None));

        scheduler.warm_all().await.unwrap();

        let snapshot = scheduler.progress();
        assert_eq!(snapshot.status, WarmingRunStatus::Completed);
        assert!(snapshot.tenants.is_empty());
        assert_eq!(snapshot.last_run.unwrap().tenants_completed, 1);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_warm_tenant_single_stage() {
        let mut source = MockAggregateSource::new();
        source
            .expect_dashboard_stats()
            .times(1)
            .returning(|_| Ok(stats()));
        let (scheduler, aggregates) = scheduler_with(source);
        let acme = tenant("acme");

        let summary = scheduler
            .warm_tenant(&acme, Some(WarmingStage::Dashboard))
            .await
            .unwrap();

        assert_eq!(summary.tenants_completed, 1);
        assert!(matches!(
            aggregates.get_dashboard_stats(&acme).await,
            CacheLookup::Hit(_)
        ));
    }

    #[tokio::test]
    async fn test_enumeration_failure_fails_run() {
        let mut source = MockAggregateSource::new();
        source
            .expect_list_tenants()
            .returning(|| Err(DomainError::provider("business_api", "connection refused")));
        let (scheduler, _) = scheduler_with(source);

        let summary = scheduler.warm_all().await.unwrap();
        assert_eq!(summary.status, WarmingRunStatus::Failed);
        assert!(summary.error.is_some());
        assert!(!scheduler.is_running());
    }

    /// Source whose tenant enumeration waits until released
    struct GatedSource {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl AggregateSource for GatedSource {
        async fn list_tenants(&self) -> Result<Vec<TenantId>, DomainError> {
            self.gate.notified().await;
            Ok(vec![tenant("acme")])
        }

        async fn dashboard_stats(&self, _: &TenantId) -> Result<DashboardStats, DomainError> {
            Ok(stats())
        }

        async fn property_page(&self, _: &TenantId, _: &PageQuery) -> Result<EntityPage, DomainError> {
            Ok(page())
        }

        async fn tenant_page(&self, _: &TenantId, _: &PageQuery) -> Result<EntityPage, DomainError> {
            Ok(page())
        }

        async fn recent_payments(&self, _: &TenantId, _: u32) -> Result<Vec<PaymentRecord>, DomainError> {
            Ok(vec![])
        }

        async fn financial_summary(
            &self,
            _: &TenantId,
            period: &FinancialPeriod,
        ) -> Result<FinancialSummary, DomainError> {
            Ok(summary(period))
        }
    }

    #[tokio::test]
    async fn test_concurrent_runs_conflict() {
        let gate = Arc::new(Notify::new());
        let (scheduler, _) = scheduler_with(GatedSource {
            gate: Arc::clone(&gate),
        });
        let scheduler = Arc::new(scheduler);

        let run = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.warm_all().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(scheduler.is_running());
        assert_eq!(scheduler.progress().status, WarmingRunStatus::Running);

        let conflict = scheduler.warm_tenant(&tenant("acme"), None).await;
        assert!(matches!(conflict, Err(DomainError::Conflict { .. })));
        assert!(matches!(scheduler.warm_all().await, Err(DomainError::Conflict { .. })));

        gate.notify_one();
        let summary = run.await.unwrap().unwrap();
        assert_eq!(summary.tenants_completed, 1);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_dropped_run_does_not_stay_running() {
        let (scheduler, _) = scheduler_with(GatedSource {
            gate: Arc::new(Notify::new()),
        });

        let cancelled = tokio::time::timeout(Duration::from_millis(50), scheduler.warm_all()).await;
        assert!(cancelled.is_err());

        let snapshot = scheduler.progress();
        assert!(!scheduler.is_running());
        assert_eq!(snapshot.status, WarmingRunStatus::Failed);
        assert!(snapshot.tenants.is_empty());
    }

    #[tokio::test]
    async fn test_spawned_run_outlives_its_caller() {
        let gate = Arc::new(Notify::new());
        let (scheduler, aggregates) = scheduler_with(GatedSource {
            gate: Arc::clone(&gate),
        });
        let scheduler = Arc::new(scheduler);

        let waiting = tokio::time::timeout(Duration::from_millis(50), async {
            scheduler.spawn_warm_all().unwrap().await
        })
        .await;
        assert!(waiting.is_err());
        assert!(scheduler.is_running());

        gate.notify_one();
        for _ in 0..100 {
            if !scheduler.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(!scheduler.is_running());
        assert_eq!(scheduler.progress().last_run.unwrap().tenants_completed, 1);
        assert!(aggregates.get_dashboard_stats(&tenant("acme")).await.is_hit());
    }

    #[tokio::test]
    async fn test_spawn_takes_run_flag_before_task_starts() {
        let (scheduler, _) = scheduler_with(GatedSource {
            gate: Arc::new(Notify::new()),
        });
        let scheduler = Arc::new(scheduler);

        let first = scheduler.spawn_warm_all().unwrap();
        assert!(scheduler.is_running());
        assert!(matches!(
            scheduler.spawn_warm_all(),
            Err(DomainError::Conflict { .. })
        ));
        assert!(matches!(
            scheduler.spawn_warm_tenant(tenant("acme"), None),
            Err(DomainError::Conflict { .. })
        ));

        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_progress_status_of_failed_tenant() {
        let mut progress = TenantProgress::pending(tenant("acme"), 4);
        progress.start_stage(WarmingStage::Payments);
        progress.fail(WarmingStage::Payments, "boom");
        assert_eq!(
            progress.status,
            TenantWarmingStatus::Failed {
                stage: WarmingStage::Payments
            }
        );
    }

    #[test]
    fn test_duration_until_next() {
        let at = NaiveTime::from_hms_opt(3, 0, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

        let before = date.and_hms_opt(1, 30, 0).unwrap();
        assert_eq!(duration_until_next(before, at), Duration::from_secs(90 * 60));

        let after = date.and_hms_opt(4, 0, 0).unwrap();
        assert_eq!(duration_until_next(after, at), Duration::from_secs(23 * 3600));

        let exactly = date.and_hms_opt(3, 0, 0).unwrap();
        assert_eq!(duration_until_next(exactly, at), Duration::from_secs(24 * 3600));
    }
}
