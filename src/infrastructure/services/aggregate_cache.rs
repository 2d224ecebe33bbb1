//! Domain aggregation cache - dashboard, list, payment and financial views

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::aggregate::{
    AggregateSource, DashboardStats, EntityPage, FinancialPeriod, FinancialSummary, PageQuery,
    PaymentRecord,
};
use crate::domain::cache::{
    build_key, CacheKeyParams, CacheLookup, CacheStatus, InvalidationPattern, Namespace,
    ResourceType, TtlPolicy,
};
use crate::domain::tenant::TenantId;
use crate::domain::DomainError;
use crate::infrastructure::cache::{CacheStore, FlightRole, InFlight};
use crate::infrastructure::observability::record_invalidation;

/// A value handed back by a read-through call, with where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub status: CacheStatus,
}

/// Keys removed by one pattern
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternOutcome {
    pub pattern: String,
    pub deleted: usize,
}

/// Summary of an invalidation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidationReport {
    pub tenant: TenantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceType>,
    pub patterns: Vec<PatternOutcome>,
    pub total_deleted: usize,
}

impl InvalidationReport {
    fn new(tenant: &TenantId, resource: Option<ResourceType>, patterns: Vec<PatternOutcome>) -> Self {
        let total_deleted = patterns.iter().map(|p| p.deleted).sum();
        Self {
            tenant: tenant.clone(),
            resource,
            patterns,
            total_deleted,
        }
    }
}

/// Key of the dashboard stats aggregate
pub fn dashboard_key(tenant: &TenantId) -> String {
    build_key(Namespace::Dashboard, tenant, "stats", &CacheKeyParams::new())
}

/// Key of one page of the property list
pub fn property_list_key(tenant: &TenantId, query: &PageQuery) -> String {
    list_key(Namespace::Properties, tenant, query)
}

/// Key of one page of the renter list
pub fn tenant_list_key(tenant: &TenantId, query: &PageQuery) -> String {
    list_key(Namespace::Tenants, tenant, query)
}

fn list_key(namespace: Namespace, tenant: &TenantId, query: &PageQuery) -> String {
    let operation = format!("list:page:{}:limit:{}", query.page, query.limit);
    let filters = CacheKeyParams::from_pairs(query.filters.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    build_key(namespace, tenant, &operation, &filters)
}

/// Key of the recent payments aggregate
pub fn recent_payments_key(tenant: &TenantId, limit: u32) -> String {
    build_key(
        Namespace::Payments,
        tenant,
        &format!("recent:limit:{}", limit),
        &CacheKeyParams::new(),
    )
}

/// Key of a financial summary
pub fn financial_summary_key(tenant: &TenantId, period: &FinancialPeriod) -> String {
    build_key(
        Namespace::Financial,
        tenant,
        &format!("summary:{}", period),
        &CacheKeyParams::new(),
    )
}

/// Typed cache for composite, expensive-to-compute views.
///
/// Setters are write-through from the warming scheduler or business code;
/// `*_cached` readers fall through to the [`AggregateSource`] on a miss and
/// populate the cache. Concurrent misses for one key share a single
/// computation unless coalescing is turned off.
pub struct AggregateCache {
    store: CacheStore,
    ttl: TtlPolicy,
    source: Arc<dyn AggregateSource>,
    in_flight: InFlight,
    coalesce_misses: bool,
}

impl std::fmt::Debug for AggregateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateCache")
            .field("store", &self.store)
            .field("ttl", &self.ttl)
            .field("coalesce_misses", &self.coalesce_misses)
            .finish()
    }
}

impl AggregateCache {
    pub fn new(store: CacheStore, ttl: TtlPolicy, source: Arc<dyn AggregateSource>) -> Self {
        Self {
            store,
            ttl,
            source,
            in_flight: InFlight::new(),
            coalesce_misses: true,
        }
    }

    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.coalesce_misses = enabled;
        self
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn source(&self) -> &Arc<dyn AggregateSource> {
        &self.source
    }

    pub fn ttl_policy(&self) -> &TtlPolicy {
        &self.ttl
    }

    // Dashboard

    pub async fn get_dashboard_stats(&self, tenant: &TenantId) -> CacheLookup<DashboardStats> {
        self.store.get(&dashboard_key(tenant)).await
    }

    pub async fn set_dashboard_stats(
        &self,
        tenant: &TenantId,
        stats: &DashboardStats,
        ttl: Option<Duration>,
    ) -> bool {
        let ttl = self.ttl.resolve(Namespace::Dashboard, ttl);
        self.store.set(&dashboard_key(tenant), stats, ttl).await
    }

    pub async fn dashboard_stats_cached(
        &self,
        tenant: &TenantId,
    ) -> Result<Cached<DashboardStats>, DomainError> {
        let source = Arc::clone(&self.source);
        let tenant_owned = tenant.clone();

        self.read_through(Namespace::Dashboard, dashboard_key(tenant), async move {
            source.dashboard_stats(&tenant_owned).await
        })
        .await
    }

    // Property list

    pub async fn get_property_page(
        &self,
        tenant: &TenantId,
        query: &PageQuery,
    ) -> CacheLookup<EntityPage> {
        self.store.get(&property_list_key(tenant, query)).await
    }

    pub async fn set_property_page(
        &self,
        tenant: &TenantId,
        query: &PageQuery,
        page: &EntityPage,
        ttl: Option<Duration>,
    ) -> bool {
        let ttl = self.ttl.resolve(Namespace::Properties, ttl);
        self.store.set(&property_list_key(tenant, query), page, ttl).await
    }

    pub async fn property_page_cached(
        &self,
        tenant: &TenantId,
        query: &PageQuery,
    ) -> Result<Cached<EntityPage>, DomainError> {
        let source = Arc::clone(&self.source);
        let tenant_owned = tenant.clone();
        let query_owned = query.clone();

        self.read_through(Namespace::Properties, property_list_key(tenant, query), async move {
            source.property_page(&tenant_owned, &query_owned).await
        })
        .await
    }

    // Renter list

    pub async fn get_tenant_page(
        &self,
        tenant: &TenantId,
        query: &PageQuery,
    ) -> CacheLookup<EntityPage> {
        self.store.get(&tenant_list_key(tenant, query)).await
    }

    pub async fn set_tenant_page(
        &self,
        tenant: &TenantId,
        query: &PageQuery,
        page: &EntityPage,
        ttl: Option<Duration>,
    ) -> bool {
        let ttl = self.ttl.resolve(Namespace::Tenants, ttl);
        self.store.set(&tenant_list_key(tenant, query), page, ttl).await
    }

    pub async fn tenant_page_cached(
        &self,
        tenant: &TenantId,
        query: &PageQuery,
    ) -> Result<Cached<EntityPage>, DomainError> {
        let source = Arc::clone(&self.source);
        let tenant_owned = tenant.clone();
        let query_owned = query.clone();

        self.read_through(Namespace::Tenants, tenant_list_key(tenant, query), async move {
            source.tenant_page(&tenant_owned, &query_owned).await
        })
        .await
    }

    // Recent payments

    pub async fn get_recent_payments(
        &self,
        tenant: &TenantId,
        limit: u32,
    ) -> CacheLookup<Vec<PaymentRecord>> {
        self.store.get(&recent_payments_key(tenant, limit)).await
    }

    pub async fn set_recent_payments(
        &self,
        tenant: &TenantId,
        limit: u32,
        payments: &[PaymentRecord],
        ttl: Option<Duration>,
    ) -> bool {
        let ttl = self.ttl.resolve(Namespace::Payments, ttl);
        self.store.set(&recent_payments_key(tenant, limit), payments, ttl).await
    }

    pub async fn recent_payments_cached(
        &self,
        tenant: &TenantId,
        limit: u32,
    ) -> Result<Cached<Vec<PaymentRecord>>, DomainError> {
        let source = Arc::clone(&self.source);
        let tenant_owned = tenant.clone();

        self.read_through(Namespace::Payments, recent_payments_key(tenant, limit), async move {
            source.recent_payments(&tenant_owned, limit).await
        })
        .await
    }

    // Financial summary

    pub async fn get_financial_summary(
        &self,
        tenant: &TenantId,
        period: &FinancialPeriod,
    ) -> CacheLookup<FinancialSummary> {
        self.store.get(&financial_summary_key(tenant, period)).await
    }

    pub async fn set_financial_summary(
        &self,
        tenant: &TenantId,
        period: &FinancialPeriod,
        summary: &FinancialSummary,
        ttl: Option<Duration>,
    ) -> bool {
        let ttl = self.ttl.resolve(Namespace::Financial, ttl);
        self.store.set(&financial_summary_key(tenant, period), summary, ttl).await
    }

    pub async fn financial_summary_cached(
        &self,
        tenant: &TenantId,
        period: &FinancialPeriod,
    ) -> Result<Cached<FinancialSummary>, DomainError> {
        let source = Arc::clone(&self.source);
        let tenant_owned = tenant.clone();
        let period_owned = period.clone();

        self.read_through(
            Namespace::Financial,
            financial_summary_key(tenant, period),
            async move { source.financial_summary(&tenant_owned, &period_owned).await },
        )
        .await
    }

    // Invalidation

    /// Deletes every entry a change of `resource` can make stale for `tenant`
    pub async fn invalidate_on_data_change(
        &self,
        tenant: &TenantId,
        resource: ResourceType,
    ) -> Result<InvalidationReport, DomainError> {
        let patterns = resource.invalidation_patterns(tenant)?;
        let outcomes = self.delete_patterns(&patterns).await;
        let report = InvalidationReport::new(tenant, Some(resource), outcomes);

        record_invalidation("data_change", report.total_deleted);
        info!(
            tenant = %tenant,
            resource = %resource,
            deleted = report.total_deleted,
            "Invalidated cache after data change"
        );

        Ok(report)
    }

    /// Deletes every entry of `tenant` in every namespace
    pub async fn invalidate_tenant(
        &self,
        tenant: &TenantId,
    ) -> Result<InvalidationReport, DomainError> {
        let patterns = Namespace::ALL
            .into_iter()
            .map(|ns| InvalidationPattern::new(ns, tenant, None))
            .collect::<Result<Vec<_>, _>>()?;

        let outcomes = self.delete_patterns(&patterns).await;
        let report = InvalidationReport::new(tenant, None, outcomes);

        record_invalidation("tenant", report.total_deleted);
        info!(tenant = %tenant, deleted = report.total_deleted, "Invalidated tenant cache");

        Ok(report)
    }

    async fn delete_patterns(&self, patterns: &[InvalidationPattern]) -> Vec<PatternOutcome> {
        let deletions = patterns.iter().map(|pattern| async move {
            PatternOutcome {
                pattern: pattern.to_string(),
                deleted: self.store.delete_pattern(pattern).await,
            }
        });

        join_all(deletions).await
    }

    async fn read_through<T, F>(
        &self,
        namespace: Namespace,
        key: String,
        compute: F,
    ) -> Result<Cached<T>, DomainError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Future<Output = Result<T, DomainError>> + Send + 'static,
    {
        if let CacheLookup::Hit(value) = self.store.get::<T>(&key).await {
            return Ok(Cached {
                value,
                status: CacheStatus::Hit,
            });
        }

        let ttl = self.ttl.ttl_for(namespace);

        if !self.coalesce_misses {
            let value = compute.await?;
            self.store.set(&key, &value, ttl).await;
            return Ok(Cached {
                value,
                status: CacheStatus::Miss,
            });
        }

        let store = self.store.clone();
        let write_key = key.clone();
        let computation: BoxFuture<'static, Result<serde_json::Value, String>> =
            Box::pin(async move {
                let value = compute.await.map_err(|e| e.to_string())?;
                let json = serde_json::to_value(&value).map_err(|e| e.to_string())?;
                store.set(&write_key, &json, ttl).await;
                Ok(json)
            });

        let (result, role) = self.in_flight.run(&key, computation).await;
        if role == FlightRole::Follower {
            debug!(key = %key, "Joined in-flight computation");
        }

        let json = result.map_err(|message| DomainError::provider("aggregate_source", message))?;
        let value = serde_json::from_value(json)
            .map_err(|e| DomainError::serialization(format!("Aggregate '{}': {}", key, e)))?;

        Ok(Cached {
            value,
            status: CacheStatus::Miss,
        })
    }
}
