//! Compute-value callbacks provided by the business layer

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::{DashboardStats, EntityPage, FinancialPeriod, FinancialSummary, PageQuery, PaymentRecord};
use crate::domain::tenant::TenantId;
use crate::domain::DomainError;

/// Produces the data behind each cacheable aggregate.
///
/// Called on a cache miss and by the warming scheduler; implementations hit
/// the database (or the business service) and are expected to be expensive.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AggregateSource: Send + Sync {
    /// All tenants whose caches should be warmed
    async fn list_tenants(&self) -> Result<Vec<TenantId>, DomainError>;

    /// Dashboard headline numbers
    async fn dashboard_stats(&self, tenant: &TenantId) -> Result<DashboardStats, DomainError>;

    /// One page of the property list
    async fn property_page(
        &self,
        tenant: &TenantId,
        query: &PageQuery,
    ) -> Result<EntityPage, DomainError>;

    /// One page of the renter list
    async fn tenant_page(
        &self,
        tenant: &TenantId,
        query: &PageQuery,
    ) -> Result<EntityPage, DomainError>;

    /// Most recent payments, newest first
    async fn recent_payments(
        &self,
        tenant: &TenantId,
        limit: u32,
    ) -> Result<Vec<PaymentRecord>, DomainError>;

    /// Financial summary for a period
    async fn financial_summary(
        &self,
        tenant: &TenantId,
        period: &FinancialPeriod,
    ) -> Result<FinancialSummary, DomainError>;
}
