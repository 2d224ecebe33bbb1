//! Aggregate source backed by the business service's internal HTTP API

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::aggregate::{
    AggregateSource, DashboardStats, EntityPage, FinancialPeriod, FinancialSummary, PageQuery,
    PaymentRecord,
};
use crate::domain::tenant::TenantId;
use crate::domain::DomainError;

const PROVIDER: &str = "business_api";

/// Configuration for the HTTP aggregate source
#[derive(Debug, Clone)]
pub struct HttpAggregateSourceConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for HttpAggregateSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Fetches aggregates from `{base_url}/internal/...` endpoints
#[derive(Debug, Clone)]
pub struct HttpAggregateSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAggregateSource {
    pub fn new(config: HttpAggregateSourceConfig) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn tenant_url(&self, tenant: &TenantId, path: &str) -> String {
        format!("{}/internal/tenants/{}/{}", self.base_url, tenant, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T, DomainError> {
        debug!(url, "Fetching aggregate from business service");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| DomainError::provider(PROVIDER, format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(DomainError::provider(
                PROVIDER,
                format!("HTTP {}: {}", status, error_body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| DomainError::provider(PROVIDER, format!("Failed to parse response: {}", e)))
    }
}

fn page_params(query: &PageQuery) -> Vec<(String, String)> {
    let mut params = vec![
        ("page".to_string(), query.page.to_string()),
        ("limit".to_string(), query.limit.to_string()),
    ];
    params.extend(query.filters.iter().map(|(k, v)| (k.clone(), v.clone())));
    params
}

#[async_trait]
impl AggregateSource for HttpAggregateSource {
    async fn list_tenants(&self) -> Result<Vec<TenantId>, DomainError> {
        let url = format!("{}/internal/tenants", self.base_url);
        self.get_json(&url, &[]).await
    }

    async fn dashboard_stats(&self, tenant: &TenantId) -> Result<DashboardStats, DomainError> {
        self.get_json(&self.tenant_url(tenant, "dashboard"), &[]).await
    }

    async fn property_page(
        &self,
        tenant: &TenantId,
        query: &PageQuery,
    ) -> Result<EntityPage, DomainError> {
        self.get_json(&self.tenant_url(tenant, "properties"), &page_params(query))
            .await
    }

    async fn tenant_page(
        &self,
        tenant: &TenantId,
        query: &PageQuery,
    ) -> Result<EntityPage, DomainError> {
        self.get_json(&self.tenant_url(tenant, "tenants"), &page_params(query))
            .await
    }

    async fn recent_payments(
        &self,
        tenant: &TenantId,
        limit: u32,
    ) -> Result<Vec<PaymentRecord>, DomainError> {
        self.get_json(
            &self.tenant_url(tenant, "payments/recent"),
            &[("limit".to_string(), limit.to_string())],
        )
        .await
    }

    async fn financial_summary(
        &self,
        tenant: &TenantId,
        period: &FinancialPeriod,
    ) -> Result<FinancialSummary, DomainError> {
        let path = format!("financials/{}", period);
        self.get_json(&self.tenant_url(tenant, &path), &[]).await
    }
}
