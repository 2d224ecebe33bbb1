//! Aggregate views served from the cache

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Largest page size accepted for entity lists
pub const MAX_PAGE_LIMIT: u32 = 200;

/// Default page size for entity lists
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

static PERIOD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}(-(0[1-9]|1[0-2])|-Q[1-4])?$").expect("valid period regex")
});

/// Headline numbers shown on a tenant's dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_properties: u64,
    pub occupied_units: u64,
    pub vacant_units: u64,
    pub active_leases: u64,
    pub open_maintenance_requests: u64,
    pub monthly_revenue: f64,
    pub outstanding_balance: f64,
    pub generated_at: DateTime<Utc>,
}

/// Pagination and filter selectors for entity lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            filters: BTreeMap::new(),
        }
    }
}

impl PageQuery {
    /// Creates a query for a page, validating the bounds
    pub fn new(page: u32, limit: u32) -> Result<Self, DomainError> {
        if page == 0 {
            return Err(DomainError::validation("page must be at least 1"));
        }

        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(DomainError::validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }

        Ok(Self {
            page,
            limit,
            filters: BTreeMap::new(),
        })
    }

    pub fn first_page(limit: u32) -> Result<Self, DomainError> {
        Self::new(1, limit)
    }

    /// Adds a filter; empty values are ignored
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.filters.insert(key.into(), value);
        }
        self
    }
}

/// One page of an entity list (properties, renters, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPage {
    pub items: Vec<serde_json::Value>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

/// A payment as shown in the recent-payments widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

/// Reporting period of a financial summary: `2026`, `2026-10` or `2026-Q4`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FinancialPeriod(String);

impl FinancialPeriod {
    pub fn new(period: impl Into<String>) -> Result<Self, DomainError> {
        let period = period.into();

        if !PERIOD_PATTERN.is_match(&period) {
            return Err(DomainError::validation(format!(
                "Invalid financial period '{}': expected YYYY, YYYY-MM or YYYY-Qn",
                period
            )));
        }

        Ok(Self(period))
    }

    /// The calendar month containing `now`
    pub fn month_of(now: DateTime<Utc>) -> Self {
        Self(format!("{:04}-{:02}", now.year(), now.month()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FinancialPeriod {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FinancialPeriod> for String {
    fn from(period: FinancialPeriod) -> Self {
        period.0
    }
}

impl fmt::Display for FinancialPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Income and expenses of a tenant for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub period: FinancialPeriod,
    pub total_income: f64,
    pub total_expenses: f64,
    pub collected: f64,
    pub outstanding: f64,
}

impl FinancialSummary {
    pub fn net_income(&self) -> f64 {
        self.total_income - self.total_expenses
    }
}
