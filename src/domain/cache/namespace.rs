//! Cache namespaces - fixed prefixes identifying classes of cached data

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// A class of cached data. Every key starts with its namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Dashboard summary aggregates
    Dashboard,
    /// Paginated property lists
    Properties,
    /// Paginated tenant (renter) lists
    Tenants,
    /// Recent payment views
    Payments,
    /// Financial summaries per period
    Financial,
    /// Captured HTTP responses
    Api,
}

impl Namespace {
    /// All namespaces, in a stable order
    pub const ALL: [Namespace; 6] = [
        Namespace::Dashboard,
        Namespace::Properties,
        Namespace::Tenants,
        Namespace::Payments,
        Namespace::Financial,
        Namespace::Api,
    ];

    /// The key prefix for this namespace
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Dashboard => "dashboard",
            Namespace::Properties => "properties",
            Namespace::Tenants => "tenants",
            Namespace::Payments => "payments",
            Namespace::Financial => "financial",
            Namespace::Api => "api",
        }
    }

    /// Default time-to-live when no override is configured
    pub fn default_ttl(&self) -> Duration {
        let secs = match self {
            Namespace::Dashboard => 300,
            Namespace::Properties => 600,
            Namespace::Tenants => 600,
            Namespace::Payments => 180,
            Namespace::Financial => 300,
            Namespace::Api => 300,
        };

        Duration::from_secs(secs)
    }

    /// Path segment of the HTTP resource that serves this aggregate.
    ///
    /// Used to reach response-cache entries (`api:{tenant}:{segment}...`)
    /// when the aggregate is invalidated.
    pub fn api_segment(&self) -> Option<&'static str> {
        match self {
            Namespace::Dashboard => Some("dashboard"),
            Namespace::Properties => Some("properties"),
            Namespace::Tenants => Some("tenants"),
            Namespace::Payments => Some("payments"),
            Namespace::Financial => Some("financials"),
            Namespace::Api => None,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Namespace {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Namespace::ALL
            .into_iter()
            .find(|ns| ns.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "Unknown cache namespace: {}. Valid namespaces: dashboard, properties, tenants, payments, financial, api",
                    s
                ))
            })
    }
}
