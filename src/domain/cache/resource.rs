//! Resource types and the invalidation fan-out table

use std::fmt;

use serde::{Deserialize, Serialize};

use super::namespace::Namespace;
use super::pattern::InvalidationPattern;
use crate::domain::tenant::TenantId;
use crate::domain::DomainError;

/// Kind of business record whose change triggers invalidation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Property,
    Tenant,
    Payment,
    Lease,
    Maintenance,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] = [
        ResourceType::Property,
        ResourceType::Tenant,
        ResourceType::Payment,
        ResourceType::Lease,
        ResourceType::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Property => "property",
            ResourceType::Tenant => "tenant",
            ResourceType::Payment => "payment",
            ResourceType::Lease => "lease",
            ResourceType::Maintenance => "maintenance",
        }
    }

    /// Aggregate namespaces whose contents can change when this resource changes
    pub fn affected_namespaces(&self) -> &'static [Namespace] {
        match self {
            ResourceType::Property => &[Namespace::Dashboard, Namespace::Properties],
            ResourceType::Tenant => &[Namespace::Dashboard, Namespace::Tenants],
            ResourceType::Payment => &[
                Namespace::Dashboard,
                Namespace::Payments,
                Namespace::Financial,
            ],
            ResourceType::Lease => &[
                Namespace::Dashboard,
                Namespace::Properties,
                Namespace::Tenants,
                Namespace::Financial,
            ],
            ResourceType::Maintenance => &[Namespace::Dashboard, Namespace::Financial],
        }
    }

    /// Path segment of this resource's own HTTP collection
    pub fn api_segment(&self) -> &'static str {
        match self {
            ResourceType::Property => "properties",
            ResourceType::Tenant => "tenants",
            ResourceType::Payment => "payments",
            ResourceType::Lease => "leases",
            ResourceType::Maintenance => "maintenance",
        }
    }

    /// Every pattern a change of this resource must delete for `tenant`:
    /// one per affected aggregate namespace, plus the response-cache entries
    /// of the affected HTTP collections.
    pub fn invalidation_patterns(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<InvalidationPattern>, DomainError> {
        let mut patterns = Vec::new();

        for ns in self.affected_namespaces() {
            patterns.push(InvalidationPattern::new(*ns, tenant, None)?);
        }

        let mut segments: Vec<&str> = self
            .affected_namespaces()
            .iter()
            .filter_map(Namespace::api_segment)
            .collect();
        segments.push(self.api_segment());
        segments.sort_unstable();
        segments.dedup();

        for segment in segments {
            patterns.push(InvalidationPattern::new(Namespace::Api, tenant, Some(segment))?);
        }

        Ok(patterns)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "property" | "properties" => Ok(ResourceType::Property),
            "tenant" | "tenants" => Ok(ResourceType::Tenant),
            "payment" | "payments" => Ok(ResourceType::Payment),
            "lease" | "leases" => Ok(ResourceType::Lease),
            "maintenance" => Ok(ResourceType::Maintenance),
            _ => Err(DomainError::validation(format!(
                "Unknown resource type: {}. Valid types: property, tenant, payment, lease, maintenance",
                s
            ))),
        }
    }
}
