//! Tenant identity used to scope every cache key

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::DomainError;

/// Maximum length for tenant IDs
pub const MAX_TENANT_ID_LENGTH: usize = 64;

/// Tenant IDs may only use characters that cannot collide with key separators or globs
static TENANT_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid tenant id regex"));

/// Identifier of an isolated customer (agency)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Create a new TenantId after validation
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        validate_tenant_id(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validates a raw tenant identifier
pub fn validate_tenant_id(id: &str) -> Result<(), DomainError> {
    if id.is_empty() {
        return Err(DomainError::validation("Tenant ID cannot be empty"));
    }

    if id.len() > MAX_TENANT_ID_LENGTH {
        return Err(DomainError::validation(format!(
            "Tenant ID too long: {} characters (max {})",
            id.len(),
            MAX_TENANT_ID_LENGTH
        )));
    }

    if !TENANT_ID_PATTERN.is_match(id) {
        return Err(DomainError::validation(format!(
            "Invalid tenant ID format '{}': only letters, digits, '-', '_' and '.' are allowed",
            id
        )));
    }

    Ok(())
}

impl TryFrom<String> for TenantId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl std::str::FromStr for TenantId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tenant_ids() {
        assert!(TenantId::new("acme").is_ok());
        assert!(TenantId::new("agency-42").is_ok());
        assert!(TenantId::new("north_side.rentals").is_ok());
    }

    #[test]
    fn test_empty_tenant_id() {
        assert!(TenantId::new("").is_err());
    }

    #[test]
    fn test_tenant_id_rejects_separators_and_globs() {
        assert!(TenantId::new("acme:admin").is_err());
        assert!(TenantId::new("acme*").is_err());
        assert!(TenantId::new("ac?me").is_err());
        assert!(TenantId::new("[acme]").is_err());
        assert!(TenantId::new("acme corp").is_err());
    }

    #[test]
    fn test_tenant_id_too_long() {
        let id = "a".repeat(MAX_TENANT_ID_LENGTH + 1);
        assert!(TenantId::new(id).is_err());
    }

    #[test]
    fn test_tenant_id_serde() {
        let id = TenantId::new("acme").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"acme\"");

        let parsed: TenantId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);

        let invalid: Result<TenantId, _> = serde_json::from_str("\"a:b\"");
        assert!(invalid.is_err());
    }
}
