//! Caller identity forwarded by the upstream auth layer

use axum::http::HeaderMap;
use tracing::debug;

use crate::domain::tenant::TenantId;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";

/// Tenant and user resolved from request headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub tenant: Option<TenantId>,
    pub user_id: Option<String>,
}

impl RequestContext {
    /// Reads `x-tenant-id` and `x-user-id`. A tenant header that fails
    /// validation is treated as absent.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let tenant = header_value(headers, TENANT_HEADER).and_then(|raw| {
            TenantId::new(raw)
                .map_err(|e| debug!(error = %e, "Ignoring invalid tenant header"))
                .ok()
        });

        Self {
            tenant,
            user_id: header_value(headers, USER_HEADER).map(str::to_string),
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
