//! TTL policy table - namespace to time-to-live

use std::collections::HashMap;
use std::time::Duration;

use super::namespace::Namespace;
use crate::domain::DomainError;

/// Shortest TTL ever written to the store
pub const MIN_TTL: Duration = Duration::from_secs(1);

/// Fixed mapping from namespace to default TTL, with configured overrides
#[derive(Debug, Clone, Default)]
pub struct TtlPolicy {
    overrides: HashMap<Namespace, Duration>,
}

impl TtlPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the TTL of one namespace
    pub fn with_override(mut self, namespace: Namespace, ttl: Duration) -> Self {
        self.overrides.insert(namespace, ttl.max(MIN_TTL));
        self
    }

    /// Builds a policy from `namespace -> seconds` pairs (as found in configuration)
    pub fn from_overrides<'a, I>(overrides: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (&'a String, &'a u64)>,
    {
        let mut policy = Self::new();

        for (name, secs) in overrides {
            let namespace: Namespace = name.parse().map_err(|_| {
                DomainError::configuration(format!("Unknown namespace in TTL overrides: {}", name))
            })?;

            if *secs == 0 {
                return Err(DomainError::configuration(format!(
                    "TTL override for '{}' must be greater than 0",
                    name
                )));
            }

            policy = policy.with_override(namespace, Duration::from_secs(*secs));
        }

        Ok(policy)
    }

    /// TTL for a namespace
    pub fn ttl_for(&self, namespace: Namespace) -> Duration {
        self.overrides
            .get(&namespace)
            .copied()
            .unwrap_or_else(|| namespace.default_ttl())
    }

    /// Explicit TTL if given, otherwise the namespace default
    pub fn resolve(&self, namespace: Namespace, explicit: Option<Duration>) -> Duration {
        explicit
            .map(|ttl| ttl.max(MIN_TTL))
            .unwrap_or_else(|| self.ttl_for(namespace))
    }
}
