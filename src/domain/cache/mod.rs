//! Cache domain - key space policy, TTL table and backend abstraction

mod key;
mod lookup;
mod namespace;
mod pattern;
mod repository;
mod resource;
mod ttl;

pub use key::{build_key, normalize_path, CacheKeyParams, ANONYMOUS_USER, MAX_PARAMS_LENGTH};
pub use lookup::{CacheLookup, CacheStatus};
pub use namespace::Namespace;
pub use pattern::{build_pattern, GlobMatcher, InvalidationPattern};
pub use repository::Cache;
pub use resource::ResourceType;
pub use ttl::{TtlPolicy, MIN_TTL};

#[cfg(test)]
pub use repository::mock::MockCache;
