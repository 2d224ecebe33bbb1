//! Cache infrastructure - backends, the fail-soft store and miss coalescing

mod factory;
mod in_memory;
mod redis;
mod single_flight;
mod stats;
mod store;

pub use factory::CacheFactory;
pub use in_memory::{InMemoryCache, InMemoryCacheConfig};
pub use redis::{RedisCache, RedisCacheConfig};
pub use single_flight::{FlightRole, InFlight};
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use store::{CacheHealth, CacheHealthStatus, CacheStore, DEFAULT_OPERATION_TIMEOUT};
