//! Cache factory for runtime backend selection

use std::sync::Arc;

use tracing::info;

use crate::config::{CacheBackend, CacheSettings};
use crate::domain::cache::Cache;
use crate::domain::DomainError;

use super::in_memory::{InMemoryCache, InMemoryCacheConfig};
use super::redis::{RedisCache, RedisCacheConfig};

/// Creates backends from configuration
#[derive(Debug, Default)]
pub struct CacheFactory;

impl CacheFactory {
    pub fn new() -> Self {
        Self
    }

    /// Creates the configured backend. Redis connects lazily on first use.
    pub fn create(&self, settings: &CacheSettings) -> Result<Arc<dyn Cache>, DomainError> {
        info!(backend = ?settings.backend, "Creating cache backend");

        match settings.backend {
            CacheBackend::InMemory => {
                let config =
                    InMemoryCacheConfig::default().with_max_capacity(settings.max_capacity);
                Ok(Arc::new(InMemoryCache::with_config(config)))
            }
            CacheBackend::Redis => {
                let redis = &settings.redis;

                if redis.host.trim().is_empty() {
                    return Err(DomainError::configuration(
                        "cache.redis.host is required for the redis backend",
                    ));
                }

                let mut config = RedisCacheConfig::new(redis.host.clone(), redis.port)
                    .with_credentials(redis.username.clone(), redis.password.clone())
                    .with_db(redis.db)
                    .with_connection_timeout(redis.connection_timeout());

                if let Some(prefix) = &redis.key_prefix {
                    config = config.with_key_prefix(prefix.clone());
                }

                Ok(Arc::new(RedisCache::new(config)?))
            }
        }
    }

    pub fn create_in_memory(&self) -> Arc<dyn Cache> {
        Arc::new(InMemoryCache::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_in_memory() {
        let cache = CacheFactory::new().create(&CacheSettings::default()).unwrap();
        assert!(cache.ping().await.is_ok());
    }

    #[test]
    fn test_create_redis_does_not_connect() {
        let mut settings = CacheSettings::default();
        settings.backend = CacheBackend::Redis;
        settings.redis.host = "redis.invalid".to_string();

        assert!(CacheFactory::new().create(&settings).is_ok());
    }

    #[tokio::test]
    async fn test_in_memory_backend_ignores_redis_settings() {
        let mut settings = CacheSettings::default();
        settings.backend = CacheBackend::InMemory;
        settings.redis.host = String::new();

        let cache = CacheFactory::new().create(&settings).unwrap();
        assert!(cache.ping().await.is_ok());
    }

    #[test]
    fn test_create_redis_requires_host() {
        let mut settings = CacheSettings::default();
        settings.backend = CacheBackend::Redis;
        settings.redis.host = String::new();

        assert!(matches!(
            CacheFactory::new().create(&settings),
            Err(DomainError::Configuration { .. })
        ));
    }
}
