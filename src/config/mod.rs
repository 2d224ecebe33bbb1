//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, CacheBackend, CacheSettings, LogFormat, LoggingConfig, ManagerSettings,
    MetricsSettings, RedisSettings, ServerConfig, SourceSettings, WarmingSettings,
};
