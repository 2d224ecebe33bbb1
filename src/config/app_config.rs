use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveTime;
use serde::Deserialize;

use crate::domain::cache::{Namespace, TtlPolicy};
use crate::domain::DomainError;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cache: CacheSettings,
    pub warming: WarmingSettings,
    pub manager: ManagerSettings,
    pub source: SourceSettings,
    pub metrics: MetricsSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Cache backend selection
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    Redis,
    #[default]
    InMemory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub redis: RedisSettings,
    /// Capacity of the in-memory backend
    pub max_capacity: u64,
    /// Deadline for every individual store operation
    pub operation_timeout_ms: u64,
    /// Per-namespace TTL overrides in seconds
    pub ttl_overrides: HashMap<String, u64>,
    /// Largest response body the interceptor will store
    pub response_max_body_bytes: usize,
    /// Share one computation between concurrent misses of the same aggregate
    pub coalesce_misses: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: i64,
    pub key_prefix: Option<String>,
    pub connection_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarmingSettings {
    /// Run the daily warming loop in `serve`
    pub enabled: bool,
    /// Local time of day for the scheduled run, `HH:MM`
    pub daily_at: String,
    /// Page size for the first page of entity lists
    pub list_page_limit: u32,
    pub recent_payments_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    pub health_check_interval_secs: u64,
    pub cleanup_interval_secs: u64,
    /// Namespaces purged by the periodic cleanup
    pub cleanup_namespaces: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Base URL of the business service exposing aggregate endpoints
    pub base_url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            redis: RedisSettings::default(),
            max_capacity: 10_000,
            operation_timeout_ms: 2_000,
            ttl_overrides: HashMap::new(),
            response_max_body_bytes: 1024 * 1024,
            coalesce_misses: true,
        }
    }
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            username: None,
            password: None,
            db: 0,
            key_prefix: None,
            connection_timeout_ms: 5_000,
        }
    }
}

impl Default for WarmingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_at: "03:00".to_string(),
            list_page_limit: 50,
            recent_payments_limit: 10,
        }
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            health_check_interval_secs: 60,
            cleanup_interval_secs: 3600,
            cleanup_namespaces: Vec::new(),
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl CacheSettings {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms.max(1))
    }

    /// TTL table with configured overrides applied
    pub fn ttl_policy(&self) -> Result<TtlPolicy, DomainError> {
        TtlPolicy::from_overrides(self.ttl_overrides.iter())
    }
}

impl RedisSettings {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms.max(1))
    }
}

impl WarmingSettings {
    /// Parses `daily_at` as a local wall-clock time
    pub fn daily_time(&self) -> Result<NaiveTime, DomainError> {
        NaiveTime::parse_from_str(&self.daily_at, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&self.daily_at, "%H:%M:%S"))
            .map_err(|_| {
                DomainError::configuration(format!(
                    "warming.daily_at must be HH:MM, got '{}'",
                    self.daily_at
                ))
            })
    }
}

impl ManagerSettings {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs.max(1))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }

    pub fn cleanup_namespaces(&self) -> Result<Vec<Namespace>, DomainError> {
        self.cleanup_namespaces
            .iter()
            .map(|ns| {
                ns.parse::<Namespace>().map_err(|_| {
                    DomainError::configuration(format!(
                        "Unknown namespace '{}' in manager.cleanup_namespaces",
                        ns
                    ))
                })
            })
            .collect()
    }
}

impl SourceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}
