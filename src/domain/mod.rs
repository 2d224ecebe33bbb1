//! Domain layer - Cache key space, aggregates and warming state

pub mod aggregate;
pub mod cache;
pub mod error;
pub mod tenant;
pub mod warming;

pub use aggregate::{
    AggregateSource, DashboardStats, EntityPage, FinancialPeriod, FinancialSummary, PageQuery,
    PaymentRecord,
};
pub use cache::{
    build_key, build_pattern, Cache, CacheKeyParams, CacheLookup, CacheStatus,
    InvalidationPattern, Namespace, ResourceType, TtlPolicy,
};
pub use error::DomainError;
pub use tenant::TenantId;
pub use warming::{WarmingSnapshot, WarmingStage};
