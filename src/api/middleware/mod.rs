//! API middleware components

pub mod invalidation;
pub mod logging;
pub mod metrics;
pub mod request_context;
pub mod response_cache;

pub use invalidation::{invalidation_middleware, InvalidationRule, InvalidationTrigger};
pub use logging::logging_middleware;
pub use metrics::metrics_middleware;
pub use request_context::RequestContext;
pub use response_cache::{
    response_cache_key, response_cache_middleware, CachedResponse, ResponseCache,
};
