//! API layer - admin endpoints and cache middleware

pub mod admin;
pub mod health;
pub mod middleware;
pub mod router;
pub mod state;
pub mod types;

pub use middleware::{InvalidationTrigger, RequestContext, ResponseCache};
pub use router::{create_router, create_router_with_state, with_cache_layers};
pub use state::AppState;
