//! Infrastructure layer - cache backends, services and external integrations

pub mod cache;
pub mod logging;
pub mod observability;
pub mod services;
pub mod source;
