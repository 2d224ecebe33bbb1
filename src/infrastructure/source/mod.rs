//! Aggregate source implementations

mod http;

pub use http::{HttpAggregateSource, HttpAggregateSourceConfig};
