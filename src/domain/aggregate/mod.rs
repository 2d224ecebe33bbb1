//! Aggregate domain - composite views and the callbacks that compute them

mod entity;
mod source;

pub use entity::{
    DashboardStats, EntityPage, FinancialPeriod, FinancialSummary, PageQuery, PaymentRecord,
    DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};
pub use source::AggregateSource;

#[cfg(test)]
pub use source::MockAggregateSource;
