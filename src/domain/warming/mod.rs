//! Warming domain - stages and progress of cache warming runs

mod progress;

pub use progress::{
    TenantProgress, TenantWarmingStatus, WarmingFailure, WarmingRunStatus, WarmingRunSummary,
    WarmingSnapshot, WarmingStage,
};
