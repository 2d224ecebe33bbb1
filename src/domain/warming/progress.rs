//! Warming progress tracking types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::tenant::TenantId;
use crate::domain::DomainError;

/// One step of warming a tenant's hot entries, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmingStage {
    Dashboard,
    Lists,
    Payments,
    Financial,
}

impl WarmingStage {
    pub const ALL: [WarmingStage; 4] = [
        WarmingStage::Dashboard,
        WarmingStage::Lists,
        WarmingStage::Payments,
        WarmingStage::Financial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WarmingStage::Dashboard => "dashboard",
            WarmingStage::Lists => "lists",
            WarmingStage::Payments => "payments",
            WarmingStage::Financial => "financial",
        }
    }
}

impl fmt::Display for WarmingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WarmingStage {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dashboard" | "stats" => Ok(WarmingStage::Dashboard),
            "lists" | "list" => Ok(WarmingStage::Lists),
            "payments" | "payment" => Ok(WarmingStage::Payments),
            "financial" | "financials" => Ok(WarmingStage::Financial),
            _ => Err(DomainError::validation(format!(
                "Unknown warming stage '{}': expected dashboard, lists, payments or financial",
                s
            ))),
        }
    }
}

/// Where a single tenant is within a warming run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TenantWarmingStatus {
    Pending,
    Running { stage: WarmingStage },
    Completed,
    Failed { stage: WarmingStage },
}

impl TenantWarmingStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TenantWarmingStatus::Completed | TenantWarmingStatus::Failed { .. }
        )
    }
}

/// Per-tenant progress within the current run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantProgress {
    pub tenant: TenantId,
    pub status: TenantWarmingStatus,
    pub percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stages_total: usize,
    pub stages_done: usize,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantProgress {
    pub fn pending(tenant: TenantId, stages_total: usize) -> Self {
        let now = Utc::now();
        Self {
            tenant,
            status: TenantWarmingStatus::Pending,
            percent: 0,
            error: None,
            stages_total,
            stages_done: 0,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn start_stage(&mut self, stage: WarmingStage) {
        self.status = TenantWarmingStatus::Running { stage };
        self.touch();
    }

    pub fn finish_stage(&mut self) {
        self.stages_done = (self.stages_done + 1).min(self.stages_total);
        self.percent = percent(self.stages_done, self.stages_total);
        self.touch();
    }

    pub fn complete(&mut self) {
        self.status = TenantWarmingStatus::Completed;
        self.percent = 100;
        self.touch();
    }

    pub fn fail(&mut self, stage: WarmingStage, error: impl Into<String>) {
        self.status = TenantWarmingStatus::Failed { stage };
        self.error = Some(error.into());
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done * 100) / total).min(100) as u8
}

/// State of the overall warming run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmingRunStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

/// A tenant that failed during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmingFailure {
    pub tenant: TenantId,
    pub stage: WarmingStage,
    pub message: String,
}

/// Outcome of a finished run, kept after per-tenant progress is cleared
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmingRunSummary {
    pub status: WarmingRunStatus,
    pub tenants_total: usize,
    pub tenants_completed: usize,
    pub tenants_failed: usize,
    pub failures: Vec<WarmingFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl WarmingRunSummary {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Read-only view of warming state for operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmingSnapshot {
    pub status: WarmingRunStatus,
    pub tenants: Vec<TenantProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<WarmingRunSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_parsing() {
        assert_eq!("dashboard".parse::<WarmingStage>().unwrap(), WarmingStage::Dashboard);
        assert_eq!("Lists".parse::<WarmingStage>().unwrap(), WarmingStage::Lists);
        assert_eq!("financials".parse::<WarmingStage>().unwrap(), WarmingStage::Financial);
        assert!("invoices".parse::<WarmingStage>().is_err());
    }

    #[test]
    fn test_progress_percent() {
        let mut progress = TenantProgress::pending(TenantId::new("acme").unwrap(), 4);
        assert_eq!(progress.percent, 0);

        progress.start_stage(WarmingStage::Dashboard);
        progress.finish_stage();
        assert_eq!(progress.percent, 25);
        assert_eq!(
            progress.status,
            TenantWarmingStatus::Running {
                stage: WarmingStage::Dashboard
            }
        );

        progress.start_stage(WarmingStage::Lists);
        progress.fail(WarmingStage::Lists, "source down");
        assert_eq!(progress.percent, 25);
        assert!(progress.status.is_finished());
        assert_eq!(progress.error.as_deref(), Some("source down"));
    }

    #[test]
    fn test_complete_sets_full_percent() {
        let mut progress = TenantProgress::pending(TenantId::new("acme").unwrap(), 1);
        progress.start_stage(WarmingStage::Payments);
        progress.finish_stage();
        progress.complete();

        assert_eq!(progress.percent, 100);
        assert_eq!(progress.status, TenantWarmingStatus::Completed);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(TenantWarmingStatus::Running {
            stage: WarmingStage::Lists,
        })
        .unwrap();

        assert_eq!(json["state"], "running");
        assert_eq!(json["stage"], "lists");
    }
}
