pub mod local;

pub use local::LocalJobRunner;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of one processing run.
///
/// Stages only ever advance: STARTING -> RUNNING (-> STOPPING) -> one of the
/// terminal states. UNKNOWN is what observers report when no run can be
/// found, not a state a run itself passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Unknown,
    Starting,
    Running,
    Stopping,
    Succeeded,
    Stopped,
    Failed,
    Error,
    Timeout,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Unknown => "UNKNOWN",
            JobStatus::Starting => "STARTING",
            JobStatus::Running => "RUNNING",
            JobStatus::Stopping => "STOPPING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Stopped => "STOPPED",
            JobStatus::Failed => "FAILED",
            JobStatus::Error => "ERROR",
            JobStatus::Timeout => "TIMEOUT",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded
                | JobStatus::Stopped
                | JobStatus::Failed
                | JobStatus::Error
                | JobStatus::Timeout
        )
    }

    /// Position in the stage progression; transitions must never lower it.
    pub fn stage_rank(&self) -> u8 {
        match self {
            JobStatus::Unknown => 0,
            JobStatus::Starting => 1,
            JobStatus::Running => 2,
            JobStatus::Stopping => 3,
            _ => 4,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one run as reported by the runner.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub run_id: String,
    pub state: JobStatus,
    pub arguments: HashMap<String, String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub capacity_units: f64,
}

#[derive(Error, Debug)]
pub enum RunnerError {
    /// The runner is at capacity. Callers downgrade this to a pending state
    /// instead of treating it as fatal.
    #[error("Concurrent runs exceeded for job")]
    ConcurrencyLimitExceeded,

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Failed to query job runner: {0}")]
    Query(String),
}

/// Job runner collaborator: starts asynchronous processing runs and reports
/// their states, most recent first.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn start_run(
        &self,
        job_name: &str,
        arguments: HashMap<String, String>,
    ) -> Result<String, RunnerError>;

    async fn list_runs(
        &self,
        job_name: &str,
        max_results: usize,
    ) -> Result<Vec<RunInfo>, RunnerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_set_is_exactly_the_five_final_states() {
        let terminal = [
            JobStatus::Succeeded,
            JobStatus::Stopped,
            JobStatus::Failed,
            JobStatus::Error,
            JobStatus::Timeout,
        ];
        for status in terminal {
            assert!(status.is_terminal());
            assert_eq!(status.stage_rank(), 4);
        }
        for status in [JobStatus::Unknown, JobStatus::Starting, JobStatus::Running, JobStatus::Stopping] {
            assert!(!status.is_terminal());
        }
    }

    #[test]
    fn stage_ranks_are_strictly_ordered() {
        assert!(JobStatus::Starting.stage_rank() < JobStatus::Running.stage_rank());
        assert!(JobStatus::Running.stage_rank() < JobStatus::Stopping.stage_rank());
        assert!(JobStatus::Stopping.stage_rank() < JobStatus::Succeeded.stage_rank());
    }

    #[test]
    fn serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Succeeded).unwrap(),
            "\"SUCCEEDED\""
        );
    }
}
