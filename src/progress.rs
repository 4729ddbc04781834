use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::join;
use serde::Serialize;
use tracing::warn;

use crate::db::RecordStore;
use crate::runner::{JobRunner, JobStatus, RunInfo};

/// UI-facing progress of one upload, merged from the job runner's view and
/// the persisted-record count.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    pub source_key: String,
    pub job_status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_run_id: Option<String>,
    /// True once the run reached a terminal state.
    pub processed: bool,
    /// Set only for terminal runs; `None` while in flight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub records_processed: u64,
    pub total_records: u64,
    pub successful_records: u64,
    pub error_records: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// Records per second, when a meaningful duration is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_speed: Option<f64>,
    /// Capacity units the run was started with, as reported by the runner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_units: Option<f64>,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Pick the run belonging to a source key: argument equality first, falling
/// back to the most recent run. The fallback can misattribute status across
/// concurrent uploads, so its use is reported back to the caller.
pub fn match_run<'a>(runs: &'a [RunInfo], source_key: &str) -> (Option<&'a RunInfo>, bool) {
    if let Some(run) = runs
        .iter()
        .find(|r| r.arguments.get("source_key").map(String::as_str) == Some(source_key))
    {
        return (Some(run), false);
    }
    match runs.first() {
        Some(run) => (Some(run), true),
        None => (None, false),
    }
}

/// Merge one poll's inputs into a progress report. Pure and idempotent; all
/// clock reads are passed in as `now`.
pub fn reconcile(
    source_key: &str,
    run: Option<&RunInfo>,
    records_processed: u64,
    now: DateTime<Utc>,
    warnings: Vec<String>,
) -> ProgressReport {
    let job_status = run.map(|r| r.state).unwrap_or(JobStatus::Unknown);

    let duration_seconds = run.and_then(|r| {
        let started = r.started_at?;
        match r.completed_at {
            Some(completed) => Some(seconds_between(started, completed)),
            None if !job_status.is_terminal() => Some(seconds_between(started, now)),
            None => None,
        }
    });

    let processing_speed = match duration_seconds {
        Some(duration) if duration > 0.0 && records_processed > 0 => {
            Some(records_processed as f64 / duration)
        }
        _ => None,
    };

    let total_records = run
        .and_then(|r| r.arguments.get("total_rows"))
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(records_processed);

    let processed = job_status.is_terminal();
    let error_records = if processed {
        total_records.saturating_sub(records_processed)
    } else {
        0
    };

    let (success, message) = match job_status {
        JobStatus::Succeeded | JobStatus::Stopped => {
            if records_processed > 0 {
                (
                    Some(true),
                    format!("Processing complete! {records_processed} records processed successfully."),
                )
            } else {
                (
                    Some(false),
                    "Job completed but no records were processed.".to_string(),
                )
            }
        }
        JobStatus::Failed | JobStatus::Error | JobStatus::Timeout => (
            Some(false),
            format!("Job failed with status: {job_status}"),
        ),
        JobStatus::Running | JobStatus::Starting | JobStatus::Stopping => (
            None,
            format!(
                "Job is {}... {records_processed} records processed so far.",
                job_status.as_str().to_lowercase()
            ),
        ),
        JobStatus::Unknown => (
            None,
            format!("Job status: {job_status} - {records_processed} processed so far."),
        ),
    };

    ProgressReport {
        source_key: source_key.to_string(),
        job_status,
        job_run_id: run.map(|r| r.run_id.clone()),
        processed,
        success,
        records_processed,
        total_records,
        successful_records: records_processed,
        error_records,
        duration_seconds,
        processing_speed,
        capacity_units: run.map(|r| r.capacity_units),
        message,
        warnings,
    }
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

/// Polls the job runner and the record store and derives a progress report.
///
/// Read-only: each poll is independent and mutates nothing, so it can run
/// concurrently with the write loop. Runner failures degrade to UNKNOWN with
/// a warning rather than blocking the count that is already known.
pub struct Reconciler {
    runner: Arc<dyn JobRunner>,
    records: Arc<dyn RecordStore>,
    job_name: String,
    max_runs: usize,
}

impl Reconciler {
    pub fn new(
        runner: Arc<dyn JobRunner>,
        records: Arc<dyn RecordStore>,
        job_name: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            records,
            job_name: job_name.into(),
            max_runs: 10,
        }
    }

    pub async fn check(&self, source_key: &str) -> ProgressReport {
        let mut warnings = Vec::new();

        let (count, runs) = join!(
            self.records.count_for_source(source_key),
            self.runner.list_runs(&self.job_name, self.max_runs),
        );

        let records_processed = match count {
            Ok(count) => count,
            Err(e) => {
                warn!(source_key, error = %e, "could not count persisted records");
                warnings.push(format!("Could not count persisted records: {e}"));
                0
            }
        };

        let runs = match runs {
            Ok(runs) => runs,
            Err(e) => {
                warn!(source_key, error = %e, "could not check job status");
                warnings.push(format!("Could not check job status: {e}"));
                Vec::new()
            }
        };

        let (run, fell_back) = match_run(&runs, source_key);
        if fell_back {
            warnings.push(
                "No run matched this source key; reporting the most recent run".to_string(),
            );
        }

        reconcile(source_key, run, records_processed, Utc::now(), warnings)
    }
}
