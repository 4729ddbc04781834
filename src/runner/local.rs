use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{error, info};
use uuid::Uuid;

use super::{JobRunner, JobStatus, RunInfo, RunnerError};
use crate::pipeline::CsvProcessor;

/// In-process job runner executing the CSV pipeline on spawned tasks.
///
/// Concurrency is bounded by a semaphore: when no permit is free,
/// `start_run` fails with `ConcurrencyLimitExceeded` instead of queueing,
/// mirroring how an external runner rejects work at capacity. Run state only
/// ever advances through the stage progression.
pub struct LocalJobRunner {
    job_name: String,
    processor: Arc<CsvProcessor>,
    permits: Arc<Semaphore>,
    capacity_units: f64,
    runs: Arc<Mutex<Vec<RunInfo>>>,
}

impl LocalJobRunner {
    pub fn new(job_name: impl Into<String>, processor: Arc<CsvProcessor>, max_concurrent: usize) -> Self {
        Self {
            job_name: job_name.into(),
            processor,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            capacity_units: max_concurrent as f64,
            runs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn advance(runs: &Mutex<Vec<RunInfo>>, run_id: &str, next: JobStatus) {
        let mut runs = runs.lock().unwrap();
        if let Some(run) = runs.iter_mut().find(|r| r.run_id == run_id) {
            // never step back to an earlier stage
            if next.stage_rank() >= run.state.stage_rank() && !run.state.is_terminal() {
                run.state = next;
                if next.is_terminal() {
                    run.completed_at = Some(Utc::now());
                }
            }
        }
    }
}

#[async_trait]
impl JobRunner for LocalJobRunner {
    async fn start_run(
        &self,
        job_name: &str,
        arguments: HashMap<String, String>,
    ) -> Result<String, RunnerError> {
        if job_name != self.job_name {
            return Err(RunnerError::UnknownJob(job_name.to_string()));
        }

        let permit = self
            .permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| RunnerError::ConcurrencyLimitExceeded)?;

        let run_id = format!("run-{}", Uuid::new_v4());
        let source_key = arguments.get("source_key").cloned().unwrap_or_default();
        let model_name = arguments.get("model").cloned();

        self.runs.lock().unwrap().push(RunInfo {
            run_id: run_id.clone(),
            state: JobStatus::Starting,
            arguments,
            started_at: Some(Utc::now()),
            completed_at: None,
            capacity_units: self.capacity_units,
        });
        info!(%run_id, %source_key, "run started");

        let processor = self.processor.clone();
        let runs = self.runs.clone();
        let task_run_id = run_id.clone();
        tokio::spawn(async move {
            Self::advance(&runs, &task_run_id, JobStatus::Running);

            let outcome = processor
                .process(&source_key, &task_run_id, model_name.as_deref())
                .await;

            let final_state = if outcome.success {
                JobStatus::Succeeded
            } else {
                error!(run_id = %task_run_id, message = %outcome.message, "run failed");
                JobStatus::Failed
            };
            Self::advance(&runs, &task_run_id, final_state);
            info!(
                run_id = %task_run_id,
                state = %final_state,
                successful = outcome.successful_records,
                errors = outcome.error_records,
                "run finished"
            );

            drop(permit);
        });

        Ok(run_id)
    }

    async fn list_runs(
        &self,
        job_name: &str,
        max_results: usize,
    ) -> Result<Vec<RunInfo>, RunnerError> {
        if job_name != self.job_name {
            return Err(RunnerError::UnknownJob(job_name.to_string()));
        }
        let runs = self.runs.lock().unwrap();
        Ok(runs.iter().rev().take(max_results).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRecordStore;
    use crate::graphql::testing::ScriptedApi;
    use crate::graphql::SubmissionClient;
    use crate::models::ModelRegistry;
    use crate::storage::{MemoryObjectStore, ObjectStore};
    use std::time::Duration;

    fn processor(objects: Arc<MemoryObjectStore>) -> Arc<CsvProcessor> {
        Arc::new(CsvProcessor::new(
            Arc::new(ModelRegistry::new()),
            objects,
            Arc::new(MemoryRecordStore::new()),
            SubmissionClient::new(Arc::new(ScriptedApi::new(vec![]))),
            "uploads",
        ))
    }

    fn args(key: &str) -> HashMap<String, String> {
        HashMap::from([("source_key".to_string(), key.to_string())])
    }

    async fn wait_terminal(runner: &LocalJobRunner, run_id: &str) -> RunInfo {
        for _ in 0..100 {
            let runs = runner.list_runs("job", 10).await.unwrap();
            if let Some(run) = runs.iter().find(|r| r.run_id == run_id) {
                if run.state.is_terminal() {
                    return run.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {run_id} never reached a terminal state");
    }

    #[tokio::test]
    async fn run_succeeds_and_records_completion_time() {
        let objects = Arc::new(MemoryObjectStore::new());
        objects
            .put("uploads", "a.csv", b"name,email\nAda,a@b.c\n".to_vec(), "text/csv")
            .await
            .unwrap();
        let runner = LocalJobRunner::new("job", processor(objects), 2);

        let run_id = runner.start_run("job", args("a.csv")).await.unwrap();
        let run = wait_terminal(&runner, &run_id).await;

        assert_eq!(run.state, JobStatus::Succeeded);
        assert!(run.started_at.is_some());
        assert!(run.completed_at.is_some());
        assert_eq!(run.arguments.get("source_key").unwrap(), "a.csv");
    }

    #[tokio::test]
    async fn fatal_pipeline_failure_marks_run_failed() {
        let objects = Arc::new(MemoryObjectStore::new());
        let runner = LocalJobRunner::new("job", processor(objects), 2);

        let run_id = runner.start_run("job", args("missing.csv")).await.unwrap();
        let run = wait_terminal(&runner, &run_id).await;
        assert_eq!(run.state, JobStatus::Failed);
    }

    #[tokio::test]
    async fn at_capacity_start_is_rejected_not_queued() {
        let objects = Arc::new(MemoryObjectStore::new());
        let runner = LocalJobRunner::new("job", processor(objects), 0);

        let err = runner.start_run("job", args("a.csv")).await.unwrap_err();
        assert!(matches!(err, RunnerError::ConcurrencyLimitExceeded));
    }

    #[tokio::test]
    async fn list_runs_is_most_recent_first() {
        let objects = Arc::new(MemoryObjectStore::new());
        let runner = LocalJobRunner::new("job", processor(objects), 4);

        let first = runner.start_run("job", args("one.csv")).await.unwrap();
        let second = runner.start_run("job", args("two.csv")).await.unwrap();

        let runs = runner.list_runs("job", 10).await.unwrap();
        assert_eq!(runs[0].run_id, second);
        assert_eq!(runs[1].run_id, first);

        wait_terminal(&runner, &first).await;
        wait_terminal(&runner, &second).await;
    }

    #[tokio::test]
    async fn unknown_job_name_is_an_error() {
        let objects = Arc::new(MemoryObjectStore::new());
        let runner = LocalJobRunner::new("job", processor(objects), 1);
        assert!(matches!(
            runner.start_run("other-job", args("a.csv")).await,
            Err(RunnerError::UnknownJob(_))
        ));
        assert!(matches!(
            runner.list_runs("other-job", 5).await,
            Err(RunnerError::UnknownJob(_))
        ));
    }

    #[test]
    fn advance_never_regresses_past_terminal() {
        let runs = Mutex::new(vec![RunInfo {
            run_id: "r1".to_string(),
            state: JobStatus::Starting,
            arguments: HashMap::new(),
            started_at: Some(Utc::now()),
            completed_at: None,
            capacity_units: 1.0,
        }]);

        LocalJobRunner::advance(&runs, "r1", JobStatus::Running);
        assert_eq!(runs.lock().unwrap()[0].state, JobStatus::Running);

        // attempts to step back are ignored
        LocalJobRunner::advance(&runs, "r1", JobStatus::Starting);
        assert_eq!(runs.lock().unwrap()[0].state, JobStatus::Running);

        LocalJobRunner::advance(&runs, "r1", JobStatus::Succeeded);
        LocalJobRunner::advance(&runs, "r1", JobStatus::Running);
        assert_eq!(runs.lock().unwrap()[0].state, JobStatus::Succeeded);
    }
}
