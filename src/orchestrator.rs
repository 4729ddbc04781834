use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pipeline::{self, dedup};
use crate::runner::{JobRunner, RunnerError};
use crate::storage::ObjectStore;
use crate::worker::{PendingQueue, PendingRun};

/// Placeholder-run prefix handed out when the runner is at capacity.
pub const PENDING_PREFIX: &str = "pending_";

/// Tracking handle for one uploaded file.
#[derive(Debug, Clone, Serialize)]
pub struct UploadJob {
    pub source_key: String,
    pub content_hash: String,
    /// Run id from the runner, or a `pending_`-prefixed placeholder when the
    /// runner was at capacity and the run awaits out-of-band pickup.
    pub external_run_id: String,
    pub started_at: DateTime<Utc>,
    pub total_row_count: Option<u64>,
}

impl UploadJob {
    pub fn is_pending(&self) -> bool {
        self.external_run_id.starts_with(PENDING_PREFIX)
    }
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid CSV file: {0}")]
    InvalidCsv(#[from] csv::Error),

    #[error("Failed to store upload: {0}")]
    Store(#[from] crate::error::StorageError),

    #[error("Failed to start processing run: {0}")]
    Start(RunnerError),
}

/// Accepts an uploaded file and starts its processing run: store the bytes,
/// hash them, count the rows, start a run carrying that provenance as
/// arguments. A concurrency-limited runner is not fatal; the run is queued
/// and the caller gets a pending placeholder id to track.
pub struct JobOrchestrator {
    objects: Arc<dyn ObjectStore>,
    runner: Arc<dyn JobRunner>,
    pending: PendingQueue,
    bucket: String,
    job_name: String,
}

impl JobOrchestrator {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        runner: Arc<dyn JobRunner>,
        pending: PendingQueue,
        bucket: impl Into<String>,
        job_name: impl Into<String>,
    ) -> Self {
        Self {
            objects,
            runner,
            pending,
            bucket: bucket.into(),
            job_name: job_name.into(),
        }
    }

    pub async fn start(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        model_name: Option<&str>,
    ) -> Result<UploadJob, OrchestratorError> {
        let source_key = sanitize_key(filename);
        let content_hash = dedup::content_hash(&bytes);
        let total_rows = pipeline::count_rows(&bytes)?;

        self.objects
            .put(&self.bucket, &source_key, bytes, "text/csv")
            .await?;

        let mut arguments = HashMap::from([
            ("source_key".to_string(), source_key.clone()),
            ("content_hash".to_string(), content_hash.clone()),
            ("total_rows".to_string(), total_rows.to_string()),
        ]);
        if let Some(model) = model_name {
            arguments.insert("model".to_string(), model.to_string());
        }

        let external_run_id = match self.runner.start_run(&self.job_name, arguments.clone()).await {
            Ok(run_id) => run_id,
            Err(RunnerError::ConcurrencyLimitExceeded) => {
                let pending_id = format!("{PENDING_PREFIX}{}", Uuid::new_v4());
                warn!(%source_key, %pending_id, "runner at capacity, queueing run");
                self.pending.push(PendingRun {
                    job_name: self.job_name.clone(),
                    arguments,
                    pending_id: pending_id.clone(),
                });
                pending_id
            }
            Err(e) => return Err(OrchestratorError::Start(e)),
        };

        info!(%source_key, %external_run_id, total_rows, "upload accepted");

        Ok(UploadJob {
            source_key,
            content_hash,
            external_run_id,
            started_at: Utc::now(),
            total_row_count: Some(total_rows),
        })
    }
}

/// Strip any path components; object keys are flat file names.
fn sanitize_key(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    if name.is_empty() {
        format!("upload_{}.csv", Uuid::new_v4())
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::runner::RunInfo;
    use crate::storage::MemoryObjectStore;

    struct StubRunner {
        response: Mutex<Vec<Result<String, RunnerError>>>,
        seen_arguments: Mutex<Vec<HashMap<String, String>>>,
    }

    impl StubRunner {
        fn new(responses: Vec<Result<String, RunnerError>>) -> Self {
            let mut responses = responses;
            responses.reverse();
            Self {
                response: Mutex::new(responses),
                seen_arguments: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl JobRunner for StubRunner {
        async fn start_run(
            &self,
            _job_name: &str,
            arguments: HashMap<String, String>,
        ) -> Result<String, RunnerError> {
            self.seen_arguments.lock().unwrap().push(arguments);
            self.response
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Ok("run-default".to_string()))
        }

        async fn list_runs(
            &self,
            _job_name: &str,
            _max_results: usize,
        ) -> Result<Vec<RunInfo>, RunnerError> {
            Ok(vec![])
        }
    }

    const BYTES: &[u8] = b"name,email\nAda,ada@example.com\nGrace,grace@example.com\n";

    fn orchestrator(runner: StubRunner) -> (JobOrchestrator, Arc<MemoryObjectStore>, PendingQueue) {
        let objects = Arc::new(MemoryObjectStore::new());
        let queue = PendingQueue::new();
        let orchestrator = JobOrchestrator::new(
            objects.clone(),
            Arc::new(runner),
            queue.clone(),
            "uploads",
            "job",
        );
        (orchestrator, objects, queue)
    }

    #[tokio::test]
    async fn stores_object_and_starts_run_with_provenance_arguments() {
        let runner = StubRunner::new(vec![Ok("run-42".to_string())]);
        let (orchestrator, objects, queue) = orchestrator(runner);

        let job = orchestrator
            .start("customers.csv", BYTES.to_vec(), None)
            .await
            .unwrap();

        assert_eq!(job.source_key, "customers.csv");
        assert_eq!(job.external_run_id, "run-42");
        assert_eq!(job.total_row_count, Some(2));
        assert_eq!(job.content_hash, dedup::content_hash(BYTES));
        assert!(!job.is_pending());
        assert!(objects.contains("uploads", "customers.csv"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn concurrency_limit_downgrades_to_pending_and_queues() {
        let runner = StubRunner::new(vec![Err(RunnerError::ConcurrencyLimitExceeded)]);
        let (orchestrator, objects, queue) = orchestrator(runner);

        let job = orchestrator
            .start("customers.csv", BYTES.to_vec(), None)
            .await
            .unwrap();

        assert!(job.is_pending());
        assert!(job.external_run_id.starts_with("pending_"));
        // the upload itself still landed, ready for the queued run
        assert!(objects.contains("uploads", "customers.csv"));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn other_start_failures_are_fatal() {
        let runner = StubRunner::new(vec![Err(RunnerError::UnknownJob("job".to_string()))]);
        let (orchestrator, _objects, queue) = orchestrator(runner);

        let err = orchestrator
            .start("customers.csv", BYTES.to_vec(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Start(_)));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn explicit_model_travels_in_run_arguments() {
        let runner = StubRunner::new(vec![]);
        let objects = Arc::new(MemoryObjectStore::new());
        let queue = PendingQueue::new();
        let runner = Arc::new(runner);
        let orchestrator = JobOrchestrator::new(
            objects,
            runner.clone(),
            queue,
            "uploads",
            "job",
        );

        orchestrator
            .start("c.csv", BYTES.to_vec(), Some("customer"))
            .await
            .unwrap();

        let seen = runner.seen_arguments.lock().unwrap();
        assert_eq!(seen[0].get("model").unwrap(), "customer");
        assert_eq!(seen[0].get("total_rows").unwrap(), "2");
        assert_eq!(seen[0].get("source_key").unwrap(), "c.csv");
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_key("../../etc/passwd.csv"), "passwd.csv");
        assert_eq!(sanitize_key("C:\\temp\\data.csv"), "data.csv");
        assert_eq!(sanitize_key("plain.csv"), "plain.csv");
        assert!(sanitize_key("  ").starts_with("upload_"));
    }
}
