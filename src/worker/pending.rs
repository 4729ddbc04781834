use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use crate::runner::{JobRunner, RunnerError};

/// A run the orchestrator could not start because the runner was at
/// capacity. `pending_id` is the placeholder id the caller was given.
#[derive(Debug, Clone)]
pub struct PendingRun {
    pub job_name: String,
    pub arguments: HashMap<String, String>,
    pub pending_id: String,
}

/// FIFO of concurrency-limited runs awaiting out-of-band pickup.
#[derive(Clone, Default)]
pub struct PendingQueue {
    inner: Arc<Mutex<VecDeque<PendingRun>>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, run: PendingRun) {
        self.inner.lock().unwrap().push_back(run);
    }

    fn push_front(&self, run: PendingRun) {
        self.inner.lock().unwrap().push_front(run);
    }

    fn pop(&self) -> Option<PendingRun> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Background worker draining the pending queue.
///
/// Pops queued runs and retries them against the runner; while the runner
/// stays at capacity the run goes back to the front of the queue and the
/// worker sleeps. Stops when the shutdown channel flips.
pub struct PendingWorker {
    runner: Arc<dyn JobRunner>,
    queue: PendingQueue,
    poll_interval: Duration,
}

impl PendingWorker {
    pub fn new(runner: Arc<dyn JobRunner>, queue: PendingQueue) -> Self {
        Self {
            runner,
            queue,
            poll_interval: Duration::from_secs(5),
        }
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub async fn run(self, worker_id: u32, mut shutdown_rx: watch::Receiver<bool>) {
        info!(worker_id, "pending-run worker started");

        loop {
            if *shutdown_rx.borrow() {
                info!(worker_id, remaining = self.queue.len(), "pending-run worker stopping");
                break;
            }

            match self.queue.pop() {
                Some(pending) => {
                    match self
                        .runner
                        .start_run(&pending.job_name, pending.arguments.clone())
                        .await
                    {
                        Ok(run_id) => {
                            info!(
                                worker_id,
                                pending_id = %pending.pending_id,
                                %run_id,
                                "pending run started"
                            );
                        }
                        Err(RunnerError::ConcurrencyLimitExceeded) => {
                            // still saturated; retry this one first later
                            self.queue.push_front(pending);
                            self.wait(&mut shutdown_rx).await;
                        }
                        Err(e) => {
                            error!(
                                worker_id,
                                pending_id = %pending.pending_id,
                                error = %e,
                                "dropping pending run"
                            );
                        }
                    }
                }
                None => self.wait(&mut shutdown_rx).await,
            }
        }
    }

    async fn wait(&self, shutdown_rx: &mut watch::Receiver<bool>) {
        tokio::select! {
            _ = sleep(self.poll_interval) => {}
            _ = shutdown_rx.changed() => {}
        }
    }
}
