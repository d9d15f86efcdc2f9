//! Bounded job queue and worker pool.
//!
//! Jobs carry a retry budget and an exponential backoff base. Workers poll
//! with a short timeout so the stop signal is noticed promptly; in-flight
//! jobs run to completion, and exhausted retries land the job on the
//! dead-letter list.

use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const POLL_TIMEOUT: Duration = Duration::from_millis(500);

type JobFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// One unit of queued work. `run` is a factory so retries re-execute from
/// scratch.
#[derive(Clone)]
pub struct Job {
    pub name: String,
    retries: u32,
    backoff: Duration,
    run: JobFn,
}

impl Job {
    pub fn new<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            retries: 3,
            backoff: Duration::from_millis(500),
            run: Arc::new(move || {
                let fut: BoxFuture<'static, anyhow::Result<()>> = Box::pin(run());
                fut
            }),
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// A job whose retries were exhausted.
#[derive(Debug, Clone)]
pub struct DeadJob {
    pub name: String,
    pub error: String,
}

/// Producer handle onto the bounded queue.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
}

impl JobQueue {
    /// Enqueue a job, waiting when the queue is at capacity.
    pub async fn enqueue(&self, job: Job) -> anyhow::Result<()> {
        let name = job.name.clone();
        self.tx
            .send(job)
            .await
            .map_err(|_| anyhow::anyhow!("job queue closed"))?;
        info!(job = %name, "job enqueued");
        Ok(())
    }
}

/// The worker pool draining the queue.
pub struct WorkerPool {
    dead_letter: Arc<Mutex<Vec<DeadJob>>>,
    stop: CancellationToken,
}

impl WorkerPool {
    /// Start `worker_count` workers over a queue of `capacity` entries.
    /// Workers are detached: process exit does not wait for them.
    pub fn start(worker_count: usize, capacity: usize, stop: CancellationToken) -> (JobQueue, WorkerPool) {
        let (tx, rx) = mpsc::channel::<Job>(capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let dead_letter = Arc::new(Mutex::new(Vec::new()));

        for worker_id in 0..worker_count.max(1) {
            let rx = rx.clone();
            let dead_letter = dead_letter.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                worker_loop(worker_id, rx, dead_letter, stop).await;
            });
        }
        info!(count = worker_count.max(1), "workers started");

        (JobQueue { tx }, WorkerPool { dead_letter, stop })
    }

    /// Signal termination. In-flight jobs complete; queued jobs are dropped.
    pub fn stop_workers(&self) {
        self.stop.cancel();
        info!("workers stopped");
    }

    /// Snapshot of the dead-letter list.
    pub fn dead_letter(&self) -> Vec<DeadJob> {
        self.dead_letter.lock().unwrap().clone()
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    dead_letter: Arc<Mutex<Vec<DeadJob>>>,
    stop: CancellationToken,
) {
    loop {
        if stop.is_cancelled() {
            break;
        }
        // Hold the receiver only while polling; processing happens outside
        // the lock so the other workers keep draining.
        let job = {
            let mut rx = rx.lock().await;
            match tokio::time::timeout(POLL_TIMEOUT, rx.recv()).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(_) => continue,
            }
        };
        run_job(job, &dead_letter).await;
    }
    tracing::debug!(worker_id, "worker exited");
}

/// Execute one job with retries: delay `backoff * 2^(attempt - 1)` after the
/// attempt'th failure, dead-letter once the budget is spent.
async fn run_job(job: Job, dead_letter: &Arc<Mutex<Vec<DeadJob>>>) {
    let mut attempt: u32 = 0;
    loop {
        match (job.run)().await {
            Ok(()) => return,
            Err(err) => {
                attempt += 1;
                if attempt > job.retries {
                    error!(job = %job.name, error = %err, "job failed, dead-lettered");
                    dead_letter.lock().unwrap().push(DeadJob {
                        name: job.name.clone(),
                        error: err.to_string(),
                    });
                    return;
                }
                warn!(job = %job.name, attempt, error = %err, "job failed, retrying");
                tokio::time::sleep(job.backoff * 2u32.pow(attempt - 1)).await;
            }
        }
    }
}
