//! A single queue-draining worker

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::job::RefreshJob;
use crate::metrics::{MetricsCollector, RefreshStatus};
use crate::queue::JobQueue;
use crate::refresh::FeedRefresher;
use crate::reliability::RetryScheduler;

/// Drains the shared queue one job at a time
///
/// A failed refresh never ends the loop: it is reported, handed to the
/// [`RetryScheduler`] and the worker moves on. After every job the worker
/// sleeps for its quiescence interval, which caps how fast it issues
/// outbound refreshes.
///
/// There is no timeout around the refresh call. A refresh that hangs keeps
/// this worker busy until it returns, and shutdown waits for it.
pub struct Worker {
    id: usize,
    queue: JobQueue,
    refresher: Arc<dyn FeedRefresher>,
    retries: RetryScheduler,
    metrics: Option<Arc<dyn MetricsCollector>>,
    quiescence_interval: Duration,
    cancel: CancellationToken,
}

impl Worker {
    /// Create a worker with the given ordinal identity
    pub fn new(
        id: usize,
        queue: JobQueue,
        refresher: Arc<dyn FeedRefresher>,
        retries: RetryScheduler,
        quiescence_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            queue,
            refresher,
            retries,
            metrics: None,
            quiescence_interval,
            cancel,
        }
    }

    /// Report first-attempt durations to `metrics`
    pub fn with_metrics(mut self, metrics: Option<Arc<dyn MetricsCollector>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Worker identity, used for diagnostics only
    pub fn id(&self) -> usize {
        self.id
    }

    /// Run until cancelled
    pub async fn run(self) {
        info!(worker_id = self.id, "Worker started");

        loop {
            let job = tokio::select! {
                _ = self.cancel.cancelled() => break,
                job = self.queue.dequeue() => job,
            };

            let Some(job) = job else {
                debug!(worker_id = self.id, "Job queue closed");
                break;
            };

            debug!(
                worker_id = self.id,
                user_id = job.user_id,
                feed_id = job.feed_id,
                "Received feed refresh job"
            );

            self.process(job).await;

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.quiescence_interval) => {}
            }
        }

        info!(worker_id = self.id, "Worker stopped");
    }

    /// Run the initial attempt for `job`
    ///
    /// Times the attempt, reports it when a collector is configured and, on
    /// failure, starts a detached retry sequence. Never waits for retries.
    pub async fn process(&self, job: RefreshJob) -> RefreshStatus {
        let started = Instant::now();
        let result = self.refresher.refresh(job.user_id, job.feed_id).await;
        let elapsed = started.elapsed();

        let status = match &result {
            Ok(()) => RefreshStatus::Success,
            Err(_) => RefreshStatus::Error,
        };

        if let Some(metrics) = &self.metrics {
            metrics.observe_refresh(status, elapsed);
        }

        if let Err(error) = result {
            warn!(
                worker_id = self.id,
                user_id = job.user_id,
                feed_id = job.feed_id,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %error,
                "Feed refresh failed"
            );
            let _ = self.retries.spawn(job, error);
        }

        status
    }
}
