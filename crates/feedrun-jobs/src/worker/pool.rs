//! Worker pool for background feed refresh
//!
//! Runs a fixed set of workers against one shared queue and owns every task
//! they spawn, so shutdown can be driven explicitly.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use super::runner::Worker;
use crate::job::RefreshJob;
use crate::metrics::{MetricsCollector, OtelRefreshMetrics};
use crate::queue::JobQueue;
use crate::refresh::FeedRefresher;
use crate::reliability::{duration_secs, RetryPolicy, RetryScheduler};

/// Default number of workers
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerPoolConfig {
    /// Number of competing workers
    pub pool_size: usize,

    /// Pause after every job before dequeuing the next
    #[serde(with = "duration_secs")]
    pub quiescence_interval: Duration,

    /// Retry policy for failed refreshes
    pub retry: RetryPolicy,

    /// Record first-attempt durations to the OpenTelemetry histogram
    pub metrics_collector: bool,

    /// Graceful shutdown timeout
    #[serde(with = "duration_secs")]
    pub shutdown_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            quiescence_interval: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            metrics_collector: false,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerPoolConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKER_POOL_SIZE` | `5` | Number of workers |
    /// | `METRICS_COLLECTOR` | `false` | Record refresh durations |
    /// | `WORKER_SHUTDOWN_TIMEOUT` | `30` | Seconds to wait for tasks on shutdown |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup
    ///
    /// Unparseable values fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let pool_size = parse_or(&lookup, "WORKER_POOL_SIZE", defaults.pool_size).max(1);

        let metrics_collector = match lookup("METRICS_COLLECTOR") {
            Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
            None => defaults.metrics_collector,
        };

        let shutdown_timeout = Duration::from_secs(parse_or(
            &lookup,
            "WORKER_SHUTDOWN_TIMEOUT",
            defaults.shutdown_timeout.as_secs(),
        ));

        Self {
            pool_size,
            metrics_collector,
            shutdown_timeout,
            ..defaults
        }
    }

    /// Set the number of workers
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    /// Set the post-job pause
    pub fn with_quiescence_interval(mut self, interval: Duration) -> Self {
        self.quiescence_interval = interval;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Enable or disable the OpenTelemetry collector
    pub fn with_metrics_collector(mut self, enabled: bool) -> Self {
        self.metrics_collector = enabled;
        self
    }

    /// Set shutdown timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "Invalid configuration value, using default");
                default
            }
        },
        None => default,
    }
}

/// Worker pool status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPoolStatus {
    /// Workers are draining the queue
    Running,
    /// Shutdown signalled, waiting for in-flight work
    Draining,
    /// Not started, or fully stopped
    Stopped,
}

/// Worker pool errors
#[derive(Debug, thiserror::Error)]
pub enum WorkerPoolError {
    /// Worker pool already running
    #[error("worker pool is already running")]
    AlreadyRunning,

    /// Pool was shut down and cannot be restarted
    #[error("worker pool has been shut down")]
    ShutDown,

    /// Shutdown timeout
    #[error("graceful shutdown timed out with {remaining} tasks still running")]
    ShutdownTimeout { remaining: usize },
}

/// Pool of workers refreshing feeds in the background
///
/// # Example
///
/// ```ignore
/// use feedrun_jobs::{RefreshJob, WorkerPool, WorkerPoolConfig};
///
/// let pool = WorkerPool::new(refresher, WorkerPoolConfig::default().with_pool_size(2));
/// pool.start()?;
///
/// pool.push([RefreshJob::new(1, 10), RefreshJob::new(1, 20)]);
///
/// // ... later, graceful shutdown
/// pool.shutdown().await?;
/// ```
pub struct WorkerPool {
    queue: JobQueue,
    refresher: Arc<dyn FeedRefresher>,
    metrics: Option<Arc<dyn MetricsCollector>>,
    config: WorkerPoolConfig,
    cancel: CancellationToken,
    tracker: TaskTracker,
    status: RwLock<WorkerPoolStatus>,
}

impl WorkerPool {
    /// Create a new worker pool with its own queue
    pub fn new(refresher: Arc<dyn FeedRefresher>, config: WorkerPoolConfig) -> Self {
        Self::with_queue(JobQueue::new(), refresher, config)
    }

    /// Create a new worker pool draining an existing queue
    pub fn with_queue(
        queue: JobQueue,
        refresher: Arc<dyn FeedRefresher>,
        config: WorkerPoolConfig,
    ) -> Self {
        let metrics: Option<Arc<dyn MetricsCollector>> = if config.metrics_collector {
            Some(Arc::new(OtelRefreshMetrics::new()))
        } else {
            None
        };

        Self {
            queue,
            refresher,
            metrics,
            config,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            status: RwLock::new(WorkerPoolStatus::Stopped),
        }
    }

    /// Report first-attempt durations to `collector`
    ///
    /// Takes precedence over `metrics_collector` in the config.
    pub fn with_metrics(mut self, collector: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = Some(collector);
        self
    }

    /// Start every worker
    #[instrument(skip(self), fields(pool_size = self.config.pool_size))]
    pub fn start(&self) -> Result<(), WorkerPoolError> {
        let mut status = self.status.write();
        if self.cancel.is_cancelled() {
            return Err(WorkerPoolError::ShutDown);
        }
        if *status != WorkerPoolStatus::Stopped {
            return Err(WorkerPoolError::AlreadyRunning);
        }

        info!(
            pool_size = self.config.pool_size,
            metrics = self.metrics.is_some(),
            "Starting worker pool"
        );

        let retries = RetryScheduler::new(
            Arc::clone(&self.refresher),
            self.config.retry.clone(),
            self.tracker.clone(),
            self.cancel.clone(),
        );

        for id in 1..=self.config.pool_size {
            let worker = Worker::new(
                id,
                self.queue.clone(),
                Arc::clone(&self.refresher),
                retries.clone(),
                self.config.quiescence_interval,
                self.cancel.clone(),
            )
            .with_metrics(self.metrics.clone());

            self.tracker.spawn(worker.run());
        }

        *status = WorkerPoolStatus::Running;
        Ok(())
    }

    /// Shutdown the worker pool gracefully
    ///
    /// Workers stop at their next dequeue or pause, and retry sequences stop
    /// at their next delay. Refresh calls already in flight run to completion.
    ///
    /// Concurrent callers all wait for the same drain. On timeout the pool
    /// stays `Draining`, and a later call waits again.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<(), WorkerPoolError> {
        {
            let mut status = self.status.write();
            match *status {
                WorkerPoolStatus::Stopped => return Ok(()),
                WorkerPoolStatus::Running => {
                    *status = WorkerPoolStatus::Draining;
                    info!("Initiating graceful shutdown");
                    self.cancel.cancel();
                    self.tracker.close();
                }
                WorkerPoolStatus::Draining => debug!("Shutdown already in progress"),
            }
        }

        let drained =
            tokio::time::timeout(self.config.shutdown_timeout, self.tracker.wait()).await;

        if drained.is_err() {
            let remaining = self.tracker.len();
            warn!(remaining, "Shutdown timeout reached");
            return Err(WorkerPoolError::ShutdownTimeout { remaining });
        }

        let mut status = self.status.write();
        if *status == WorkerPoolStatus::Draining {
            *status = WorkerPoolStatus::Stopped;
            debug!("All tasks completed");
            info!("Worker pool stopped");
        }
        Ok(())
    }

    /// Enqueue one job
    pub fn enqueue(&self, job: RefreshJob) {
        self.queue.enqueue(job);
    }

    /// Enqueue a batch of jobs in order, returning how many were enqueued
    pub fn push(&self, jobs: impl IntoIterator<Item = RefreshJob>) -> usize {
        self.queue.push(jobs)
    }

    /// The queue this pool drains
    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Get current status
    pub fn status(&self) -> WorkerPoolStatus {
        *self.status.read()
    }

    /// Running workers plus live retry sequences
    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Get the configuration
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.pool_size, 5);
        assert_eq!(config.quiescence_interval, Duration::from_secs(5));
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(!config.metrics_collector);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_builder() {
        let config = WorkerPoolConfig::default()
            .with_pool_size(0)
            .with_quiescence_interval(Duration::from_secs(1))
            .with_retry(RetryPolicy::no_retry())
            .with_metrics_collector(true)
            .with_shutdown_timeout(Duration::from_secs(3));

        assert_eq!(config.pool_size, 1);
        assert_eq!(config.quiescence_interval, Duration::from_secs(1));
        assert_eq!(config.retry.max_retries, 0);
        assert!(config.metrics_collector);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_config_from_lookup() {
        let config = WorkerPoolConfig::from_lookup(lookup(&[
            ("WORKER_POOL_SIZE", "12"),
            ("METRICS_COLLECTOR", "TRUE"),
            ("WORKER_SHUTDOWN_TIMEOUT", "90"),
        ]));

        assert_eq!(config.pool_size, 12);
        assert!(config.metrics_collector);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(90));
        assert_eq!(config.quiescence_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_config_from_lookup_invalid_values_fall_back() {
        let config = WorkerPoolConfig::from_lookup(lookup(&[
            ("WORKER_POOL_SIZE", "many"),
            ("METRICS_COLLECTOR", "nope"),
            ("WORKER_SHUTDOWN_TIMEOUT", "-1"),
        ]));

        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert!(!config.metrics_collector);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));

        let zero = WorkerPoolConfig::from_lookup(lookup(&[("WORKER_POOL_SIZE", "0")]));
        assert_eq!(zero.pool_size, 1);
    }

    #[test]
    fn test_config_serialization() {
        let config = WorkerPoolConfig::default().with_pool_size(2);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["pool_size"], 2);
        assert_eq!(json["quiescence_interval"], 5);
        assert_eq!(json["retry"]["max_delay"], 300);

        let parsed: WorkerPoolConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_worker_pool_status() {
        assert_ne!(WorkerPoolStatus::Running, WorkerPoolStatus::Stopped);
        assert_ne!(WorkerPoolStatus::Draining, WorkerPoolStatus::Running);
    }
}
