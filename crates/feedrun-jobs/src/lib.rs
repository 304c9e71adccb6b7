//! # Background Feed Refresh
//!
//! Refreshes subscribed feeds off the request path. A fixed pool of workers
//! competes for jobs on one in-memory queue, runs the refresh operation, records
//! first-attempt telemetry and hands failures to a detached retry sequence.
//!
//! ## Features
//!
//! - **Competing workers**: every worker drains the same FIFO queue
//! - **Self-throttling**: each worker sleeps a fixed interval after every job,
//!   capping the pool at `pool_size / interval` refreshes per second
//! - **Detached retries**: up to 3 re-attempts with delays drawn uniformly from
//!   [1, 300] seconds, running next to normal consumption
//! - **Graceful shutdown**: one cancellation token reaches every suspension point
//!
//! ## Architecture
//!
//! ```text
//! producer ──push──▶ ┌──────────────┐
//!                    │   JobQueue   │  (FIFO, multi-consumer)
//!                    └──────┬───────┘
//!              ┌────────────┼────────────┐
//!              ▼            ▼            ▼
//!         [Worker 1]   [Worker 2]   [Worker N]  ── MetricsCollector
//!              │ failure
//!              ▼
//!        RetryScheduler ──spawn──▶ [retry task] ... (TaskTracker)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use feedrun_jobs::prelude::*;
//!
//! let pool = WorkerPool::new(refresher, WorkerPoolConfig::from_env());
//! pool.start()?;
//!
//! pool.push([RefreshJob::new(1, 10), RefreshJob::new(1, 20)]);
//!
//! // ... later
//! pool.shutdown().await?;
//! ```

pub mod job;
pub mod metrics;
pub mod queue;
pub mod refresh;
pub mod reliability;
pub mod telemetry;
pub mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::job::RefreshJob;
    pub use crate::metrics::{InMemoryMetrics, MetricsCollector, OtelRefreshMetrics, RefreshStatus};
    pub use crate::queue::JobQueue;
    pub use crate::refresh::{refresh_fn, FeedRefresher, RefreshError};
    pub use crate::reliability::{RetryOutcome, RetryPolicy, RetryScheduler};
    pub use crate::worker::{
        Worker, WorkerPool, WorkerPoolConfig, WorkerPoolError, WorkerPoolStatus,
    };
}

// Re-export key types at crate root
pub use job::RefreshJob;
pub use metrics::{InMemoryMetrics, MetricsCollector, OtelRefreshMetrics, RefreshStatus};
pub use queue::JobQueue;
pub use refresh::{refresh_fn, FeedRefresher, RefreshError};
pub use reliability::{RetryOutcome, RetryPolicy, RetryScheduler};
pub use worker::{Worker, WorkerPool, WorkerPoolConfig, WorkerPoolError, WorkerPoolStatus};
