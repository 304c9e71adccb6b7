//! Workers and the worker pool
//!
//! This module provides:
//! - [`Worker`] - Drains the queue, times first attempts, hands failures to retries
//! - [`WorkerPool`] - Fixed set of competing workers with graceful shutdown
//! - [`WorkerPoolConfig`] - Pool size, throttle, retry and metrics settings
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        WorkerPool                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                 JobQueue (FIFO)                      │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │         │                 │                  │               │
//! │         ▼                 ▼                  ▼               │
//! │   [Worker 1]        [Worker 2]   ...   [Worker N]           │
//! │   refresh → metrics → sleep 5s          (TaskTracker)       │
//! │         │ failure                                            │
//! │         ▼                                                    │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │   RetryScheduler: 3 × (sleep 1..=300s → refresh)     │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │                                                              │
//! │  CancellationToken ── dequeue / pause / retry delay         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod pool;
mod runner;

pub use pool::{
    WorkerPool, WorkerPoolConfig, WorkerPoolError, WorkerPoolStatus, DEFAULT_POOL_SIZE,
};
pub use runner::Worker;
