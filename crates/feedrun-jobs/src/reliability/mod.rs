//! Reliability patterns for feed refresh
//!
//! This module provides:
//! - [`RetryPolicy`] - Bounded retries with uniformly jittered delays
//! - [`RetryScheduler`] - Detached, cancellation-aware retry sequences

mod retry;

pub(crate) use retry::duration_secs;
pub use retry::{RetryOutcome, RetryPolicy, RetryScheduler};
