//! Retry policy and detached retry sequences

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::job::RefreshJob;
use crate::refresh::{FeedRefresher, RefreshError};

/// Configuration for feed refresh retries
///
/// Each retry waits a whole number of seconds drawn uniformly from
/// `[min_delay, max_delay]`. Independent jitter spreads retries for feeds that
/// failed together (one upstream host going down) across the whole window.
///
/// # Example
///
/// ```
/// use feedrun_jobs::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_retries, 3);
///
/// let delay = policy.next_delay();
/// assert!(delay >= Duration::from_secs(1) && delay <= Duration::from_secs(300));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Re-attempts after the initial failure
    pub max_retries: u32,

    /// Shortest delay before a retry
    #[serde(with = "duration_secs")]
    pub min_delay: Duration,

    /// Longest delay before a retry
    #[serde(with = "duration_secs")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Create a policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the number of re-attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay window
    ///
    /// Bounds are truncated to whole seconds and swapped if given in the
    /// wrong order.
    pub fn with_delay_range(mut self, min: Duration, max: Duration) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.min_delay = Duration::from_secs(min.as_secs());
        self.max_delay = Duration::from_secs(max.as_secs());
        self
    }

    /// Draw the delay before the next retry
    pub fn next_delay(&self) -> Duration {
        let lo = self.min_delay.as_secs().min(self.max_delay.as_secs());
        let hi = self.min_delay.as_secs().max(self.max_delay.as_secs());
        let secs = rand::thread_rng().gen_range(lo..=hi);
        Duration::from_secs(secs)
    }

    /// Check if a retry with this 0-based index is allowed
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// How a retry sequence ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Retry `attempt` (0-based) succeeded
    Recovered { attempt: u32 },

    /// Every retry failed; holds the error from the last one
    Exhausted { last_error: RefreshError },

    /// Shutdown was signalled while waiting before retry `attempt`
    Cancelled { attempt: u32 },
}

/// Launches detached retry sequences for failed jobs
///
/// Every sequence runs on the shared [`TaskTracker`], so the owner can wait
/// for them on shutdown, and stops early when the [`CancellationToken`] fires.
/// Attempts within one sequence are strictly sequential. Nothing prevents two
/// sequences for the same feed from overlapping.
#[derive(Clone)]
pub struct RetryScheduler {
    refresher: Arc<dyn FeedRefresher>,
    policy: RetryPolicy,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl RetryScheduler {
    /// Create a scheduler
    pub fn new(
        refresher: Arc<dyn FeedRefresher>,
        policy: RetryPolicy,
        tracker: TaskTracker,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            refresher,
            policy,
            tracker,
            cancel,
        }
    }

    /// Get the retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Start a retry sequence for `job` without waiting for it
    ///
    /// `error` is the failure of the initial attempt.
    pub fn spawn(&self, job: RefreshJob, error: RefreshError) -> JoinHandle<RetryOutcome> {
        let scheduler = self.clone();
        self.tracker
            .spawn(async move { scheduler.run(job, error).await })
    }

    /// Run a retry sequence for `job` to completion
    pub async fn run(&self, job: RefreshJob, error: RefreshError) -> RetryOutcome {
        let mut last_error = error;
        let mut attempt = 0;

        while self.policy.allows(attempt) {
            let delay = self.policy.next_delay();
            info!(
                user_id = job.user_id,
                feed_id = job.feed_id,
                attempt,
                delay_secs = delay.as_secs(),
                "Retrying feed refresh after delay"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(feed_id = job.feed_id, attempt, "Retry cancelled by shutdown");
                    return RetryOutcome::Cancelled { attempt };
                }
                _ = tokio::time::sleep(delay) => {}
            }

            match self.refresher.refresh(job.user_id, job.feed_id).await {
                Ok(()) => {
                    info!(
                        user_id = job.user_id,
                        feed_id = job.feed_id,
                        attempt,
                        "Feed refresh succeeded on retry"
                    );
                    return RetryOutcome::Recovered { attempt };
                }
                Err(e) => {
                    warn!(
                        user_id = job.user_id,
                        feed_id = job.feed_id,
                        attempt,
                        error = %e,
                        "Feed refresh retry failed"
                    );
                    last_error = e;
                }
            }

            attempt += 1;
        }

        error!(
            user_id = job.user_id,
            feed_id = job.feed_id,
            retries = self.policy.max_retries,
            error = %last_error,
            "Feed refresh still failing after all retries, giving up"
        );
        RetryOutcome::Exhausted { last_error }
    }
}

/// Serde support for Duration as whole seconds
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
