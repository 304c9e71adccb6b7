//! Refresh operation contract
//!
//! Fetching, parsing and persisting a feed happens elsewhere. Workers and
//! retry sequences only see the [`FeedRefresher`] trait.

use std::future::Future;

use async_trait::async_trait;

/// Why a refresh attempt failed
///
/// Every variant is treated as transient and retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    /// The feed does not exist for this user
    #[error("feed #{feed_id} not found for user #{user_id}")]
    FeedNotFound { user_id: i64, feed_id: i64 },

    /// Retrieving the feed document failed
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The feed document could not be parsed
    #[error("parse failed: {0}")]
    Parse(String),

    /// Persisting the parsed entries failed
    #[error("store error: {0}")]
    Store(String),
}

/// Refreshes one user's feed
///
/// Implementations are called concurrently from every worker and every
/// retry sequence, possibly for the same feed at the same time. Nothing in
/// this crate bounds how long a call may take: a refresh that never returns
/// blocks its worker indefinitely.
#[async_trait]
pub trait FeedRefresher: Send + Sync {
    /// Refresh `feed_id` on behalf of `user_id`
    async fn refresh(&self, user_id: i64, feed_id: i64) -> Result<(), RefreshError>;
}

/// [`FeedRefresher`] backed by an async closure
///
/// Built with [`refresh_fn`].
pub struct FnRefresher<F> {
    f: F,
}

/// Adapt an async closure into a [`FeedRefresher`]
///
/// # Example
///
/// ```
/// use feedrun_jobs::{refresh_fn, RefreshError};
///
/// let refresher = refresh_fn(|_user_id, feed_id| async move {
///     if feed_id < 0 {
///         return Err(RefreshError::Fetch("bad feed".into()));
///     }
///     Ok(())
/// });
/// ```
pub fn refresh_fn<F, Fut>(f: F) -> FnRefresher<F>
where
    F: Fn(i64, i64) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), RefreshError>> + Send + 'static,
{
    FnRefresher { f }
}

#[async_trait]
impl<F, Fut> FeedRefresher for FnRefresher<F>
where
    F: Fn(i64, i64) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), RefreshError>> + Send + 'static,
{
    async fn refresh(&self, user_id: i64, feed_id: i64) -> Result<(), RefreshError> {
        (self.f)(user_id, feed_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RefreshError::FeedNotFound {
            user_id: 2,
            feed_id: 30,
        };
        assert_eq!(err.to_string(), "feed #30 not found for user #2");
        assert_eq!(
            RefreshError::Fetch("connection reset".into()).to_string(),
            "fetch failed: connection reset"
        );
    }

    #[tokio::test]
    async fn test_refresh_fn() {
        let refresher = refresh_fn(|user_id, feed_id| async move {
            if feed_id == 30 {
                Err(RefreshError::FeedNotFound { user_id, feed_id })
            } else {
                Ok(())
            }
        });

        assert!(refresher.refresh(1, 10).await.is_ok());
        assert_eq!(
            refresher.refresh(2, 30).await,
            Err(RefreshError::FeedNotFound {
                user_id: 2,
                feed_id: 30
            })
        );
    }
}
