//! Feed refresh job

use serde::{Deserialize, Serialize};

/// One feed to refresh on behalf of one user
///
/// Jobs carry no execution state. Whichever worker dequeues a job first
/// consumes it; nothing is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefreshJob {
    /// Owning user
    pub user_id: i64,

    /// Feed to refresh
    pub feed_id: i64,
}

impl RefreshJob {
    /// Create a new job
    pub fn new(user_id: i64, feed_id: i64) -> Self {
        Self { user_id, feed_id }
    }
}

impl std::fmt::Display for RefreshJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "feed #{} for user #{}", self.feed_id, self.user_id)
    }
}
