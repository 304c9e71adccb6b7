//! Shared in-memory job queue
//!
//! An unbounded FIFO drained by any number of competing workers. The single
//! receiver sits behind a fair async mutex, so waiting consumers are served in
//! the order they started waiting and each job is delivered exactly once.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::job::RefreshJob;

/// Multi-producer, multi-consumer FIFO of [`RefreshJob`]s
///
/// Cloning is cheap and every clone refers to the same queue.
///
/// # Example
///
/// ```
/// use feedrun_jobs::{JobQueue, RefreshJob};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = JobQueue::new();
/// queue.enqueue(RefreshJob::new(1, 10));
///
/// assert_eq!(queue.dequeue().await, Some(RefreshJob::new(1, 10)));
/// # }
/// ```
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<RefreshJob>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<RefreshJob>>>,
}

impl JobQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Append a job to the back of the queue
    pub fn enqueue(&self, job: RefreshJob) {
        // The receiver is owned by the queue itself, so sending cannot fail
        // while `self` is alive.
        let _ = self.tx.send(job);
    }

    /// Append a batch of jobs, preserving their order
    ///
    /// Returns the number of jobs enqueued.
    pub fn push(&self, jobs: impl IntoIterator<Item = RefreshJob>) -> usize {
        let mut count = 0;
        for job in jobs {
            self.enqueue(job);
            count += 1;
        }
        count
    }

    /// Wait for the next job
    ///
    /// Cancel-safe: dropping the future before it resolves never loses a job.
    /// Returns `None` only if the channel has been closed, which cannot happen
    /// while this queue is alive.
    pub async fn dequeue(&self) -> Option<RefreshJob> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = JobQueue::new();
        let pushed = queue.push([
            RefreshJob::new(1, 10),
            RefreshJob::new(1, 20),
            RefreshJob::new(2, 30),
        ]);
        assert_eq!(pushed, 3);

        assert_eq!(queue.dequeue().await, Some(RefreshJob::new(1, 10)));
        assert_eq!(queue.dequeue().await, Some(RefreshJob::new(1, 20)));
        assert_eq!(queue.dequeue().await, Some(RefreshJob::new(2, 30)));
    }

    #[tokio::test]
    async fn test_waiting_consumers_served_in_order() {
        let queue = JobQueue::new();

        let first = tokio::spawn({
            let queue = queue.clone();
            async move { queue.dequeue().await }
        });
        tokio::task::yield_now().await;

        let second = tokio::spawn({
            let queue = queue.clone();
            async move { queue.dequeue().await }
        });
        tokio::task::yield_now().await;

        queue.enqueue(RefreshJob::new(1, 10));
        queue.enqueue(RefreshJob::new(1, 20));

        assert_eq!(first.await.unwrap(), Some(RefreshJob::new(1, 10)));
        assert_eq!(second.await.unwrap(), Some(RefreshJob::new(1, 20)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_dequeue_does_not_lose_jobs() {
        let queue = JobQueue::new();

        let timed_out = tokio::time::timeout(Duration::from_secs(1), queue.dequeue()).await;
        assert!(timed_out.is_err());

        queue.enqueue(RefreshJob::new(3, 40));
        assert_eq!(queue.dequeue().await, Some(RefreshJob::new(3, 40)));
    }

    #[tokio::test]
    async fn test_each_job_delivered_once() {
        let queue = JobQueue::new();
        queue.push((0..50).map(|feed_id| RefreshJob::new(1, feed_id)));

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Ok(Some(job)) =
                    tokio::time::timeout(Duration::from_millis(50), queue.dequeue()).await
                {
                    seen.push(job.feed_id);
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }
}
