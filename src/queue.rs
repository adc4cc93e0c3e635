//! Background embedding queue.
//!
//! In-process, single-consumer job queue feeding the [`EmbeddingPipeline`].
//!
//! - `high` jobs go to the front, `normal` and `low` to the back (two bands)
//! - at most one job is in flight; a `processing` flag stops a second
//!   consumer loop from starting
//! - a failed job is re-queued at the **back** until it has failed
//!   `max_retries + 1` times, then dropped with a `warn!` event
//!
//! Lifecycle: create one queue at startup, pass it to whatever enqueues
//! jobs, and `wait_idle` or `clear` on shutdown.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::embeddings::types::{DEFAULT_MAX_RETRIES, DEFAULT_PROCESSING_DELAY_MS};
use crate::model::{EmbeddingJob, JobPriority};
use crate::pipeline::EmbeddingPipeline;

/// Queue tuning.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Pause between consecutive job attempts.
    pub processing_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            processing_delay: Duration::from_millis(DEFAULT_PROCESSING_DELAY_MS),
        }
    }
}

/// Snapshot returned by [`BackgroundQueue::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub queue_length: usize,
    pub processing: bool,
    /// Message ID of the job that will run next.
    pub next_job_id: Option<String>,
}

#[derive(Debug, Default)]
struct QueueState {
    jobs: VecDeque<EmbeddingJob>,
    processing: bool,
    /// Bumped by `clear` so a running consumer loop knows to stop.
    generation: u64,
}

#[derive(Debug)]
struct QueueInner {
    pipeline: EmbeddingPipeline,
    config: QueueConfig,
    state: Mutex<QueueState>,
    idle: Notify,
}

impl QueueInner {
    // The lock is never held across an await or a panic-prone call, so a
    // poisoned state is still consistent.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to the background queue. Clones share one queue.
#[derive(Debug, Clone)]
pub struct BackgroundQueue {
    inner: Arc<QueueInner>,
}

impl BackgroundQueue {
    #[must_use]
    pub fn new(pipeline: EmbeddingPipeline, config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                pipeline,
                config,
                state: Mutex::new(QueueState::default()),
                idle: Notify::new(),
            }),
        }
    }

    /// Add a job and start the consumer if it is idle.
    ///
    /// Must be called from within a Tokio runtime for the consumer to
    /// start; outside one, the job waits for the next enqueue that is.
    pub fn enqueue(&self, message_id: impl Into<String>, priority: JobPriority) {
        let job = EmbeddingJob::new(message_id, priority);
        let mut state = self.inner.lock();

        debug!(message_id = %job.message_id, %priority, "Enqueue embedding job");
        match priority {
            JobPriority::High => state.jobs.push_front(job),
            JobPriority::Normal | JobPriority::Low => state.jobs.push_back(job),
        }

        if state.processing {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                state.processing = true;
                let generation = state.generation;
                drop(state);
                handle.spawn(run(Arc::clone(&self.inner), generation));
            }
            Err(_) => warn!("No async runtime; embedding job left pending"),
        }
    }

    /// Introspect the queue without side effects.
    #[must_use]
    pub fn status(&self) -> QueueStatus {
        let state = self.inner.lock();
        QueueStatus {
            queue_length: state.jobs.len(),
            processing: state.processing,
            next_job_id: state.jobs.front().map(|job| job.message_id.clone()),
        }
    }

    /// Drop all pending jobs.
    ///
    /// A job already in flight finishes but is not retried. The consumer
    /// stays marked as processing until it has returned, so jobs enqueued
    /// meanwhile are picked up by that same loop rather than a second one.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        let dropped = state.jobs.len();
        state.jobs.clear();
        state.generation = state.generation.wrapping_add(1);
        drop(state);

        if dropped > 0 {
            info!(dropped, "Cleared embedding queue");
        }
    }

    /// Resolve once the consumer loop has drained the queue.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            let mut notified = std::pin::pin!(notified);
            // Register before checking so a wakeup between the check and
            // the await is not lost.
            notified.as_mut().enable();

            if !self.inner.lock().processing {
                return;
            }
            notified.await;
        }
    }
}

/// Consumer loop. Exits once the queue is empty.
///
/// After a `clear`, the job in flight is not retried and the loop carries
/// on with whatever was enqueued since, under the new generation.
async fn run(inner: Arc<QueueInner>, mut generation: u64) {
    loop {
        let mut job = {
            let mut state = inner.lock();
            if state.generation != generation {
                debug!(pending = state.jobs.len(), "Consumer resuming after clear");
                generation = state.generation;
            }
            if let Some(job) = state.jobs.pop_front() {
                job
            } else {
                state.processing = false;
                drop(state);
                inner.idle.notify_waiters();
                return;
            }
        };

        match inner.pipeline.process_by_id(&job.message_id).await {
            Ok(outcome) => {
                debug!(message_id = %job.message_id, ?outcome, "Embedding job done");
            }
            Err(e) => {
                let mut state = inner.lock();
                let attempts = job.retry_count() + 1;
                if state.generation != generation {
                    debug!(message_id = %job.message_id, attempts, error = %e, "Discarding failed job from before clear");
                } else if job.retry_count() < inner.config.max_retries {
                    job.mark_failed();
                    debug!(message_id = %job.message_id, attempts, error = %e, "Re-queueing failed embedding job");
                    state.jobs.push_back(job);
                } else {
                    warn!(message_id = %job.message_id, attempts, error = %e, "Dropping embedding job after retries exhausted");
                }
            }
        }

        let delay = inner.config.processing_delay;
        let more = !inner.lock().jobs.is_empty();
        if more && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::testing::FakeProvider;
    use crate::embeddings::{BoxedProvider, EmbeddingClient};
    use crate::storage::StorageHandle;
    use crate::storage::testing::seed_text;

    const DIMS: usize = 32;

    fn queue_with(max_retries: u32) -> (BackgroundQueue, StorageHandle, FakeProvider) {
        let fake = FakeProvider::new(DIMS);
        let client = EmbeddingClient::new(BoxedProvider::new(fake.clone()), DIMS);
        let storage = StorageHandle::open_memory().unwrap();
        let pipeline = EmbeddingPipeline::new(storage.clone(), client);
        let queue = BackgroundQueue::new(
            pipeline,
            QueueConfig {
                max_retries,
                processing_delay: Duration::ZERO,
            },
        );
        (queue, storage, fake)
    }

    fn embedded_in_order(storage: &StorageHandle) -> Vec<String> {
        storage
            .with(|s| {
                let mut stmt = s
                    .conn()
                    .prepare("SELECT message_id FROM message_embeddings ORDER BY rowid")?;
                let ids = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(ids)
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_high_priority_is_next() {
        let (queue, _storage, _fake) = queue_with(3);
        queue.enqueue("normal_job", JobPriority::Normal);
        queue.enqueue("high_job", JobPriority::High);

        let status = queue.status();
        assert_eq!(status.next_job_id.as_deref(), Some("high_job"));
        assert_eq!(status.queue_length, 2);
        assert!(status.processing);
        queue.clear();
    }

    #[tokio::test]
    async fn test_processing_order_two_bands() {
        let (queue, storage, _fake) = queue_with(3);
        for (id, text) in [("n1", "one"), ("l1", "two"), ("n2", "three"), ("h1", "four")] {
            seed_text(&storage, "u1", id, text);
        }

        queue.enqueue("n1", JobPriority::Normal);
        queue.enqueue("l1", JobPriority::Low);
        queue.enqueue("n2", JobPriority::Normal);
        queue.enqueue("h1", JobPriority::High);
        queue.wait_idle().await;

        assert_eq!(embedded_in_order(&storage), vec!["h1", "n1", "l1", "n2"]);
        let status = queue.status();
        assert_eq!(status.queue_length, 0);
        assert!(!status.processing);
        assert!(status.next_job_id.is_none());
    }

    #[tokio::test]
    async fn test_failing_job_attempted_max_retries_plus_one() {
        let (queue, storage, fake) = queue_with(3);
        seed_text(&storage, "u1", "m1", "doomed");
        fake.set_failing(true);

        queue.enqueue("m1", JobPriority::Normal);
        queue.wait_idle().await;

        assert_eq!(fake.calls(), 4);
        assert_eq!(queue.status().queue_length, 0);
        assert!(embedded_in_order(&storage).is_empty());
    }

    #[tokio::test]
    async fn test_retry_goes_to_back_and_isolates_failures() {
        let (queue, storage, fake) = queue_with(2);
        seed_text(&storage, "u1", "bad", "broken");
        seed_text(&storage, "u1", "good", "fine");
        fake.fail_on("broken");

        queue.enqueue("bad", JobPriority::High);
        queue.enqueue("good", JobPriority::Normal);
        queue.wait_idle().await;

        assert_eq!(fake.history(), vec!["broken", "fine", "broken", "broken"]);
        assert_eq!(embedded_in_order(&storage), vec!["good"]);
    }

    #[tokio::test]
    async fn test_missing_message_is_dropped_without_stalling() {
        let (queue, storage, fake) = queue_with(1);
        seed_text(&storage, "u1", "m1", "present");

        queue.enqueue("ghost", JobPriority::Normal);
        queue.enqueue("m1", JobPriority::Normal);
        queue.wait_idle().await;

        assert_eq!(embedded_in_order(&storage), vec!["m1"]);
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_clear_drops_pending_jobs() {
        let (queue, storage, fake) = queue_with(3);
        seed_text(&storage, "u1", "m1", "one");
        seed_text(&storage, "u1", "m2", "two");

        queue.enqueue("m1", JobPriority::Normal);
        queue.enqueue("m2", JobPriority::Normal);
        queue.clear();
        assert_eq!(queue.status().queue_length, 0);

        // The loop finds nothing left and exits without a remote call.
        queue.wait_idle().await;
        assert!(!queue.status().processing);
        assert_eq!(fake.calls(), 0);

        // The queue is usable again.
        queue.enqueue("m2", JobPriority::Normal);
        queue.wait_idle().await;
        assert_eq!(embedded_in_order(&storage), vec!["m2"]);
    }

    #[tokio::test]
    async fn test_enqueue_after_clear_reuses_running_consumer() {
        let (queue, storage, fake) = queue_with(3);
        seed_text(&storage, "u1", "m0", "slow one");
        seed_text(&storage, "u1", "m1", "next one");
        fake.set_delay(Duration::from_millis(50));

        queue.enqueue("m0", JobPriority::Normal);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fake.calls(), 1);

        // m0 is still in flight.
        queue.clear();
        assert!(queue.status().processing);

        queue.enqueue("m1", JobPriority::Normal);
        queue.wait_idle().await;

        assert_eq!(fake.max_in_flight(), 1);
        assert_eq!(fake.calls(), 2);
        assert_eq!(embedded_in_order(&storage), vec!["m0", "m1"]);
        assert!(!queue.status().processing);
    }

    #[tokio::test]
    async fn test_failure_from_before_clear_is_not_retried() {
        let (queue, storage, fake) = queue_with(3);
        seed_text(&storage, "u1", "m0", "doomed");
        fake.set_delay(Duration::from_millis(30));
        fake.fail_on("doomed");

        queue.enqueue("m0", JobPriority::Normal);
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.clear();
        queue.wait_idle().await;

        assert_eq!(fake.calls(), 1);
        assert_eq!(queue.status().queue_length, 0);
    }

    #[tokio::test]
    async fn test_wait_idle_on_idle_queue() {
        let (queue, _storage, _fake) = queue_with(3);
        queue.wait_idle().await;
        assert!(!queue.status().processing);
    }
}
