//! Composition root.
//!
//! `RecallService` owns the one store handle, pipeline, queue and search
//! engine a process needs, and implements the message-save integration
//! point for each embedding mode.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::embeddings::{EmbeddingClient, EmbeddingMode, ResolvedSettings, create_embedding_client};
use crate::error::Result;
use crate::model::JobPriority;
use crate::pipeline::{EmbeddingPipeline, ProcessOutcome};
use crate::queue::{BackgroundQueue, QueueConfig};
use crate::search::{SearchEngine, SearchRequest, SearchResponse};
use crate::storage::StorageHandle;

/// What happened to a newly saved message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "outcome")]
pub enum IngestAction {
    /// `autoGenerate` is off.
    Disabled,
    /// Processed inline (`realtime` mode).
    Embedded(ProcessOutcome),
    /// Inline processing failed; the error was logged.
    Failed,
    /// Handed to the background queue (`queue` mode).
    Enqueued,
    /// Left for the sweep or an explicit call (`cron` / `manual` mode).
    Deferred,
}

/// Process-wide embedding and search service.
#[derive(Debug)]
pub struct RecallService {
    settings: ResolvedSettings,
    storage: StorageHandle,
    pipeline: EmbeddingPipeline,
    queue: BackgroundQueue,
    search: SearchEngine,
    sweep: Mutex<Option<JoinHandle<()>>>,
}

impl RecallService {
    /// Wire the service with an explicit client.
    #[must_use]
    pub fn new(storage: StorageHandle, client: EmbeddingClient, settings: ResolvedSettings) -> Self {
        let pipeline = EmbeddingPipeline::new(storage.clone(), client.clone())
            .with_processing_delay(Duration::from_millis(settings.processing_delay_ms));
        let queue = BackgroundQueue::new(
            pipeline.clone(),
            QueueConfig {
                max_retries: settings.max_retries,
                processing_delay: Duration::from_millis(settings.processing_delay_ms),
            },
        );
        let search = SearchEngine::new(storage.clone(), client);

        Self {
            settings,
            storage,
            pipeline,
            queue,
            search,
            sweep: Mutex::new(None),
        }
    }

    /// Wire the service with the provider described by `settings`.
    #[must_use]
    pub fn from_settings(storage: StorageHandle, settings: ResolvedSettings) -> Self {
        let client = create_embedding_client(&settings);
        Self::new(storage, client, settings)
    }

    #[must_use]
    pub const fn settings(&self) -> &ResolvedSettings {
        &self.settings
    }

    #[must_use]
    pub const fn storage(&self) -> &StorageHandle {
        &self.storage
    }

    #[must_use]
    pub const fn pipeline(&self) -> &EmbeddingPipeline {
        &self.pipeline
    }

    #[must_use]
    pub const fn queue(&self) -> &BackgroundQueue {
        &self.queue
    }

    /// Best-effort search; see [`SearchEngine::search`].
    pub async fn search(&self, request: &SearchRequest) -> SearchResponse {
        self.search.search(request).await
    }

    /// Integration point called by the message store after a save.
    ///
    /// Never fails: inline errors are logged and reported as `Failed`.
    pub async fn on_message_saved(&self, message_id: &str) -> IngestAction {
        if !self.settings.auto_generate {
            return IngestAction::Disabled;
        }

        match self.settings.mode {
            EmbeddingMode::Realtime => match self.pipeline.process_by_id(message_id).await {
                Ok(outcome) => IngestAction::Embedded(outcome),
                Err(e) => {
                    warn!(%message_id, error = %e, "Inline embedding failed");
                    IngestAction::Failed
                }
            },
            EmbeddingMode::Queue => {
                self.queue.enqueue(message_id, JobPriority::Normal);
                IngestAction::Enqueued
            }
            EmbeddingMode::Cron | EmbeddingMode::Manual => IngestAction::Deferred,
        }
    }

    /// Run one sweep with the configured batch size.
    ///
    /// # Errors
    ///
    /// Returns an error if the candidate query fails.
    pub async fn sweep_once(&self) -> Result<usize> {
        self.pipeline
            .process_missing_batch(self.settings.batch_size)
            .await
    }

    /// Start the periodic sweep task. Returns `false` if one is already
    /// running. The first sweep starts immediately.
    pub fn spawn_sweep(&self) -> bool {
        let mut slot = self.sweep.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return false;
        }

        let pipeline = self.pipeline.clone();
        let batch_size = self.settings.batch_size;
        let interval = Duration::from_secs(self.settings.sweep_interval_secs);

        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match pipeline.process_missing_batch(batch_size).await {
                    Ok(0) => debug!("Sweep found nothing to embed"),
                    Ok(processed) => info!(processed, "Sweep embedded messages"),
                    Err(e) => warn!(error = %e, "Sweep failed"),
                }
            }
        }));

        info!(interval_secs = interval.as_secs(), batch_size, "Started embedding sweep");
        true
    }

    /// Wait for the background queue to drain.
    pub async fn drain(&self) {
        self.queue.wait_idle().await;
    }

    /// Stop the sweep and drop pending queue jobs.
    pub fn shutdown(&self) {
        if let Some(task) = self
            .sweep
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        self.queue.clear();
    }
}

impl Drop for RecallService {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.sweep.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::BoxedProvider;
    use crate::embeddings::testing::FakeProvider;
    use crate::storage::testing::seed_text;

    const DIMS: usize = 64;

    fn service(mode: EmbeddingMode, auto_generate: bool) -> (RecallService, FakeProvider) {
        let fake = FakeProvider::new(DIMS);
        let client = EmbeddingClient::new(BoxedProvider::new(fake.clone()), DIMS);
        let settings = ResolvedSettings {
            mode,
            auto_generate,
            processing_delay_ms: 0,
            dimensions: DIMS,
            ..Default::default()
        };
        let storage = StorageHandle::open_memory().unwrap();
        (RecallService::new(storage, client, settings), fake)
    }

    fn has_embedding(service: &RecallService, id: &str) -> bool {
        service
            .storage()
            .with(|s| s.get_content_hash(id))
            .unwrap()
            .is_some()
    }

    #[tokio::test]
    async fn test_auto_generate_off() {
        let (service, fake) = service(EmbeddingMode::Realtime, false);
        seed_text(service.storage(), "u1", "m1", "Hello");

        assert_eq!(service.on_message_saved("m1").await, IngestAction::Disabled);
        assert_eq!(fake.calls(), 0);
        assert!(!has_embedding(&service, "m1"));
    }

    #[tokio::test]
    async fn test_realtime_embeds_inline() {
        let (service, _fake) = service(EmbeddingMode::Realtime, true);
        seed_text(service.storage(), "u1", "m1", "Hello");

        assert_eq!(
            service.on_message_saved("m1").await,
            IngestAction::Embedded(ProcessOutcome::Embedded)
        );
        assert!(has_embedding(&service, "m1"));
    }

    #[tokio::test]
    async fn test_realtime_failure_is_contained() {
        let (service, fake) = service(EmbeddingMode::Realtime, true);
        fake.set_failing(true);
        seed_text(service.storage(), "u1", "m1", "Hello");

        assert_eq!(service.on_message_saved("m1").await, IngestAction::Failed);
        assert!(!has_embedding(&service, "m1"));
    }

    #[tokio::test]
    async fn test_queue_mode_enqueues() {
        let (service, _fake) = service(EmbeddingMode::Queue, true);
        seed_text(service.storage(), "u1", "m1", "Hello");

        assert_eq!(service.on_message_saved("m1").await, IngestAction::Enqueued);
        service.drain().await;
        assert!(has_embedding(&service, "m1"));
    }

    #[tokio::test]
    async fn test_cron_mode_defers_to_sweep() {
        let (service, fake) = service(EmbeddingMode::Cron, true);
        seed_text(service.storage(), "u1", "m1", "Hello");

        assert_eq!(service.on_message_saved("m1").await, IngestAction::Deferred);
        assert_eq!(fake.calls(), 0);

        assert_eq!(service.sweep_once().await.unwrap(), 1);
        assert!(has_embedding(&service, "m1"));
    }

    #[tokio::test]
    async fn test_spawned_sweep_runs_and_stops() {
        let (service, _fake) = service(EmbeddingMode::Cron, true);
        seed_text(service.storage(), "u1", "m1", "Hello");

        assert!(service.spawn_sweep());
        assert!(!service.spawn_sweep());

        for _ in 0..200 {
            if has_embedding(&service, "m1") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(has_embedding(&service, "m1"));

        service.shutdown();
        assert!(service.spawn_sweep());
        service.shutdown();
    }

    #[tokio::test]
    async fn test_service_search() {
        let (service, _fake) = service(EmbeddingMode::Realtime, true);
        seed_text(service.storage(), "u1", "m1", "Hello world");
        service.on_message_saved("m1").await;

        let response = service
            .search(&SearchRequest::new("u1", "Hello world").with_threshold(0.1))
            .await;
        assert_eq!(response.total, 1);
    }
}
