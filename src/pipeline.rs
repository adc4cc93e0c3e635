//! Embedding pipeline.
//!
//! Extract → fingerprint → skip if unchanged → embed → upsert, for one
//! message or a batch of messages that still lack an embedding.
//!
//! Errors from the client or the store propagate; retry policy belongs to
//! the caller (see [`crate::queue`]).

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::content::{content_hash, extract, has_changed};
use crate::embeddings::EmbeddingClient;
use crate::embeddings::types::DEFAULT_PROCESSING_DELAY_MS;
use crate::error::{Error, Result};
use crate::model::Message;
use crate::storage::StorageHandle;

/// What `process` did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// A vector was generated and stored.
    Embedded,
    /// The stored fingerprint matched; no remote call was made.
    Unchanged,
    /// The message has no searchable text; nothing was stored.
    Blank,
}

/// Embedding coverage across all stored messages.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub total_messages: usize,
    pub messages_with_embeddings: usize,
    /// Percentage, rounded to two decimals; 0 when there are no messages.
    pub coverage: f64,
}

/// Coverage percentage rounded to two decimals.
#[allow(clippy::cast_precision_loss)]
fn coverage(total: usize, with: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = 100.0 * with as f64 / total as f64;
    (pct * 100.0).round() / 100.0
}

/// Orchestrates the content extractor, fingerprinting, the embedding
/// client and the store.
#[derive(Debug, Clone)]
pub struct EmbeddingPipeline {
    storage: StorageHandle,
    client: EmbeddingClient,
    processing_delay: Duration,
    batch_embed: bool,
}

impl EmbeddingPipeline {
    #[must_use]
    pub fn new(storage: StorageHandle, client: EmbeddingClient) -> Self {
        Self {
            storage,
            client,
            processing_delay: Duration::from_millis(DEFAULT_PROCESSING_DELAY_MS),
            batch_embed: false,
        }
    }

    /// Pause between items in [`process_missing_batch`](Self::process_missing_batch).
    #[must_use]
    pub const fn with_processing_delay(mut self, delay: Duration) -> Self {
        self.processing_delay = delay;
        self
    }

    /// Embed a missing-batch with one remote call instead of one per message.
    #[must_use]
    pub const fn with_batch_embed(mut self, enabled: bool) -> Self {
        self.batch_embed = enabled;
        self
    }

    #[must_use]
    pub const fn storage(&self) -> &StorageHandle {
        &self.storage
    }

    #[must_use]
    pub const fn client(&self) -> &EmbeddingClient {
        &self.client
    }

    /// Embed one message if its searchable text changed.
    ///
    /// # Errors
    ///
    /// Returns client or store errors unchanged.
    pub async fn process(&self, message: &Message) -> Result<ProcessOutcome> {
        let text = extract(&message.parts);
        if text.is_empty() {
            debug!(message_id = %message.id, "No searchable text, skipping");
            return Ok(ProcessOutcome::Blank);
        }

        let hash = content_hash(&text);
        let stored = self.storage.with(|s| s.get_content_hash(&message.id))?;
        if !has_changed(&hash, stored.as_deref()) {
            debug!(message_id = %message.id, "Content unchanged, skipping");
            return Ok(ProcessOutcome::Unchanged);
        }

        let vector = self.client.embed(&text).await?;
        self.storage
            .with(|s| s.upsert_embedding(&message.id, &vector, &hash))?;

        debug!(message_id = %message.id, replaced = stored.is_some(), "Stored embedding");
        Ok(ProcessOutcome::Embedded)
    }

    /// Load a message from the store and [`process`](Self::process) it.
    ///
    /// # Errors
    ///
    /// Returns `MessageNotFound` if the message does not exist.
    pub async fn process_by_id(&self, message_id: &str) -> Result<ProcessOutcome> {
        let message = self
            .storage
            .with(|s| s.get_message(message_id))?
            .ok_or_else(|| Error::MessageNotFound {
                id: message_id.to_string(),
            })?;
        self.process(&message).await
    }

    /// Create an embedding if the message has none; otherwise do nothing.
    ///
    /// Unlike [`process_by_id`](Self::process_by_id) this never re-checks
    /// the fingerprint of an existing row.
    ///
    /// # Errors
    ///
    /// Returns `MessageNotFound` if the message does not exist.
    pub async fn ensure_embedding(&self, message_id: &str) -> Result<ProcessOutcome> {
        if self
            .storage
            .with(|s| s.get_content_hash(message_id))?
            .is_some()
        {
            return Ok(ProcessOutcome::Unchanged);
        }
        self.process_by_id(message_id).await
    }

    /// Process up to `batch_size` messages lacking an embedding, newest first.
    ///
    /// Messages without text never get a row, so they are paged past rather
    /// than counted against the batch. Per-message failures are logged and
    /// skipped. Returns how many messages were embedded without error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the candidate query itself fails.
    pub async fn process_missing_batch(&self, batch_size: usize) -> Result<usize> {
        let (messages, blank) = self.missing_candidates(batch_size)?;

        if messages.is_empty() {
            if blank > 0 {
                debug!(blank, "Only messages without text are missing embeddings");
            }
            return Ok(0);
        }

        if self.batch_embed {
            match self.embed_all(&messages).await {
                Ok(count) => return Ok(count),
                Err(e) => warn!(error = %e, "Batch embedding failed, falling back to per-message"),
            }
        }

        let mut processed = 0;
        for (i, message) in messages.iter().enumerate() {
            if i > 0 && !self.processing_delay.is_zero() {
                tokio::time::sleep(self.processing_delay).await;
            }

            match self.process(message).await {
                Ok(_) => processed += 1,
                Err(e) => warn!(message_id = %message.id, error = %e, "Failed to embed message"),
            }
        }

        info!(processed, candidates = messages.len(), blank, "Processed missing embeddings");
        Ok(processed)
    }

    /// Up to `batch_size` messages with text and no embedding, newest first,
    /// plus how many blank messages were skipped on the way.
    fn missing_candidates(&self, batch_size: usize) -> Result<(Vec<Message>, usize)> {
        let mut candidates = Vec::with_capacity(batch_size);
        let mut blank = 0;
        let mut offset = 0;

        while candidates.len() < batch_size {
            let page = self
                .storage
                .with(|s| s.get_messages_missing_embeddings(batch_size, offset))?;
            let fetched = page.len();
            offset += fetched;

            for message in page {
                if candidates.len() == batch_size {
                    break;
                }
                if extract(&message.parts).is_empty() {
                    blank += 1;
                } else {
                    candidates.push(message);
                }
            }

            if fetched < batch_size {
                break;
            }
        }

        Ok((candidates, blank))
    }

    /// One remote call for every message in `messages`, which all have text.
    async fn embed_all(&self, messages: &[Message]) -> Result<usize> {
        let pending: Vec<(&str, String)> = messages
            .iter()
            .map(|message| (message.id.as_str(), extract(&message.parts)))
            .collect();

        let texts: Vec<&str> = pending.iter().map(|(_, text)| text.as_str()).collect();
        // Texts are non-blank, so vectors line up with `pending`.
        let vectors = self.client.embed_batch(&texts).await?;

        let mut stored = 0;
        for ((message_id, text), vector) in pending.iter().zip(&vectors) {
            let hash = content_hash(text);
            match self
                .storage
                .with(|s| s.upsert_embedding(message_id, vector, &hash))
            {
                Ok(()) => stored += 1,
                Err(e) => warn!(%message_id, error = %e, "Failed to store embedding"),
            }
        }

        info!(stored, "Processed missing embeddings in one batch");
        Ok(stored)
    }

    /// Count messages and embeddings and compute coverage.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn get_stats(&self) -> Result<PipelineStats> {
        let stats = self.storage.with(|s| s.count_embedding_status())?;
        Ok(PipelineStats {
            total_messages: stats.total_messages,
            messages_with_embeddings: stats.with_embeddings,
            coverage: coverage(stats.total_messages, stats.with_embeddings),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::BoxedProvider;
    use crate::embeddings::testing::FakeProvider;
    use crate::model::Segment;
    use crate::storage::testing::{seed_message, seed_text};

    const DIMS: usize = 64;

    fn pipeline() -> (EmbeddingPipeline, FakeProvider) {
        let fake = FakeProvider::new(DIMS);
        let client = EmbeddingClient::new(BoxedProvider::new(fake.clone()), DIMS);
        let storage = StorageHandle::open_memory().unwrap();
        let pipeline =
            EmbeddingPipeline::new(storage, client).with_processing_delay(Duration::ZERO);
        (pipeline, fake)
    }

    fn row_count(pipeline: &EmbeddingPipeline) -> usize {
        pipeline.get_stats().unwrap().messages_with_embeddings
    }

    #[tokio::test]
    async fn test_process_embeds_with_fingerprint() {
        let (pipeline, fake) = pipeline();
        let message = seed_text(pipeline.storage(), "u1", "m1", "  Hello world ");

        let outcome = pipeline.process(&message).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Embedded);
        assert_eq!(fake.calls(), 1);

        let row = pipeline
            .storage()
            .with(|s| s.get_embedding("m1"))
            .unwrap()
            .unwrap();
        assert_eq!(row.content_hash, content_hash("Hello world"));
        assert_eq!(row.vector, fake.vector_for("Hello world"));
    }

    #[tokio::test]
    async fn test_unchanged_content_makes_no_remote_call() {
        let (pipeline, fake) = pipeline();
        let message = seed_text(pipeline.storage(), "u1", "m1", "Hello world");

        pipeline.process(&message).await.unwrap();
        let outcome = pipeline.process(&message).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Unchanged);
        assert_eq!(fake.calls(), 1);
        assert_eq!(row_count(&pipeline), 1);
    }

    #[tokio::test]
    async fn test_edited_content_is_reembedded_in_place() {
        let (pipeline, fake) = pipeline();
        seed_text(pipeline.storage(), "u1", "m1", "first draft");
        pipeline.process_by_id("m1").await.unwrap();

        pipeline
            .storage()
            .with(|s| s.update_message_parts("m1", &[Segment::text("second draft")]))
            .unwrap();
        let outcome = pipeline.process_by_id("m1").await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Embedded);
        assert_eq!(fake.calls(), 2);
        assert_eq!(row_count(&pipeline), 1);
        let row = pipeline
            .storage()
            .with(|s| s.get_embedding("m1"))
            .unwrap()
            .unwrap();
        assert_eq!(row.content_hash, content_hash("second draft"));
    }

    #[tokio::test]
    async fn test_blank_content_never_persists() {
        let (pipeline, fake) = pipeline();
        let message = seed_message(
            pipeline.storage(),
            "u1",
            "c1",
            "m1",
            vec![
                Segment::Image {
                    url: Some("https://example.com/a.png".into()),
                    mime_type: None,
                },
                Segment::text("   "),
            ],
        );

        let outcome = pipeline.process(&message).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Blank);
        assert_eq!(fake.calls(), 0);
        assert_eq!(row_count(&pipeline), 0);
    }

    #[tokio::test]
    async fn test_client_errors_propagate() {
        let (pipeline, fake) = pipeline();
        fake.set_failing(true);
        let message = seed_text(pipeline.storage(), "u1", "m1", "Hello");

        assert!(matches!(
            pipeline.process(&message).await,
            Err(Error::Embedding(_))
        ));
        assert_eq!(row_count(&pipeline), 0);
    }

    #[tokio::test]
    async fn test_ensure_embedding() {
        let (pipeline, fake) = pipeline();
        assert!(matches!(
            pipeline.ensure_embedding("ghost").await,
            Err(Error::MessageNotFound { .. })
        ));

        seed_text(pipeline.storage(), "u1", "m1", "Hello");
        assert_eq!(
            pipeline.ensure_embedding("m1").await.unwrap(),
            ProcessOutcome::Embedded
        );

        // Existing rows are left alone even after an edit.
        pipeline
            .storage()
            .with(|s| s.update_message_parts("m1", &[Segment::text("Edited")]))
            .unwrap();
        assert_eq!(
            pipeline.ensure_embedding("m1").await.unwrap(),
            ProcessOutcome::Unchanged
        );
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_batch_continues_past_failures() {
        let (pipeline, fake) = pipeline();
        seed_text(pipeline.storage(), "u1", "m1", "alpha");
        seed_text(pipeline.storage(), "u1", "m2", "broken");
        seed_text(pipeline.storage(), "u1", "m3", "gamma");
        fake.fail_on("broken");

        let processed = pipeline.process_missing_batch(10).await.unwrap();
        assert_eq!(processed, 2);
        assert_eq!(fake.calls(), 3);

        let missing = pipeline
            .storage()
            .with(|s| s.get_messages_missing_embeddings(10, 0))
            .unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, "m2");
    }

    #[tokio::test]
    async fn test_missing_batch_respects_batch_size() {
        let (pipeline, _fake) = pipeline();
        for i in 0..5 {
            seed_text(pipeline.storage(), "u1", &format!("m{i}"), &format!("text {i}"));
        }

        assert_eq!(pipeline.process_missing_batch(2).await.unwrap(), 2);
        assert_eq!(row_count(&pipeline), 2);
        assert_eq!(pipeline.process_missing_batch(10).await.unwrap(), 3);
        assert_eq!(pipeline.process_missing_batch(10).await.unwrap(), 0);
    }

    fn seed_image(pipeline: &EmbeddingPipeline, id: &str) {
        seed_message(
            pipeline.storage(),
            "u1",
            "c1",
            id,
            vec![Segment::Image {
                url: Some(format!("https://example.com/{id}.png")),
                mime_type: None,
            }],
        );
    }

    #[tokio::test]
    async fn test_missing_batch_pages_past_blank_messages() {
        let (pipeline, fake) = pipeline();
        seed_text(pipeline.storage(), "u1", "old", "older text message");
        for i in 0..12 {
            seed_image(&pipeline, &format!("img{i}"));
        }

        assert_eq!(pipeline.process_missing_batch(10).await.unwrap(), 1);
        assert_eq!(fake.calls(), 1);
        assert!(
            pipeline
                .storage()
                .with(|s| s.get_embedding("old"))
                .unwrap()
                .is_some()
        );

        // Nothing with text is left; later sweeps make no remote calls.
        assert_eq!(pipeline.process_missing_batch(10).await.unwrap(), 0);
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_batch_size_counts_only_messages_with_text() {
        let (pipeline, fake) = pipeline();
        for i in 0..3 {
            seed_text(pipeline.storage(), "u1", &format!("t{i}"), &format!("text {i}"));
        }
        for i in 0..4 {
            seed_image(&pipeline, &format!("img{i}"));
        }

        assert_eq!(pipeline.process_missing_batch(2).await.unwrap(), 2);
        assert_eq!(fake.calls(), 2);
        assert_eq!(pipeline.process_missing_batch(2).await.unwrap(), 1);
        assert_eq!(row_count(&pipeline), 3);
    }

    #[tokio::test]
    async fn test_batch_embed_uses_one_call() {
        let (pipeline, fake) = pipeline();
        let pipeline = pipeline.with_batch_embed(true);
        seed_text(pipeline.storage(), "u1", "m1", "alpha");
        seed_text(pipeline.storage(), "u1", "m2", "beta");

        assert_eq!(pipeline.process_missing_batch(10).await.unwrap(), 2);
        assert_eq!(fake.batch_calls(), 1);
        assert_eq!(fake.calls(), 0);

        let row = pipeline
            .storage()
            .with(|s| s.get_embedding("m2"))
            .unwrap()
            .unwrap();
        assert_eq!(row.vector, fake.vector_for("beta"));
    }

    #[tokio::test]
    async fn test_batch_embed_falls_back_per_message() {
        let (pipeline, fake) = pipeline();
        let pipeline = pipeline.with_batch_embed(true);
        seed_text(pipeline.storage(), "u1", "m1", "alpha");
        seed_text(pipeline.storage(), "u1", "m2", "broken");
        fake.fail_on("broken");

        assert_eq!(pipeline.process_missing_batch(10).await.unwrap(), 1);
        assert_eq!(fake.batch_calls(), 1);
        assert_eq!(fake.calls(), 2);
    }

    #[test]
    fn test_stats_coverage() {
        let (pipeline, _fake) = pipeline();
        let stats = pipeline.get_stats().unwrap();
        assert_eq!(stats.total_messages, 0);
        assert!(stats.coverage.abs() < f64::EPSILON);

        seed_text(pipeline.storage(), "u1", "m1", "a");
        seed_text(pipeline.storage(), "u1", "m2", "b");
        pipeline
            .storage()
            .with(|s| s.upsert_embedding("m1", &[1.0], "h"))
            .unwrap();

        let stats = pipeline.get_stats().unwrap();
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.messages_with_embeddings, 1);
        assert!((stats.coverage - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_coverage_rounding() {
        assert!((coverage(3, 1) - 33.33).abs() < 1e-9);
        assert!((coverage(3, 2) - 66.67).abs() < 1e-9);
        assert!(coverage(0, 0).abs() < f64::EPSILON);
    }
}
