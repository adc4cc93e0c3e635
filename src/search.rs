//! Similarity search engine.
//!
//! Embeds a query, ranks the requesting user's embedded messages by cosine
//! similarity and records a search session for audit.
//!
//! Two entry points:
//! - [`SearchEngine::try_search`] returns every failure as an `Err`
//! - [`SearchEngine::search`] turns any failure into an empty response, so
//!   a failed search looks the same as one with no matches
//!
//! Callers validate the query (length, limits) before either.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::content::extract;
use crate::embeddings::EmbeddingClient;
use crate::error::Result;
use crate::storage::StorageHandle;

pub const DEFAULT_LIMIT: usize = 20;
pub const DEFAULT_THRESHOLD: f32 = 0.7;

const fn default_limit() -> usize {
    DEFAULT_LIMIT
}

const fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

/// A search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub user_id: String,
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Minimum similarity, exclusive.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

impl SearchRequest {
    pub fn new(user_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            query: query.into(),
            limit: DEFAULT_LIMIT,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub const fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
}

/// One ranked match.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub message_id: String,
    pub chat_id: String,
    /// Display text extracted from the stored message parts.
    pub content: String,
    pub similarity: f32,
    pub created_at: i64,
}

/// Ranked results, best first.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total: usize,
    /// Audit row written for this search, if it got that far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Query engine over the embedding store.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    storage: StorageHandle,
    client: EmbeddingClient,
}

impl SearchEngine {
    #[must_use]
    pub const fn new(storage: StorageHandle, client: EmbeddingClient) -> Self {
        Self { storage, client }
    }

    /// Run a search, reporting failures.
    ///
    /// The session row is written before the store is queried, so it
    /// exists even when ranking fails; its `result_count` is patched last.
    ///
    /// # Errors
    ///
    /// Returns `EmptyContent` for a blank query, or any client or store error.
    pub async fn try_search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let vector = self.client.embed(request.query.trim()).await?;

        let session_id = self.storage.with(|s| {
            s.create_search_session(&request.user_id, &request.query, &vector)
        })?;

        let hits = self.storage.with(|s| {
            s.similarity_search(&request.user_id, &vector, request.threshold, request.limit)
        })?;

        let results: Vec<SearchResult> = hits
            .into_iter()
            .map(|hit| SearchResult {
                content: extract(&hit.parts),
                message_id: hit.message_id,
                chat_id: hit.chat_id,
                similarity: hit.similarity,
                created_at: hit.created_at,
            })
            .collect();

        self.storage
            .with(|s| s.update_search_session_count(&session_id, results.len()))?;

        debug!(user_id = %request.user_id, total = results.len(), "Search complete");
        Ok(SearchResponse {
            total: results.len(),
            results,
            session_id: Some(session_id),
        })
    }

    /// Run a search; any failure yields `{results: [], total: 0}`.
    pub async fn search(&self, request: &SearchRequest) -> SearchResponse {
        match self.try_search(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(user_id = %request.user_id, error = %e, "Search failed, returning no results");
                SearchResponse::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::content_hash;
    use crate::embeddings::testing::FakeProvider;
    use crate::embeddings::{BoxedProvider, DEFAULT_DIMENSIONS};
    use crate::error::Error;
    use crate::model::Segment;
    use crate::pipeline::EmbeddingPipeline;
    use crate::storage::testing::{seed_message, seed_text};

    struct Fixture {
        storage: StorageHandle,
        pipeline: EmbeddingPipeline,
        engine: SearchEngine,
        fake: FakeProvider,
    }

    fn fixture() -> Fixture {
        let fake = FakeProvider::new(DEFAULT_DIMENSIONS);
        let client = EmbeddingClient::new(BoxedProvider::new(fake.clone()), DEFAULT_DIMENSIONS);
        let storage = StorageHandle::open_memory().unwrap();
        Fixture {
            pipeline: EmbeddingPipeline::new(storage.clone(), client.clone()),
            engine: SearchEngine::new(storage.clone(), client),
            storage,
            fake,
        }
    }

    #[tokio::test]
    async fn test_hello_world_end_to_end() {
        let fx = fixture();
        seed_message(
            &fx.storage,
            "u1",
            "c1",
            "m1",
            vec![Segment::text("Hello world")],
        );

        fx.pipeline.ensure_embedding("m1").await.unwrap();
        let row = fx.storage.with(|s| s.get_embedding("m1")).unwrap().unwrap();
        assert_eq!(row.content_hash, content_hash("Hello world"));
        assert_eq!(row.vector.len(), DEFAULT_DIMENSIONS);

        let response = fx
            .engine
            .search(&SearchRequest::new("u1", "Hello world").with_threshold(0.1))
            .await;
        assert_eq!(response.total, 1);
        assert_eq!(response.results[0].message_id, "m1");
        assert_eq!(response.results[0].content, "Hello world");
        assert_eq!(response.results[0].chat_id, "c1");
    }

    #[tokio::test]
    async fn test_content_comes_from_text_parts_only() {
        let fx = fixture();
        seed_message(
            &fx.storage,
            "u1",
            "c1",
            "m1",
            vec![
                Segment::text("quarterly report"),
                Segment::File {
                    name: Some("q3.pdf".into()),
                    url: None,
                    mime_type: None,
                },
                Segment::text("attached"),
            ],
        );
        fx.pipeline.process_by_id("m1").await.unwrap();

        let response = fx
            .engine
            .try_search(&SearchRequest::new("u1", "quarterly report attached"))
            .await
            .unwrap();
        assert_eq!(response.results[0].content, "quarterly report attached");
    }

    #[tokio::test]
    async fn test_embedding_failure_yields_empty_result() {
        let fx = fixture();
        seed_text(&fx.storage, "u1", "m1", "Hello world");
        fx.pipeline.process_by_id("m1").await.unwrap();
        fx.fake.set_failing(true);

        let request = SearchRequest::new("u1", "Hello world").with_threshold(0.1);
        let response = fx.engine.search(&request).await;
        assert!(response.results.is_empty());
        assert_eq!(response.total, 0);

        assert!(matches!(
            fx.engine.try_search(&request).await,
            Err(Error::Embedding(_))
        ));
        // Nothing was embedded, so no session was recorded.
        assert_eq!(fx.storage.with(|s| s.count_search_sessions("u1")).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blank_query() {
        let fx = fixture();
        let request = SearchRequest::new("u1", "   ");
        assert!(matches!(
            fx.engine.try_search(&request).await,
            Err(Error::EmptyContent)
        ));
        assert_eq!(fx.engine.search(&request).await.total, 0);
    }

    #[tokio::test]
    async fn test_threshold_monotonicity() {
        let fx = fixture();
        seed_text(&fx.storage, "u1", "m1", "rust async runtime");
        seed_text(&fx.storage, "u1", "m2", "rust borrow checker");
        seed_text(&fx.storage, "u1", "m3", "banana bread recipe");
        fx.pipeline.process_missing_batch(10).await.unwrap();

        let strict = fx
            .engine
            .search(&SearchRequest::new("u1", "rust async runtime").with_threshold(0.9))
            .await;
        let loose = fx
            .engine
            .search(&SearchRequest::new("u1", "rust async runtime").with_threshold(0.1))
            .await;

        assert!(strict.total <= loose.total);
        assert_eq!(strict.results[0].message_id, "m1");
        assert_eq!(loose.total, 2);
        assert!(loose.results[0].similarity >= loose.results[1].similarity);
    }

    #[tokio::test]
    async fn test_limit_caps_results() {
        let fx = fixture();
        for i in 0..5 {
            seed_text(&fx.storage, "u1", &format!("m{i}"), "shared words here");
        }
        fx.pipeline.process_missing_batch(10).await.unwrap();

        let response = fx
            .engine
            .search(&SearchRequest::new("u1", "shared words here").with_limit(3))
            .await;
        assert_eq!(response.total, 3);
    }

    #[tokio::test]
    async fn test_user_isolation() {
        let fx = fixture();
        seed_text(&fx.storage, "alice", "a1", "project deadline friday");
        seed_text(&fx.storage, "bob", "b1", "project deadline friday");
        fx.pipeline.process_missing_batch(10).await.unwrap();

        let response = fx
            .engine
            .search(&SearchRequest::new("alice", "project deadline friday").with_threshold(0.1))
            .await;
        assert_eq!(response.total, 1);
        assert!(response.results.iter().all(|r| r.message_id != "b1"));
    }

    #[tokio::test]
    async fn test_session_recorded_with_final_count() {
        let fx = fixture();
        seed_text(&fx.storage, "u1", "m1", "Hello world");
        seed_text(&fx.storage, "u1", "m2", "Hello there world");
        fx.pipeline.process_missing_batch(10).await.unwrap();

        let response = fx
            .engine
            .try_search(&SearchRequest::new("u1", "  Hello world ").with_threshold(0.1))
            .await
            .unwrap();
        let session_id = response.session_id.unwrap();
        let session = fx
            .storage
            .with(|s| s.get_search_session(&session_id))
            .unwrap()
            .unwrap();

        assert_eq!(session.query, "  Hello world ");
        assert_eq!(session.result_count, response.total);
        assert_eq!(session.query_embedding, fx.fake.vector_for("Hello world"));
    }

    #[tokio::test]
    async fn test_session_survives_failed_ranking() {
        let fx = fixture();
        seed_text(&fx.storage, "u1", "m1", "Hello world");
        fx.pipeline.process_missing_batch(10).await.unwrap();
        fx.storage
            .with(|s| {
                s.conn().execute_batch("DROP TABLE message_embeddings")?;
                Ok(())
            })
            .unwrap();

        let request = SearchRequest::new("u1", "Hello world");
        assert!(matches!(
            fx.engine.try_search(&request).await,
            Err(Error::Database(_))
        ));
        assert_eq!(fx.storage.with(|s| s.count_search_sessions("u1")).unwrap(), 1);

        // The lenient entry point hides the failure but still records it.
        let response = fx.engine.search(&request).await;
        assert_eq!(response.total, 0);
        assert!(response.session_id.is_none());
        assert_eq!(fx.storage.with(|s| s.count_search_sessions("u1")).unwrap(), 2);
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: SearchRequest =
            serde_json::from_str(r#"{"userId": "u1", "query": "hi there"}"#).unwrap();
        assert_eq!(request.limit, 20);
        assert!((request.threshold - 0.7).abs() < f32::EPSILON);
    }
}
