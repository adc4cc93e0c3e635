//! Embedding provider trait.
//!
//! Defines the interface that remote embedding models implement. Methods
//! are async because every call crosses the network.

use std::future::Future;
use std::pin::Pin;

use super::types::ProviderInfo;
use crate::error::Result;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for embedding providers.
///
/// Providers perform no retry of their own; failures propagate to the
/// pipeline or queue, which own the retry policy.
pub trait EmbeddingProvider: Send + Sync {
    /// Get provider metadata.
    fn info(&self) -> ProviderInfo;

    /// Generate embedding for a single text.
    fn generate_embedding(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send;

    /// Generate embeddings for multiple texts, in input order.
    ///
    /// Default implementation calls `generate_embedding` for each text.
    fn generate_embeddings(
        &self,
        texts: &[&str],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send {
        async move {
            let mut results = Vec::with_capacity(texts.len());
            for text in texts {
                results.push(self.generate_embedding(text).await?);
            }
            Ok(results)
        }
    }
}

/// Boxed provider for dynamic dispatch.
///
/// The trait's `impl Future` methods are not object-safe, so the pipeline
/// and search engine hold this wrapper instead of a `dyn EmbeddingProvider`.
pub struct BoxedProvider {
    inner: Box<dyn EmbeddingProviderBoxed>,
}

/// Object-safe version of `EmbeddingProvider` for boxing.
trait EmbeddingProviderBoxed: Send + Sync {
    fn info(&self) -> ProviderInfo;
    fn generate_embedding_boxed(&self, text: String) -> BoxFuture<'_, Result<Vec<f32>>>;
    fn generate_embeddings_boxed(&self, texts: Vec<String>)
    -> BoxFuture<'_, Result<Vec<Vec<f32>>>>;
}

impl BoxedProvider {
    /// Create a new boxed provider.
    pub fn new<P: EmbeddingProvider + 'static>(provider: P) -> Self {
        Self {
            inner: Box::new(BoxedProviderWrapper(provider)),
        }
    }

    /// Get provider metadata.
    #[must_use]
    pub fn info(&self) -> ProviderInfo {
        self.inner.info()
    }

    /// Generate embedding for a single text.
    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        self.inner.generate_embedding_boxed(text.to_string()).await
    }

    /// Generate embeddings for multiple texts.
    pub async fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let owned = texts.iter().map(|s| (*s).to_string()).collect();
        self.inner.generate_embeddings_boxed(owned).await
    }
}

impl std::fmt::Debug for BoxedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let info = self.info();
        f.debug_struct("BoxedProvider")
            .field("name", &info.name)
            .field("model", &info.model)
            .finish()
    }
}

struct BoxedProviderWrapper<P: EmbeddingProvider + 'static>(P);

impl<P: EmbeddingProvider + 'static> EmbeddingProviderBoxed for BoxedProviderWrapper<P> {
    fn info(&self) -> ProviderInfo {
        self.0.info()
    }

    fn generate_embedding_boxed(&self, text: String) -> BoxFuture<'_, Result<Vec<f32>>> {
        Box::pin(async move { self.0.generate_embedding(&text).await })
    }

    fn generate_embeddings_boxed(
        &self,
        texts: Vec<String>,
    ) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        Box::pin(async move {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            self.0.generate_embeddings(&refs).await
        })
    }
}
