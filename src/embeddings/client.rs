//! Embedding client.
//!
//! Thin wrapper over a provider that enforces the input and output
//! contract shared by the pipeline and the search engine:
//! - blank text is rejected with [`Error::EmptyContent`]
//! - batches drop blank entries before the remote call
//! - every returned vector has the configured dimension
//!
//! No retries happen here.

use std::sync::Arc;

use tracing::debug;

use super::provider::BoxedProvider;
use super::types::{DEFAULT_DIMENSIONS, ProviderInfo};
use crate::error::{Error, Result};

/// Cheaply cloneable handle to the configured embedding provider.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    provider: Option<Arc<BoxedProvider>>,
    dimensions: usize,
}

impl EmbeddingClient {
    /// Wrap a provider, expecting vectors of `dimensions` length.
    #[must_use]
    pub fn new(provider: BoxedProvider, dimensions: usize) -> Self {
        Self {
            provider: Some(Arc::new(provider)),
            dimensions,
        }
    }

    /// A client with no provider; every call fails with
    /// [`Error::ProviderNotConfigured`].
    #[must_use]
    pub const fn unconfigured(dimensions: usize) -> Self {
        Self {
            provider: None,
            dimensions,
        }
    }

    /// Expected vector dimension.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Provider metadata, if a provider is configured.
    #[must_use]
    pub fn info(&self) -> Option<ProviderInfo> {
        self.provider.as_ref().map(|p| p.info())
    }

    /// Whether a provider is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    fn provider(&self) -> Result<&BoxedProvider> {
        self.provider.as_deref().ok_or(Error::ProviderNotConfigured)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() == self.dimensions {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            })
        }
    }

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyContent`] if `text` is blank, or whatever the
    /// provider returned.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::EmptyContent);
        }

        let vector = self.provider()?.generate_embedding(text).await?;
        self.check_dimensions(&vector)?;
        Ok(vector)
    }

    /// Embed several texts in one remote call.
    ///
    /// Blank entries are removed first. The result lines up with the
    /// filtered input, not the original one; callers that need positional
    /// correspondence must filter the same way.
    pub async fn embed_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<f32>>> {
        let filtered: Vec<&str> = texts
            .iter()
            .map(AsRef::as_ref)
            .filter(|t| !t.trim().is_empty())
            .collect();

        if filtered.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = filtered.len(), "Embedding batch");
        let vectors = self.provider()?.generate_embeddings(&filtered).await?;
        for vector in &vectors {
            self.check_dimensions(vector)?;
        }
        Ok(vectors)
    }
}

impl Default for EmbeddingClient {
    fn default() -> Self {
        Self::unconfigured(DEFAULT_DIMENSIONS)
    }
}
