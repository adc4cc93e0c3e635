//! OpenAI-compatible embedding provider.
//!
//! Talks to any server exposing `POST {base_url}/embeddings` with the
//! OpenAI request/response shape. Requires an API key (`OPENAI_API_KEY`).

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::provider::EmbeddingProvider;
use super::types::{DEFAULT_BASE_URL, DEFAULT_DIMENSIONS, DEFAULT_MODEL, ProviderInfo};
use crate::error::{Error, Result};

/// Fallback when a 429 response carries no usable `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Upper bound for one embedding request; the queue has no deadline of its own.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// OpenAI-compatible embedding provider.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    dimensions: usize,
}

impl OpenAiProvider {
    /// Create a provider with explicit configuration.
    ///
    /// Returns `None` if the API key is missing or blank.
    pub fn with_config(
        base_url: Option<String>,
        model: Option<String>,
        api_key: Option<String>,
        dimensions: Option<usize>,
    ) -> Option<Self> {
        let api_key = api_key.filter(|k| !k.trim().is_empty())?;
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Some(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
            dimensions: dimensions.unwrap_or(DEFAULT_DIMENSIONS),
        })
    }

    async fn request(&self, input: EmbedInput<'_>) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            input,
            dimensions: supports_dimensions(&self.model).then_some(self.dimensions),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Embedding request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(Error::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Embedding API error ({status}): {error}"
            )));
        }

        let mut data: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse embedding response: {e}")))?;

        // The API does not promise response order.
        data.data.sort_by_key(|item| item.index);

        if let Some(usage) = &data.usage {
            debug!(model = %self.model, tokens = usage.total_tokens, "Embedding call complete");
        }

        Ok(data.data.into_iter().map(|item| item.embedding).collect())
    }
}

/// Only the `text-embedding-3` family accepts a `dimensions` override.
fn supports_dimensions(model: &str) -> bool {
    model.starts_with("text-embedding-3")
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: EmbedInput<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbedInput<'a> {
    Single(&'a str),
    Batch(&'a [&'a str]),
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
    #[serde(default)]
    usage: Option<EmbedUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbedUsage {
    total_tokens: u64,
}

impl EmbeddingProvider for OpenAiProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "openai".to_string(),
            model: self.model.clone(),
            dimensions: self.dimensions,
            available: !self.api_key.is_empty(),
        }
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        self.request(EmbedInput::Single(text))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("No embeddings in response".into()))
    }

    async fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.request(EmbedInput::Batch(texts)).await?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings in batch response, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}
