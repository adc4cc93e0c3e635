//! Embedding provider factory.
//!
//! Builds the provider and client from resolved settings.

use tracing::debug;

use super::client::EmbeddingClient;
use super::openai::OpenAiProvider;
use super::provider::BoxedProvider;
use super::types::ResolvedSettings;

/// Create an embedding provider based on configuration.
///
/// Returns `None` if no API key is configured.
#[must_use]
pub fn create_embedding_provider(settings: &ResolvedSettings) -> Option<BoxedProvider> {
    create_openai_provider(
        Some(settings.base_url.clone()),
        Some(settings.model.clone()),
        settings.api_key.clone(),
        Some(settings.dimensions),
    )
}

/// Create an OpenAI-compatible provider with explicit configuration.
#[must_use]
pub fn create_openai_provider(
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    dimensions: Option<usize>,
) -> Option<BoxedProvider> {
    OpenAiProvider::with_config(base_url, model, api_key, dimensions).map(BoxedProvider::new)
}

/// Create the embedding client used by the pipeline and search engine.
///
/// Without a configured provider the client still exists, but every call
/// fails with `ProviderNotConfigured`.
#[must_use]
pub fn create_embedding_client(settings: &ResolvedSettings) -> EmbeddingClient {
    match create_embedding_provider(settings) {
        Some(provider) => EmbeddingClient::new(provider, settings.dimensions),
        None => {
            debug!("No embedding API key configured");
            EmbeddingClient::unconfigured(settings.dimensions)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_key_gives_unconfigured_client() {
        let settings = ResolvedSettings::default();
        let client = create_embedding_client(&settings);
        assert!(!client.is_configured());
        assert_eq!(client.dimensions(), 1536);
    }

    #[test]
    fn test_key_gives_openai_client() {
        let settings = ResolvedSettings {
            api_key: Some("sk-test".into()),
            model: "text-embedding-3-large".into(),
            dimensions: 3072,
            ..Default::default()
        };
        let client = create_embedding_client(&settings);
        let info = client.info().unwrap();
        assert_eq!(info.name, "openai");
        assert_eq!(info.model, "text-embedding-3-large");
        assert_eq!(info.dimensions, 3072);
    }
}
