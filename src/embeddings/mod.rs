//! Embedding generation for semantic search.
//!
//! ```text
//! ┌──────────────────────────┐
//! │ Pipeline / Search engine │
//! └────────────┬─────────────┘
//!              │
//!              ▼
//! ┌──────────────────────────┐
//! │     EmbeddingClient      │  ← blank filtering, dimension check
//! └────────────┬─────────────┘
//!              │
//!              ▼
//! ┌──────────────────────────┐
//! │  BoxedProvider (OpenAI)  │  ← HTTP, 429 → RateLimited
//! └──────────────────────────┘
//! ```
//!
//! # Configuration
//!
//! Settings are loaded from `~/.recall/config.json`. Environment variables
//! take precedence:
//! - `OPENAI_API_KEY` - API key (required for remote embeddings)
//! - `OPENAI_BASE_URL` - API base URL (default: `https://api.openai.com/v1`)
//! - `RECALL_EMBEDDING_MODEL` - model (default: `text-embedding-3-small`)
//! - `RECALL_EMBEDDINGS_MODE` - `realtime`, `queue`, `cron` or `manual`
//! - `RECALL_AUTO_GENERATE` - enqueue on message save (default: `true`)
//! - `RECALL_BATCH_SIZE`, `RECALL_PROCESSING_DELAY_MS`, `RECALL_MAX_RETRIES`

pub mod client;
pub mod config;
pub mod factory;
pub mod openai;
pub mod provider;
#[cfg(test)]
pub mod testing;
pub mod types;

pub use client::EmbeddingClient;
pub use config::{
    get_embedding_settings, load_config, reset_embedding_settings, resolve_settings,
    resolve_with, save_config, save_embedding_settings,
};
pub use factory::{create_embedding_client, create_embedding_provider, create_openai_provider};
pub use openai::OpenAiProvider;
pub use provider::{BoxedProvider, EmbeddingProvider};
pub use types::{
    EmbeddingMode, EmbeddingSettings, ProviderInfo, RecallConfig, ResolvedSettings,
    DEFAULT_DIMENSIONS, DEFAULT_MODEL,
};
