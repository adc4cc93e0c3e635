//! Embedding types and configuration.
//!
//! `EmbeddingSettings` mirrors the `embeddings` block of
//! `~/.recall/config.json`; every field is optional so a partial file is
//! valid. `ResolvedSettings` is the fully-defaulted view the pipeline,
//! queue and search engine are built from.

use serde::{Deserialize, Serialize};

/// Default remote embedding model.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Default vector dimension (matches `text-embedding-3-small`).
pub const DEFAULT_DIMENSIONS: usize = 1536;

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_PROCESSING_DELAY_MS: u64 = 100;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// When embedding work happens for newly saved messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    /// Embed inline as part of the save.
    Realtime,
    /// Enqueue on the background queue.
    #[default]
    Queue,
    /// Leave it to the periodic sweep.
    Cron,
    /// Only on explicit request.
    Manual,
}

impl std::fmt::Display for EmbeddingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Realtime => write!(f, "realtime"),
            Self::Queue => write!(f, "queue"),
            Self::Cron => write!(f, "cron"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for EmbeddingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "realtime" | "inline" => Ok(Self::Realtime),
            "queue" | "background" => Ok(Self::Queue),
            "cron" | "sweep" | "scheduled" => Ok(Self::Cron),
            "manual" | "off" => Ok(Self::Manual),
            _ => Err(format!("Unknown embedding mode: {s}")),
        }
    }
}

/// Embedding settings stored in `~/.recall/config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_generate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<EmbeddingMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl EmbeddingSettings {
    /// Overlay `self` on top of `existing`: fields set here win.
    #[must_use]
    pub fn merged_over(&self, existing: Self) -> Self {
        Self {
            auto_generate: self.auto_generate.or(existing.auto_generate),
            mode: self.mode.or(existing.mode),
            batch_size: self.batch_size.or(existing.batch_size),
            processing_delay_ms: self.processing_delay_ms.or(existing.processing_delay_ms),
            max_retries: self.max_retries.or(existing.max_retries),
            sweep_interval_secs: self.sweep_interval_secs.or(existing.sweep_interval_secs),
            model: self.model.clone().or(existing.model),
            dimensions: self.dimensions.or(existing.dimensions),
            api_key: self.api_key.clone().or(existing.api_key),
            base_url: self.base_url.clone().or(existing.base_url),
        }
    }
}

/// Recall local configuration file structure.
///
/// Stored at `~/.recall/config.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecallConfig {
    pub embeddings: Option<EmbeddingSettings>,
}

/// Settings with every default applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSettings {
    pub auto_generate: bool,
    pub mode: EmbeddingMode,
    pub batch_size: usize,
    pub processing_delay_ms: u64,
    pub max_retries: u32,
    pub sweep_interval_secs: u64,
    pub model: String,
    pub dimensions: usize,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for ResolvedSettings {
    fn default() -> Self {
        Self {
            auto_generate: true,
            mode: EmbeddingMode::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            processing_delay_ms: DEFAULT_PROCESSING_DELAY_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Provider metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
    pub dimensions: usize,
    pub available: bool,
}
