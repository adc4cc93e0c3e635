//! Embedding configuration management.
//!
//! Loads and saves embedding settings from `~/.recall/config.json` and
//! resolves the effective settings.
//!
//! Priority for every field: environment variable > config file > default.

use crate::error::{Error, Result};
use std::fs;
use std::path::PathBuf;

use super::types::{EmbeddingMode, EmbeddingSettings, RecallConfig, ResolvedSettings};

/// Get the config file path.
pub fn config_path() -> Result<PathBuf> {
    crate::config::global_recall_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or(Error::Config("Could not determine home directory".into()))
}

/// Load the full Recall configuration.
pub fn load_config() -> Result<RecallConfig> {
    let path = config_path()?;

    if !path.exists() {
        return Ok(RecallConfig::default());
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Save the full Recall configuration.
pub fn save_config(config: &RecallConfig) -> Result<()> {
    let path = config_path()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    fs::write(&path, content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))?;

    Ok(())
}

/// Get embedding settings from config file.
pub fn get_embedding_settings() -> Result<Option<EmbeddingSettings>> {
    let config = load_config()?;
    Ok(config.embeddings)
}

/// Save embedding settings (merges with existing config).
pub fn save_embedding_settings(settings: &EmbeddingSettings) -> Result<()> {
    let mut config = load_config()?;
    let existing = config.embeddings.unwrap_or_default();
    config.embeddings = Some(settings.merged_over(existing));
    save_config(&config)
}

/// Reset embedding settings (removes from config).
pub fn reset_embedding_settings() -> Result<()> {
    let mut config = load_config()?;
    config.embeddings = None;
    save_config(&config)
}

/// Resolve the effective settings from the process environment and the
/// config file.
///
/// An unreadable config file is logged and treated as absent.
pub fn resolve_settings() -> ResolvedSettings {
    let file = match get_embedding_settings() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring embedding config file");
            None
        }
    };

    resolve_with(file.as_ref(), |key| std::env::var(key).ok())
}

/// Resolve settings from an explicit config block and environment lookup.
pub fn resolve_with<F>(file: Option<&EmbeddingSettings>, lookup: F) -> ResolvedSettings
where
    F: Fn(&str) -> Option<String>,
{
    let file = file.cloned().unwrap_or_default();
    let defaults = ResolvedSettings::default();
    let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    ResolvedSettings {
        auto_generate: env("RECALL_AUTO_GENERATE")
            .map(|v| crate::config::is_truthy(&v))
            .or(file.auto_generate)
            .unwrap_or(defaults.auto_generate),
        mode: env("RECALL_EMBEDDINGS_MODE")
            .and_then(|v| parse_logged::<EmbeddingMode>("RECALL_EMBEDDINGS_MODE", &v))
            .or(file.mode)
            .unwrap_or(defaults.mode),
        batch_size: env("RECALL_BATCH_SIZE")
            .and_then(|v| parse_logged("RECALL_BATCH_SIZE", &v))
            .or(file.batch_size)
            .filter(|n| *n > 0)
            .unwrap_or(defaults.batch_size),
        processing_delay_ms: env("RECALL_PROCESSING_DELAY_MS")
            .and_then(|v| parse_logged("RECALL_PROCESSING_DELAY_MS", &v))
            .or(file.processing_delay_ms)
            .unwrap_or(defaults.processing_delay_ms),
        max_retries: env("RECALL_MAX_RETRIES")
            .and_then(|v| parse_logged("RECALL_MAX_RETRIES", &v))
            .or(file.max_retries)
            .unwrap_or(defaults.max_retries),
        sweep_interval_secs: file
            .sweep_interval_secs
            .filter(|n| *n > 0)
            .unwrap_or(defaults.sweep_interval_secs),
        model: env("RECALL_EMBEDDING_MODEL")
            .or(file.model)
            .unwrap_or(defaults.model),
        dimensions: file
            .dimensions
            .filter(|n| *n > 0)
            .unwrap_or(defaults.dimensions),
        api_key: env("OPENAI_API_KEY").or(file.api_key),
        base_url: env("OPENAI_BASE_URL")
            .or(file.base_url)
            .unwrap_or(defaults.base_url),
    }
}

fn parse_logged<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    let parsed = value.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!(key, value, "Ignoring unparseable environment value");
    }
    parsed
}
