//! Embeddings command implementation.
//!
//! Provides CLI commands for the embedding pipeline:
//! - `status` - Show resolved settings, provider and coverage
//! - `stats` - Coverage statistics only
//! - `ensure` - Embed one message if it has no vector
//! - `backfill` - Embed messages missing a vector
//! - `test` - Test provider connectivity
//! - `configure` - Update settings in the config file

use crate::cli::{ConfigureArgs, EmbeddingsCommands};
use crate::config::resolve_db_path;
use crate::embeddings::{
    EmbeddingClient, EmbeddingSettings, ProviderInfo, ResolvedSettings, create_embedding_client,
    reset_embedding_settings, resolve_settings, save_embedding_settings,
};
use crate::error::{Error, Result};
use crate::pipeline::{EmbeddingPipeline, PipelineStats, ProcessOutcome};
use crate::storage::{SqliteStorage, StorageHandle};
use crate::validate::normalize_mode;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use super::{open_storage, runtime};

/// Output for embeddings status command.
#[derive(Serialize)]
struct StatusOutput<'a> {
    settings: &'a ResolvedSettings,
    api_key_set: bool,
    provider: Option<ProviderInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<PipelineStats>,
}

/// Output for embeddings ensure command.
#[derive(Serialize)]
struct EnsureOutput<'a> {
    id: &'a str,
    outcome: ProcessOutcome,
}

/// Output for backfill command.
#[derive(Serialize)]
struct BackfillOutput {
    candidates: usize,
    processed: usize,
    remaining: usize,
}

/// Output for embeddings test command.
#[derive(Serialize)]
struct TestOutput<'a> {
    success: bool,
    model: &'a str,
    dimensions: usize,
    input_text: &'a str,
    embedding_sample: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Output for configure command.
#[derive(Serialize)]
struct ConfigureOutput {
    success: bool,
    message: String,
    settings: ResolvedSettings,
}

/// Execute embeddings command.
///
/// # Errors
///
/// Returns an error if the database is missing or the provider call fails.
pub fn execute(command: &EmbeddingsCommands, db_path: Option<&Path>, json: bool) -> Result<()> {
    match command {
        EmbeddingsCommands::Status => execute_status(db_path, json),
        EmbeddingsCommands::Stats => execute_stats(db_path, json),
        EmbeddingsCommands::Configure(args) => execute_configure(db_path, args, json),
        EmbeddingsCommands::Ensure { id } => {
            let rt = runtime()?;
            rt.block_on(execute_ensure(db_path, id, json))
        }
        EmbeddingsCommands::Backfill {
            batch_size,
            batch_embed,
        } => {
            let rt = runtime()?;
            rt.block_on(execute_backfill(db_path, *batch_size, *batch_embed, json))
        }
        EmbeddingsCommands::Test { text } => {
            let rt = runtime()?;
            rt.block_on(execute_test(text, json))
        }
    }
}

fn pipeline_for(
    storage: StorageHandle,
    client: EmbeddingClient,
    settings: &ResolvedSettings,
) -> EmbeddingPipeline {
    EmbeddingPipeline::new(storage, client)
        .with_processing_delay(Duration::from_millis(settings.processing_delay_ms))
}

/// Show resolved settings, the active provider and coverage.
fn execute_status(db_path: Option<&Path>, json: bool) -> Result<()> {
    let settings = resolve_settings();
    let client = create_embedding_client(&settings);

    // Stats are optional here; status works before `recall init`
    let stats = resolve_db_path(db_path)
        .filter(|path| path.exists())
        .and_then(|path| SqliteStorage::open(&path).ok())
        .and_then(|storage| {
            pipeline_for(StorageHandle::new(storage), client.clone(), &settings)
                .get_stats()
                .ok()
        });

    let output = StatusOutput {
        settings: &settings,
        api_key_set: settings.api_key.is_some(),
        provider: client.info(),
        stats,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", "Embeddings Status".bold());
    println!("=================");
    println!();
    println!(
        "Auto-generate: {}",
        if settings.auto_generate { "yes" } else { "no" }
    );
    println!("Mode:          {}", settings.mode);
    println!("Model:         {} ({} dims)", settings.model, settings.dimensions);
    println!("Endpoint:      {}", settings.base_url);
    println!("Batch size:    {}", settings.batch_size);
    println!("Delay:         {}ms", settings.processing_delay_ms);
    println!("Max retries:   {}", settings.max_retries);
    println!();

    if output.provider.is_some() {
        println!("Provider: {}", "✓ configured".green());
    } else {
        println!("Provider: {}", "✗ not configured".red());
        println!();
        println!("To enable embeddings:");
        println!("  - Set OPENAI_API_KEY");
        println!("  - Or run 'recall embeddings configure --api-key <key>'");
    }

    if let Some(ref s) = output.stats {
        println!();
        print_stats(s);
    }

    Ok(())
}

fn print_stats(stats: &PipelineStats) {
    println!("Message Statistics:");
    println!("  Total messages:     {}", stats.total_messages);
    println!("  With embeddings:    {}", stats.messages_with_embeddings);
    println!("  Coverage:           {:.2}%", stats.coverage);
    if stats.messages_with_embeddings < stats.total_messages {
        println!();
        println!("Run 'recall embeddings backfill' to generate missing embeddings.");
    }
}

fn execute_stats(db_path: Option<&Path>, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let settings = resolve_settings();
    let client = EmbeddingClient::unconfigured(settings.dimensions);
    let stats = pipeline_for(storage, client, &settings).get_stats()?;

    if json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        print_stats(&stats);
    }
    Ok(())
}

async fn execute_ensure(db_path: Option<&Path>, id: &str, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let settings = resolve_settings();
    let client = create_embedding_client(&settings);
    let outcome = pipeline_for(storage, client, &settings)
        .ensure_embedding(id)
        .await?;

    if json {
        println!("{}", serde_json::to_string(&EnsureOutput { id, outcome })?);
    } else {
        let label = match outcome {
            ProcessOutcome::Embedded => "embedded".green(),
            ProcessOutcome::Unchanged => "already embedded".normal(),
            ProcessOutcome::Blank => "no searchable text".yellow(),
        };
        println!("{id}: {label}");
    }
    Ok(())
}

/// Embed messages that have no vector yet, newest first.
async fn execute_backfill(
    db_path: Option<&Path>,
    batch_size: Option<usize>,
    batch_embed: bool,
    json: bool,
) -> Result<()> {
    let storage = open_storage(db_path)?;
    let settings = resolve_settings();

    // Fail fast rather than logging one warning per message
    let client = create_embedding_client(&settings);
    if !client.is_configured() {
        return Err(Error::ProviderNotConfigured);
    }

    let batch_size = batch_size.unwrap_or(settings.batch_size);
    let pipeline = pipeline_for(storage, client, &settings).with_batch_embed(batch_embed);

    let before = pipeline.get_stats()?;
    let candidates = before
        .total_messages
        .saturating_sub(before.messages_with_embeddings)
        .min(batch_size);

    if !json && candidates > 0 {
        println!("Backfilling up to {candidates} messages with {}...", settings.model);
    }

    let processed = pipeline.process_missing_batch(batch_size).await?;
    let after = pipeline.get_stats()?;
    let remaining = after
        .total_messages
        .saturating_sub(after.messages_with_embeddings);

    if json {
        let output = BackfillOutput {
            candidates,
            processed,
            remaining,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if candidates == 0 {
        println!("No messages to process.");
        println!("All messages already have embeddings.");
    } else {
        println!("{} {processed} of {candidates} messages", "Processed".green());
        if remaining > 0 {
            println!("{remaining} messages still without embeddings.");
        }
    }

    Ok(())
}

/// Embed `text` once and report the first few values.
async fn execute_test(text: &str, json: bool) -> Result<()> {
    let settings = resolve_settings();
    let client = create_embedding_client(&settings);

    match client.embed(text).await {
        Ok(embedding) => {
            let sample: Vec<f32> = embedding.iter().take(5).copied().collect();

            if json {
                let output = TestOutput {
                    success: true,
                    model: &settings.model,
                    dimensions: embedding.len(),
                    input_text: text,
                    embedding_sample: sample,
                    error: None,
                };
                println!("{}", serde_json::to_string(&output)?);
            } else {
                println!("Embedding Test: {}", "SUCCESS".green());
                println!();
                println!("Model:      {}", settings.model);
                println!("Dimensions: {}", embedding.len());
                println!("Input:      \"{text}\"");
                println!();
                println!("Sample (first 5 values):");
                for (i, v) in sample.iter().enumerate() {
                    println!("  [{i}] {v:.6}");
                }
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let output = TestOutput {
                    success: false,
                    model: &settings.model,
                    dimensions: 0,
                    input_text: text,
                    embedding_sample: vec![],
                    error: Some(e.to_string()),
                };
                println!("{}", serde_json::to_string(&output)?);
            } else {
                println!("Embedding Test: {}", "FAILED".red());
                println!();
                println!("Model: {}", settings.model);
                println!("Error: {e}");
            }
            Err(e)
        }
    }
}

/// Turn the configure flags into a partial settings record.
fn settings_from_args(args: &ConfigureArgs) -> Result<EmbeddingSettings> {
    let mode = args.mode.as_deref().map(normalize_mode).transpose()?;

    if args.batch_size == Some(0) {
        return Err(Error::InvalidArgument("batch size must be at least 1".to_string()));
    }
    if args.dimensions == Some(0) {
        return Err(Error::InvalidArgument("dimensions must be at least 1".to_string()));
    }

    Ok(EmbeddingSettings {
        auto_generate: args.auto_generate,
        mode,
        batch_size: args.batch_size,
        processing_delay_ms: args.processing_delay_ms,
        max_retries: args.max_retries,
        sweep_interval_secs: args.sweep_interval_secs,
        model: args.model.clone(),
        dimensions: args.dimensions,
        api_key: args.api_key.clone(),
        base_url: args.base_url.clone(),
    })
}

/// Configure embedding settings.
fn execute_configure(db_path: Option<&Path>, args: &ConfigureArgs, json: bool) -> Result<()> {
    let message = if args.reset {
        reset_embedding_settings()?;
        "Embedding settings reset to defaults".to_string()
    } else {
        let update = settings_from_args(args)?;
        if update == EmbeddingSettings::default() {
            // If no changes, just show current config
            return execute_status(db_path, json);
        }
        save_embedding_settings(&update)?;
        "Configuration updated".to_string()
    };

    if json {
        let output = ConfigureOutput {
            success: true,
            message,
            settings: resolve_settings(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{message}");
        println!();
        execute_status(db_path, false)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingMode;

    #[test]
    fn test_settings_from_args_normalizes_mode() {
        let args = ConfigureArgs {
            mode: Some("background".to_string()),
            batch_size: Some(25),
            ..ConfigureArgs::default()
        };
        let settings = settings_from_args(&args).unwrap();
        assert_eq!(settings.mode, Some(EmbeddingMode::Queue));
        assert_eq!(settings.batch_size, Some(25));
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_settings_from_args_rejects_bad_values() {
        let args = ConfigureArgs {
            mode: Some("hourly".to_string()),
            ..ConfigureArgs::default()
        };
        assert!(settings_from_args(&args).is_err());

        let args = ConfigureArgs {
            batch_size: Some(0),
            ..ConfigureArgs::default()
        };
        assert!(settings_from_args(&args).is_err());
    }

    #[test]
    fn test_empty_args_is_no_change() {
        let settings = settings_from_args(&ConfigureArgs::default()).unwrap();
        assert_eq!(settings, EmbeddingSettings::default());
    }
}
