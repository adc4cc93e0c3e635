//! Sweep command implementation.
//!
//! Runs the `cron`-mode sweep in the foreground: every interval, embed up
//! to one batch of messages that have no vector. Ctrl-C stops it.

use crate::cli::SweepArgs;
use crate::embeddings::resolve_settings;
use crate::error::{Error, Result};
use crate::service::RecallService;
use serde::Serialize;
use std::path::Path;
use tracing::info;

use super::{open_storage, runtime};

#[derive(Serialize)]
struct SweepOutput {
    processed: usize,
    remaining: usize,
}

/// Execute the sweep command.
///
/// # Errors
///
/// Returns an error if the database is missing, no provider is configured,
/// or the candidate query fails.
pub fn execute(args: &SweepArgs, db_path: Option<&Path>, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;

    let mut settings = resolve_settings();
    if let Some(secs) = args.interval_secs {
        if secs == 0 {
            return Err(Error::InvalidArgument(
                "sweep interval must be at least 1 second".to_string(),
            ));
        }
        settings.sweep_interval_secs = secs;
    }
    if let Some(batch_size) = args.batch_size {
        settings.batch_size = batch_size;
    }

    let service = RecallService::from_settings(storage, settings);
    if !service.pipeline().client().is_configured() {
        return Err(Error::ProviderNotConfigured);
    }

    let rt = runtime()?;
    if args.once {
        rt.block_on(run_once(&service, json))
    } else {
        rt.block_on(run_forever(&service, json))
    }
}

async fn run_once(service: &RecallService, json: bool) -> Result<()> {
    let processed = service.sweep_once().await?;
    let stats = service.pipeline().get_stats()?;
    let remaining = stats
        .total_messages
        .saturating_sub(stats.messages_with_embeddings);

    if json {
        let output = SweepOutput {
            processed,
            remaining,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Processed {processed} message(s); {remaining} without embeddings.");
    }
    Ok(())
}

async fn run_forever(service: &RecallService, json: bool) -> Result<()> {
    service.spawn_sweep();
    if !json {
        println!(
            "Sweeping every {}s (batch size {}). Press Ctrl-C to stop.",
            service.settings().sweep_interval_secs,
            service.settings().batch_size
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("Stopping sweep");
    service.shutdown();
    Ok(())
}
