//! Queue command implementation.
//!
//! Feeds message IDs through the background queue and waits for it to
//! drain, so retries and priority ordering can be observed from a shell.

use crate::cli::QueueCommands;
use crate::embeddings::resolve_settings;
use crate::error::Result;
use crate::queue::QueueStatus;
use crate::service::RecallService;
use crate::validate::normalize_priority;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use super::{open_storage, runtime};

#[derive(Serialize)]
struct EnqueueOutput {
    enqueued: usize,
    priority: String,
    /// Queue snapshot right after the last enqueue.
    status: QueueStatus,
    embedded: Vec<String>,
    missing: Vec<String>,
}

/// Execute queue commands.
///
/// # Errors
///
/// Returns an error for an unknown priority or a missing database.
pub fn execute(command: &QueueCommands, db_path: Option<&Path>, json: bool) -> Result<()> {
    match command {
        QueueCommands::Enqueue { ids, priority } => execute_enqueue(db_path, ids, priority, json),
    }
}

fn execute_enqueue(
    db_path: Option<&Path>,
    ids: &[String],
    priority: &str,
    json: bool,
) -> Result<()> {
    let priority = normalize_priority(priority)?;
    let storage = open_storage(db_path)?;

    let rt = runtime()?;
    let status = rt.block_on(async {
        let service = RecallService::from_settings(storage.clone(), resolve_settings());
        for id in ids {
            service.queue().enqueue(id.as_str(), priority);
        }
        let status = service.queue().status();
        service.drain().await;
        status
    });

    let mut embedded = Vec::new();
    let mut missing = Vec::new();
    for id in ids {
        if storage.with(|s| s.get_content_hash(id))?.is_some() {
            embedded.push(id.clone());
        } else {
            missing.push(id.clone());
        }
    }

    if json {
        let output = EnqueueOutput {
            enqueued: ids.len(),
            priority: priority.to_string(),
            status,
            embedded,
            missing,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("Enqueued {} job(s) at {priority} priority", ids.len());
    println!(
        "  Queue after enqueue: {} waiting, processing: {}",
        status.queue_length, status.processing
    );
    println!("  {} {}", "Embedded:".green(), embedded.len());
    if !missing.is_empty() {
        println!("  {} {}", "Without embedding:".yellow(), missing.join(", "));
        println!("  Run with -v to see why jobs were dropped.");
    }

    Ok(())
}
