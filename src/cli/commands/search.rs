//! Search command implementation.

use crate::cli::SearchArgs;
use crate::embeddings::{create_embedding_client, resolve_settings};
use crate::error::Result;
use crate::search::{SearchEngine, SearchRequest};
use crate::validate::{validate_limit, validate_query, validate_threshold};
use colored::Colorize;
use std::path::Path;

use super::{open_storage, runtime};

/// Execute the search command.
///
/// Embedding failures produce an empty result set (logged at warn), not an
/// error exit.
///
/// # Errors
///
/// Returns an error for invalid arguments or a missing database.
pub fn execute(args: &SearchArgs, db_path: Option<&Path>, json: bool) -> Result<()> {
    let query = validate_query(&args.query)?;
    let limit = validate_limit(args.limit)?;
    let threshold = validate_threshold(args.threshold)?;

    let storage = open_storage(db_path)?;
    let client = create_embedding_client(&resolve_settings());
    let engine = SearchEngine::new(storage, client);

    // The session keeps the query as typed; the engine trims before embedding.
    let request = SearchRequest::new(&args.user, args.query.as_str())
        .with_limit(limit)
        .with_threshold(threshold);

    let rt = runtime()?;
    let response = rt.block_on(engine.search(&request));

    if json {
        println!("{}", serde_json::to_string(&response)?);
        return Ok(());
    }

    if response.results.is_empty() {
        println!("No matches above {threshold} for \"{query}\".");
        return Ok(());
    }

    println!("{} result(s) for \"{}\":", response.total, query.bold());
    println!();
    for (rank, result) in response.results.iter().enumerate() {
        println!(
            "{:>3}. {} {}",
            rank + 1,
            format!("{:.3}", result.similarity).cyan(),
            result.content
        );
        println!(
            "     {}",
            format!("{} in {}", result.message_id, result.chat_id).dimmed()
        );
    }

    Ok(())
}
