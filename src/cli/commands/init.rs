//! Initialize the Recall database.
//!
//! Creates `~/.recall/data/recall.db` (or the `--db` path) and applies the
//! schema. One database holds every user's chats, messages and vectors.

use crate::config::resolve_db_path;
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    reinitialized: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if the database exists and `force` is not
/// set, or an error if the directory or database cannot be created.
pub fn execute(db_path: Option<&Path>, force: bool, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path)
        .ok_or_else(|| Error::Config("Could not determine the Recall directory".to_string()))?;

    let existed = db_path.exists();
    if existed && !force {
        return Err(Error::AlreadyInitialized { path: db_path });
    }

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    if existed {
        remove_database(&db_path)?;
    }

    // Opening applies the schema
    SqliteStorage::open(&db_path)?;
    info!(path = %db_path.display(), "Initialized database");

    if json {
        let output = InitOutput {
            database: db_path,
            reinitialized: existed,
        };
        let payload = serde_json::to_string(&output)?;
        println!("{payload}");
    } else {
        println!("Initialized Recall database");
        println!("  Database: {}", db_path.display());
        println!();
        println!("Next: set OPENAI_API_KEY, then 'recall message add' and 'recall search'.");
    }

    Ok(())
}

/// Delete a database file and its WAL side files.
fn remove_database(path: &Path) -> Result<()> {
    fs::remove_file(path)?;
    for suffix in ["-wal", "-shm"] {
        let mut side = path.as_os_str().to_owned();
        side.push(suffix);
        let side = PathBuf::from(side);
        if side.exists() {
            fs::remove_file(side)?;
        }
    }
    Ok(())
}
