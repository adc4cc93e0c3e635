//! Configuration management.
//!
//! This module resolves where Recall keeps its state:
//! - **Database**: `~/.recall/data/recall.db` (shared by every chat and user)
//! - **Settings**: `~/.recall/config.json` (see [`crate::embeddings::config`])
//!
//! `RECALL_HOME` relocates the whole directory, which keeps integration
//! tests away from the real home directory.

use std::path::{Path, PathBuf};

/// Get the global Recall directory location.
///
/// Priority:
/// 1. `RECALL_HOME` environment variable
/// 2. `~/.recall/`
#[must_use]
pub fn global_recall_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("RECALL_HOME") {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    directories::BaseDirs::new().map(|b| b.home_dir().join(".recall"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `RECALL_DB` environment variable
/// 3. Global location: `~/.recall/data/recall.db`
///
/// The CLI's `--db` flag reads `RECALL_DB` itself, so by the time it calls
/// this the variable already arrives as `explicit_path`.
///
/// # Returns
///
/// Returns the path to the database file, or `None` if no location found.
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var("RECALL_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_recall_dir().map(|dir| dir.join("data").join("recall.db"))
}

/// Interpret an environment flag value.
///
/// Empty, `0`, `false`, `no` and `off` are falsy; everything else is truthy.
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    !matches!(value.as_str(), "" | "0" | "false" | "no" | "off")
}
