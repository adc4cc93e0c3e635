//! Command implementations.

pub mod completions;
pub mod embeddings;
pub mod init;
pub mod message;
pub mod queue;
pub mod search;
pub mod sweep;
pub mod version;

use crate::config::resolve_db_path;
use crate::error::{Error, Result};
use crate::storage::{SqliteStorage, StorageHandle};
use std::path::Path;

/// Open the database, failing with `NotInitialized` if `recall init` has
/// not created it yet.
pub(crate) fn open_storage(db_path: Option<&Path>) -> Result<StorageHandle> {
    let path = resolve_db_path(db_path).ok_or(Error::NotInitialized)?;
    if !path.exists() {
        return Err(Error::NotInitialized);
    }
    Ok(StorageHandle::new(SqliteStorage::open(&path)?))
}

/// Build the async runtime used by commands that talk to the embedding API.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}
