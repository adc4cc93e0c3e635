//! SQLite storage layer for Recall.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - Upsert-on-conflict for the single embedding write path
//! - A shared, mutex-guarded handle for async callers
//!
//! # Submodules
//!
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod schema;
pub mod sqlite;

pub use sqlite::{EmbeddingStats, SimilarityHit, SqliteStorage, cosine_similarity};

use crate::error::{Error, Result};
use std::sync::{Arc, Mutex};

/// Shared handle to one `SqliteStorage`.
///
/// The pipeline, queue consumer and search engine all hold clones. Each
/// store call takes the lock for the duration of one closure; callers must
/// not hold it across an `.await`, which the closure shape enforces.
#[derive(Debug, Clone)]
pub struct StorageHandle {
    inner: Arc<Mutex<SqliteStorage>>,
}

impl StorageHandle {
    #[must_use]
    pub fn new(storage: SqliteStorage) -> Self {
        Self {
            inner: Arc::new(Mutex::new(storage)),
        }
    }

    /// Open an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        SqliteStorage::open_memory().map(Self::new)
    }

    /// Run `f` with exclusive access to the store.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or `Error::Other` if the lock is poisoned.
    pub fn with<R>(&self, f: impl FnOnce(&mut SqliteStorage) -> Result<R>) -> Result<R> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| Error::Other("storage lock poisoned".into()))?;
        f(&mut guard)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::StorageHandle;
    use crate::model::{Message, Segment};

    /// Insert a message (and its chat) with a fixed ID.
    pub fn seed_message(
        storage: &StorageHandle,
        user_id: &str,
        chat_id: &str,
        id: &str,
        parts: Vec<Segment>,
    ) -> Message {
        let mut message = Message::new(chat_id, "user", parts);
        message.id = id.to_string();
        storage
            .with(|s| {
                s.ensure_chat(chat_id, user_id)?;
                s.insert_message(&message)
            })
            .unwrap();
        message
    }

    /// Insert a single-text message.
    pub fn seed_text(storage: &StorageHandle, user_id: &str, id: &str, text: &str) -> Message {
        seed_message(
            storage,
            user_id,
            &format!("chat_{user_id}"),
            id,
            vec![Segment::text(text)],
        )
    }
}
