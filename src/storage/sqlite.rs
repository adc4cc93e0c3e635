//! SQLite storage implementation.
//!
//! `SqliteStorage` plays two roles:
//! - the **message store** (chats and messages, read by the pipeline)
//! - the **embedding store** (one vector row per message, search audit log)
//!
//! Similarity search is a brute-force cosine scan over the requesting
//! user's embeddings. Results are identical to what an ANN index with
//! cosine distance would rank, just slower on very large stores.

use crate::error::{Error, Result};
use crate::model::{Message, MessageEmbedding, SearchSession, Segment};
use crate::storage::schema::apply_schema;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// A message matched by similarity search.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SimilarityHit {
    pub message_id: String,
    pub chat_id: String,
    /// Raw structured body; display text is extracted by the caller.
    pub parts: Vec<Segment>,
    pub created_at: i64,
    /// `1 - cosine_distance`, in `[-1, 1]`.
    pub similarity: f32,
}

/// Message and embedding counts.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct EmbeddingStats {
    /// Number of stored messages.
    pub total_messages: usize,
    /// Number of messages with an embedding row.
    pub with_embeddings: usize,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    // ==================
    // Message Store
    // ==================

    /// Create a chat for `user_id` if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the chat exists but belongs to another user.
    pub fn ensure_chat(&mut self, chat_id: &str, user_id: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT OR IGNORE INTO chats (id, user_id, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![chat_id, user_id, now],
        )?;

        let owner: String = self.conn.query_row(
            "SELECT user_id FROM chats WHERE id = ?1",
            [chat_id],
            |row| row.get(0),
        )?;

        if owner == user_id {
            Ok(())
        } else {
            Err(Error::InvalidArgument(format!(
                "chat {chat_id} belongs to another user"
            )))
        }
    }

    /// Insert a message. The chat must already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (unknown chat, duplicate id).
    pub fn insert_message(&mut self, message: &Message) -> Result<()> {
        let parts = serde_json::to_string(&message.parts)?;
        self.conn.execute(
            "INSERT INTO messages (id, chat_id, role, parts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                message.id,
                message.chat_id,
                message.role,
                parts,
                message.created_at
            ],
        )?;
        Ok(())
    }

    /// Replace a message's parts (an edit in the message store).
    ///
    /// # Errors
    ///
    /// Returns `MessageNotFound` if no such message exists.
    pub fn update_message_parts(&mut self, id: &str, parts: &[Segment]) -> Result<()> {
        let parts = serde_json::to_string(parts)?;
        let changed = self.conn.execute(
            "UPDATE messages SET parts = ?1 WHERE id = ?2",
            rusqlite::params![parts, id],
        )?;

        if changed == 0 {
            return Err(Error::MessageNotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Get a message by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_message(&self, id: &str) -> Result<Option<Message>> {
        self.conn
            .query_row(
                "SELECT id, chat_id, role, parts, created_at FROM messages WHERE id = ?1",
                [id],
                map_message,
            )
            .optional()
            .map_err(Error::from)
    }

    /// Get messages that have no embedding row, newest first, skipping the
    /// first `offset` of them.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_messages_missing_embeddings(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.id, m.chat_id, m.role, m.parts, m.created_at
             FROM messages m
             LEFT JOIN message_embeddings me ON me.message_id = m.id
             WHERE me.id IS NULL
             ORDER BY m.created_at DESC, m.rowid DESC
             LIMIT ?1 OFFSET ?2",
        )?;

        let rows = stmt.query_map([to_sql_count(limit), to_sql_count(offset)], map_message)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Count messages and how many of them have embeddings.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_embedding_status(&self) -> Result<EmbeddingStats> {
        let (total, with): (i64, i64) = self.conn.query_row(
            "SELECT
               (SELECT COUNT(*) FROM messages),
               (SELECT COUNT(*) FROM message_embeddings me
                  INNER JOIN messages m ON m.id = me.message_id)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(EmbeddingStats {
            total_messages: usize::try_from(total).unwrap_or(0),
            with_embeddings: usize::try_from(with).unwrap_or(0),
        })
    }

    // ======================
    // Embedding Operations
    // ======================

    /// Get the embedding row for a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_embedding(&self, message_id: &str) -> Result<Option<MessageEmbedding>> {
        self.conn
            .query_row(
                "SELECT id, message_id, embedding, content_hash, created_at, updated_at
                 FROM message_embeddings WHERE message_id = ?1",
                [message_id],
                |row| {
                    let blob: Vec<u8> = row.get(2)?;
                    Ok(MessageEmbedding {
                        id: row.get(0)?,
                        message_id: row.get(1)?,
                        vector: blob_to_vector(&blob),
                        content_hash: row.get(3)?,
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    /// Get only the stored fingerprint for a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_content_hash(&self, message_id: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT content_hash FROM message_embeddings WHERE message_id = ?1",
                [message_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Error::from)
    }

    /// Insert or replace the embedding for a message.
    ///
    /// Keyed on the unique `message_id`: concurrent writers converge to the
    /// last write without duplicate rows. `created_at` and `id` survive an
    /// update; `updated_at` is bumped.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails (e.g. unknown message).
    pub fn upsert_embedding(
        &mut self,
        message_id: &str,
        vector: &[f32],
        content_hash: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let id = format!("emb_{}", &uuid::Uuid::new_v4().simple().to_string()[..16]);
        let dimensions = i64::try_from(vector.len()).unwrap_or(i64::MAX);

        self.conn.execute(
            "INSERT INTO message_embeddings (id, message_id, embedding, dimensions, content_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(message_id) DO UPDATE SET
               embedding = excluded.embedding,
               dimensions = excluded.dimensions,
               content_hash = excluded.content_hash,
               updated_at = excluded.updated_at",
            rusqlite::params![
                id,
                message_id,
                vector_to_blob(vector),
                dimensions,
                content_hash,
                now
            ],
        )?;

        Ok(())
    }

    /// Rank a user's embedded messages against a query vector.
    ///
    /// Keeps rows with `similarity > threshold`, sorted by descending
    /// similarity and capped at `limit`. Ties keep insertion order.
    /// Vectors whose dimension differs from the query score 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn similarity_search(
        &self,
        user_id: &str,
        query_vector: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SimilarityHit>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.id, m.chat_id, m.parts, m.created_at, me.embedding
             FROM message_embeddings me
             INNER JOIN messages m ON m.id = me.message_id
             INNER JOIN chats c ON c.id = m.chat_id
             WHERE c.user_id = ?1
             ORDER BY me.rowid ASC",
        )?;

        let rows = stmt.query_map([user_id], |row| {
            let parts: String = row.get(2)?;
            let blob: Vec<u8> = row.get(4)?;
            Ok(SimilarityHit {
                message_id: row.get(0)?,
                chat_id: row.get(1)?,
                parts: Segment::parse_parts_str(&parts),
                created_at: row.get(3)?,
                similarity: cosine_similarity(query_vector, &blob_to_vector(&blob)),
            })
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let hit = row?;
            if hit.similarity > threshold {
                hits.push(hit);
            }
        }

        // Stable sort, highest similarity first
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(limit);
        Ok(hits)
    }

    // ======================
    // Search Sessions
    // ======================

    /// Record the start of a search with `result_count = 0`.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn create_search_session(
        &mut self,
        user_id: &str,
        query: &str,
        query_embedding: &[f32],
    ) -> Result<String> {
        let id = format!("srch_{}", &uuid::Uuid::new_v4().simple().to_string()[..16]);
        let now = chrono::Utc::now().timestamp_millis();

        self.conn.execute(
            "INSERT INTO search_sessions (id, user_id, query, query_embedding, result_count, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            rusqlite::params![id, user_id, query, vector_to_blob(query_embedding), now],
        )?;

        Ok(id)
    }

    /// Patch the final result count onto a search session.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn update_search_session_count(&mut self, id: &str, result_count: usize) -> Result<()> {
        self.conn.execute(
            "UPDATE search_sessions SET result_count = ?1 WHERE id = ?2",
            rusqlite::params![to_sql_count(result_count), id],
        )?;
        Ok(())
    }

    /// Get a search session by ID (audit read-back).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_search_session(&self, id: &str) -> Result<Option<SearchSession>> {
        self.conn
            .query_row(
                "SELECT id, user_id, query, query_embedding, result_count, created_at
                 FROM search_sessions WHERE id = ?1",
                [id],
                |row| {
                    let blob: Vec<u8> = row.get(3)?;
                    let count: i64 = row.get(4)?;
                    Ok(SearchSession {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        query: row.get(2)?,
                        query_embedding: blob_to_vector(&blob),
                        result_count: usize::try_from(count).unwrap_or(0),
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    /// Count search sessions for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_search_sessions(&self, user_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM search_sessions WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let parts: String = row.get(3)?;
    Ok(Message {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        role: row.get(2)?,
        parts: Segment::parse_parts_str(&parts),
        created_at: row.get(4)?,
    })
}

fn to_sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Encode a vector as little-endian f32 bytes.
fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode little-endian f32 bytes. Trailing partial values are ignored.
fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}

/// Cosine similarity (`1 - cosine_distance`).
///
/// Returns 0.0 for mismatched lengths or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let magnitude = (norm_a * norm_b).sqrt();
    if magnitude == 0.0 {
        0.0
    } else {
        dot_product / magnitude
    }
}
