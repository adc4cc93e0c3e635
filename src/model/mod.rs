//! Data models for Recall.
//!
//! This module contains the domain models:
//! - Segment / Message (chat records owned by the message store)
//! - MessageEmbedding (one vector row per message)
//! - SearchSession (audit row per search)
//! - EmbeddingJob (transient background queue entry)

pub mod embedding;
pub mod message;

pub use embedding::{EmbeddingJob, JobPriority, JobState, MessageEmbedding, SearchSession};
pub use message::{Message, Segment};
