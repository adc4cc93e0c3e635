//! Embedding records, search sessions and background jobs.

use serde::{Deserialize, Serialize};

/// The embedding row for a single message.
///
/// At most one row exists per `message_id`. The `vector` is always the
/// embedding of the text whose fingerprint equals `content_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEmbedding {
    /// Row identifier
    pub id: String,

    /// Owning message (unique)
    pub message_id: String,

    /// Dense vector (f32, model dimension)
    pub vector: Vec<f32>,

    /// SHA-256 hex digest of the extracted text that was embedded
    pub content_hash: String,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last re-embedding timestamp (Unix milliseconds)
    pub updated_at: i64,
}

/// Audit record written for every search.
///
/// Inserted with `result_count = 0` before the store is queried, then
/// patched with the final count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSession {
    pub id: String,
    pub user_id: String,
    pub query: String,
    pub query_embedding: Vec<f32>,
    pub result_count: usize,
    pub created_at: i64,
}

/// Priority band for queued embedding jobs.
///
/// `High` jobs jump to the front of the queue. `Normal` and `Low` are
/// both appended and therefore share one FIFO band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    High,
    #[default]
    Normal,
    Low,
}

impl std::fmt::Display for JobPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Normal => write!(f, "normal"),
            Self::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for JobPriority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "normal" => Ok(Self::Normal),
            "low" => Ok(Self::Low),
            _ => Err(format!("Unknown priority: {s}")),
        }
    }
}

/// Lifecycle state of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "attempts")]
pub enum JobState {
    /// Never attempted.
    Pending,
    /// Failed this many times and was re-queued at the back.
    Retrying(u32),
}

/// A transient, in-memory embedding job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingJob {
    pub message_id: String,
    pub priority: JobPriority,
    pub state: JobState,
}

impl EmbeddingJob {
    /// Create a pending job.
    pub fn new(message_id: impl Into<String>, priority: JobPriority) -> Self {
        Self {
            message_id: message_id.into(),
            priority,
            state: JobState::Pending,
        }
    }

    /// Number of failed attempts so far.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        match self.state {
            JobState::Pending => 0,
            JobState::Retrying(count) => count,
        }
    }

    /// Record a failed attempt.
    pub fn mark_failed(&mut self) {
        self.state = JobState::Retrying(self.retry_count() + 1);
    }
}
