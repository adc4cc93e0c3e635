//! Error types for Recall.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, 9=embedding, etc.)
//! - Retryability flags for callers that drive their own retries
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Recall operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Not Found (exit 3)
    MessageNotFound,

    // Validation (exit 4)
    InvalidArgument,
    EmptyContent,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Embedding (exit 9)
    EmbeddingError,
    ProviderNotConfigured,
    RateLimited,
    DimensionMismatch,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::MessageNotFound => "MESSAGE_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::EmptyContent => "EMPTY_CONTENT",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::EmbeddingError => "EMBEDDING_ERROR",
            Self::ProviderNotConfigured => "PROVIDER_NOT_CONFIGURED",
            Self::RateLimited => "RATE_LIMITED",
            Self::DimensionMismatch => "DIMENSION_MISMATCH",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-9).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::MessageNotFound => 3,
            Self::InvalidArgument | Self::EmptyContent => 4,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
            Self::EmbeddingError
            | Self::ProviderNotConfigured
            | Self::RateLimited
            | Self::DimensionMismatch => 9,
        }
    }

    /// Whether a retry of the same operation may succeed.
    ///
    /// True for transient remote failures (network, quota) and database
    /// contention. False for bad input or missing configuration.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingError | Self::RateLimited | Self::DatabaseError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in Recall operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `recall init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Message not found: {id}")]
    MessageNotFound { id: String },

    #[error("Cannot embed empty content")]
    EmptyContent,

    #[error("Embedding provider not configured")]
    ProviderNotConfigured,

    #[error("Embedding rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::MessageNotFound { .. } => ErrorCode::MessageNotFound,
            Self::EmptyContent => ErrorCode::EmptyContent,
            Self::ProviderNotConfigured => ErrorCode::ProviderNotConfigured,
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Embedding(_) => ErrorCode::EmbeddingError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Whether this error came from the remote embedding model.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Embedding(_) | Self::RateLimited { .. } | Self::ProviderNotConfigured
        )
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `recall init` to initialize the database".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::MessageNotFound { id } => Some(format!(
                "No message with ID '{id}'. Messages must be stored before they can be embedded."
            )),

            Self::ProviderNotConfigured => Some(
                "Set OPENAI_API_KEY, or run `recall embeddings configure --api-key <key>`"
                    .to_string(),
            ),

            Self::RateLimited { retry_after_secs } => Some(format!(
                "The embedding API is throttling requests. Retry in {retry_after_secs}s \
                 or lower `--batch-size`."
            )),

            Self::DimensionMismatch { expected, .. } => Some(format!(
                "The configured model does not produce {expected}-dimension vectors. \
                 Check `recall embeddings status`."
            )),

            Self::InvalidArgument(msg) => {
                if msg.contains("priority") {
                    Some("Valid priorities: high, normal, low".to_string())
                } else if msg.contains("mode") {
                    Some("Valid modes: realtime, queue, cron, manual".to_string())
                } else if msg.contains("threshold") {
                    Some("Threshold is a cosine similarity between 0.0 and 1.0".to_string())
                } else {
                    None
                }
            }

            Self::EmptyContent
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::Embedding(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
