//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::search::{DEFAULT_LIMIT, DEFAULT_THRESHOLD};

pub mod commands;

/// Recall - semantic search over chat history
#[derive(Parser, Debug)]
#[command(name = "recall", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.recall/data/recall.db)
    #[arg(long, global = true, env = "RECALL_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the Recall database
    Init {
        /// Overwrite existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Store chat messages
    Message {
        #[command(subcommand)]
        command: MessageCommands,
    },

    /// Semantic search over a user's messages
    Search(SearchArgs),

    /// Embedding generation and configuration
    Embeddings {
        #[command(subcommand)]
        command: EmbeddingsCommands,
    },

    /// Background embedding queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },

    /// Embed messages that are missing vectors, periodically
    Sweep(SweepArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Message Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum MessageCommands {
    /// Save a message (or replace the parts of an existing one)
    Add {
        /// Owning user ID
        #[arg(long)]
        user: String,

        /// Chat ID (created on first use)
        #[arg(long)]
        chat: String,

        /// Author role
        #[arg(long, default_value = "user")]
        role: String,

        /// Message parts as a JSON array, e.g. '[{"type":"text","text":"hi"}]'
        #[arg(long)]
        parts: String,

        /// Existing message ID to update instead of creating a new message
        #[arg(long)]
        id: Option<String>,
    },

    /// Show a stored message
    Show {
        /// Message ID
        id: String,
    },
}

// ============================================================================
// Search
// ============================================================================

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Natural-language query
    pub query: String,

    /// User whose messages are searched
    #[arg(long)]
    pub user: String,

    /// Maximum number of results
    #[arg(short, long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    /// Minimum cosine similarity (exclusive)
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f32,
}

// ============================================================================
// Embeddings Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum EmbeddingsCommands {
    /// Show provider configuration and coverage
    Status,

    /// Show embedding coverage statistics
    Stats,

    /// Embed one message if it has no vector yet
    Ensure {
        /// Message ID
        id: String,
    },

    /// Embed messages that have no vector yet
    Backfill {
        /// Maximum messages to process
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Send the whole batch in one embedding request
        #[arg(long)]
        batch_embed: bool,
    },

    /// Test provider connectivity
    Test {
        /// Text to embed
        #[arg(default_value = "Hello world")]
        text: String,
    },

    /// Update settings in ~/.recall/config.json
    Configure(ConfigureArgs),
}

#[derive(Args, Debug, Default)]
pub struct ConfigureArgs {
    /// Generate embeddings when messages are saved (true/false)
    #[arg(long)]
    pub auto_generate: Option<bool>,

    /// Embedding mode (realtime, queue, cron, manual)
    #[arg(long)]
    pub mode: Option<String>,

    /// Messages per sweep
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Delay between items, in milliseconds
    #[arg(long)]
    pub processing_delay_ms: Option<u64>,

    /// Retries per queued job
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Seconds between sweeps in cron mode
    #[arg(long)]
    pub sweep_interval_secs: Option<u64>,

    /// Embedding model
    #[arg(long)]
    pub model: Option<String>,

    /// Vector dimensions produced by the model
    #[arg(long)]
    pub dimensions: Option<usize>,

    /// API key for the embedding endpoint
    #[arg(long)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long)]
    pub base_url: Option<String>,

    /// Remove all stored embedding settings
    #[arg(long, conflicts_with_all = [
        "auto_generate", "mode", "batch_size", "processing_delay_ms", "max_retries",
        "sweep_interval_secs", "model", "dimensions", "api_key", "base_url",
    ])]
    pub reset: bool,
}

// ============================================================================
// Queue Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// Enqueue messages and wait for the queue to drain
    Enqueue {
        /// Message IDs
        #[arg(required = true)]
        ids: Vec<String>,

        /// Job priority (high, normal, low)
        #[arg(short, long, default_value = "normal")]
        priority: String,
    },
}

// ============================================================================
// Sweep
// ============================================================================

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Seconds between sweeps (overrides settings)
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// Messages per sweep (overrides settings)
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Run a single sweep and exit
    #[arg(long)]
    pub once: bool,
}
