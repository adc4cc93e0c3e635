//! Recall - semantic search over chat history
//!
//! This crate provides the core functionality for the `recall` CLI tool.
//!
//! # Architecture
//!
//! - [`content`] - Text extraction and content fingerprints
//! - [`embeddings`] - Embedding client and the OpenAI-compatible provider
//! - [`storage`] - SQLite message and embedding store
//! - [`pipeline`] - Extract → fingerprint → embed → store
//! - [`queue`] - In-process background embedding queue
//! - [`search`] - Similarity search engine
//! - [`service`] - Composition root and message-save integration point
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Path resolution
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod content;
pub mod embeddings;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod queue;
pub mod search;
pub mod service;
pub mod storage;
pub mod validate;

pub use error::{Error, Result};
