//! # Content Indexer
//!
//! Keeps search indices in sync with a content management system. Content
//! change events are consumed from Kafka, turned into indexing tasks, and
//! written to the search engine in batches. Full rebuilds run into a shadow
//! index and go live through an alias swap.
//!
//! ## Architecture
//!
//! 1. **Consumer**: Receives content events from Kafka
//! 2. **Task logger**: Turns events into queued tasks for every affected index
//! 3. **Queue worker**: Drains the task queue on an interval or on demand
//! 4. **Task processor**: Maps tasks through index strategies and writes to the engine
//! 5. **Rebuild coordinator**: Backfills shadow indices and swaps aliases
//! 6. **Orchestrator**: Coordinates the flow and handles shutdown
//!
//! ## Modules
//!
//! - [`config`]: Settings, definition store, and dependency wiring
//! - [`registry`]: The catalog of configured indices
//! - [`strategy`]: Per-index mapping logic
//! - [`queue`] / [`worker`] / [`processor`]: The indexing task pipeline
//! - [`rebuild`]: Zero-downtime rebuilds
//! - [`admin`]: HTTP admin API
//! - [`errors`]: Error types for the pipeline

pub mod admin;
pub mod config;
pub mod consumer;
pub mod content;
pub mod errors;
pub mod logger;
pub mod orchestrator;
pub mod processor;
pub mod queue;
pub mod rebuild;
pub mod registry;
pub mod stats;
pub mod strategy;
pub mod worker;

pub use config::Dependencies;
pub use errors::IndexerError;

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Indexer error: {0}")]
    Indexer(#[from] IndexerError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
