//! # Content Indexer Repository
//!
//! This crate provides the search engine facade used by the content indexer.
//! It includes definitions for errors and the `SearchEngine` interface, a
//! concrete implementation for OpenSearch, an in-memory implementation, and a
//! validating service that wraps either.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod service;
pub mod types;
pub mod utils;

pub use config::SearchEngineServiceConfig;
pub use errors::SearchEngineError;
pub use interfaces::SearchEngine;
pub use memory::{EngineCall, EngineOperation, InMemorySearchEngine};
pub use opensearch::OpenSearchProvider;
pub use service::SearchEngineService;
pub use types::{BatchOperationResult, BatchOperationSummary};
pub use utils::{validate_index_name, validate_object_id, versioned_index_name};
