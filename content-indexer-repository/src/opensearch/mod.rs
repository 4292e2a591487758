//! OpenSearch implementation of the search engine facade.
//!
//! This module provides a concrete implementation of `SearchEngine`
//! using OpenSearch as the backend.

mod index_config;
mod provider;

pub use index_config::{get_index_settings, IndexConfig};
pub use provider::OpenSearchProvider;
