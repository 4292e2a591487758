//! Access to the content store.
//!
//! This module provides:
//! - [`ContentSource`] for querying every item an index definition covers
//! - [`UrlResolver`] for turning a page's tree path into its public URL
//! - [`HttpContentClient`] production client against the CMS API
//! - [`InMemoryContent`] in-memory content used for local runs and tests

mod http_client;
mod memory;

pub use http_client::HttpContentClient;
pub use memory::InMemoryContent;

use async_trait::async_trait;

use content_indexer_shared::{IndexDefinition, ItemToIndex};

use crate::errors::IndexerError;

/// Queries the content store during a rebuild backfill.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Every item the definition includes, pages and reusable items alike.
    async fn query_items(
        &self,
        definition: &IndexDefinition,
    ) -> Result<Vec<ItemToIndex>, IndexerError>;
}

/// Resolves the public URL of a page.
#[async_trait]
pub trait UrlResolver: Send + Sync {
    /// Failures are treated as "no URL" by callers.
    async fn resolve_url(
        &self,
        tree_path: &str,
        channel_name: &str,
        language_name: &str,
    ) -> Result<String, IndexerError>;
}
