//! Search engine service implementation.
//!
//! This module provides the validating front for any `SearchEngine`.
//! Application code talks to the service; it checks names and document
//! identities, splits large batches into engine-sized chunks, and delegates
//! to the wrapped provider.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use content_indexer_shared::{IndexSchema, SearchDocument};

use crate::config::SearchEngineServiceConfig;
use crate::errors::SearchEngineError;
use crate::interfaces::SearchEngine;
use crate::types::{BatchOperationResult, BatchOperationSummary};
use crate::utils::{validate_index_name, validate_object_id};

/// The main service for interacting with the search engine.
///
/// The service is itself a `SearchEngine`, so it can be handed to anything
/// that expects the facade.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use content_indexer_repository::{SearchEngine, SearchEngineService};
/// use content_indexer_repository::opensearch::{IndexConfig, OpenSearchProvider};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = OpenSearchProvider::new("http://localhost:9200", IndexConfig::default()).await?;
/// let service = SearchEngineService::new(Arc::new(provider));
///
/// let count = service.document_count("articles").await?;
/// # Ok(())
/// # }
/// ```
pub struct SearchEngineService {
    provider: Arc<dyn SearchEngine>,
    config: SearchEngineServiceConfig,
}

impl SearchEngineService {
    /// Create a new SearchEngineService with default configuration.
    ///
    /// The default configuration sends at most 1000 documents per request.
    pub fn new(provider: Arc<dyn SearchEngine>) -> Self {
        Self::with_config(provider, SearchEngineServiceConfig::default())
    }

    pub fn with_config(provider: Arc<dyn SearchEngine>, config: SearchEngineServiceConfig) -> Self {
        Self { provider, config }
    }

    fn chunk_size(&self, len: usize) -> usize {
        self.config.max_batch_size.unwrap_or(len).max(1)
    }
}

/// Split `items` into those with a valid `object_id` and failed results for
/// the rest. Borrows `items` unchanged when every id is valid.
fn split_invalid_ids<'a, T: Clone>(
    index_name: &str,
    items: &'a [T],
    object_id: impl Fn(&T) -> &str,
) -> (Cow<'a, [T]>, BatchOperationSummary) {
    let rejected: Vec<BatchOperationResult> = items
        .iter()
        .filter_map(|item| {
            validate_object_id(object_id(item))
                .err()
                .map(|e| BatchOperationResult::failed(object_id(item), e))
        })
        .collect();
    if rejected.is_empty() {
        return (Cow::Borrowed(items), BatchOperationSummary::default());
    }

    warn!(index = %index_name, rejected = rejected.len(), "Skipping documents with invalid object_id");
    let valid: Vec<T> = items
        .iter()
        .filter(|item| validate_object_id(object_id(item)).is_ok())
        .cloned()
        .collect();
    (Cow::Owned(valid), BatchOperationSummary::from_results(rejected))
}

#[async_trait]
impl SearchEngine for SearchEngineService {
    async fn create_index(
        &self,
        physical_name: &str,
        schema: &IndexSchema,
    ) -> Result<(), SearchEngineError> {
        validate_index_name(physical_name)?;
        self.provider.create_index(physical_name, schema).await
    }

    async fn delete_index(&self, physical_name: &str) -> Result<(), SearchEngineError> {
        validate_index_name(physical_name)?;
        self.provider.delete_index(physical_name).await
    }

    /// Upsert documents, split into chunks of at most `max_batch_size`.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Merged summary across all chunks.
    ///   Documents with an invalid `object_id` are reported as failed and
    ///   not sent
    /// * `Err(SearchEngineError::ValidationError)` - If the index name is invalid
    /// * `Err(SearchEngineError)` - If a chunk failed entirely; earlier chunks
    ///   stay written
    async fn upsert_documents(
        &self,
        index_name: &str,
        documents: &[SearchDocument],
    ) -> Result<BatchOperationSummary, SearchEngineError> {
        validate_index_name(index_name)?;
        let (documents, mut summary) =
            split_invalid_ids(index_name, documents, |d| d.object_id.as_str());
        if documents.is_empty() {
            return Ok(summary);
        }

        for chunk in documents.chunks(self.chunk_size(documents.len())) {
            debug!(index = %index_name, chunk = chunk.len(), "Sending upsert chunk");
            summary.merge(self.provider.upsert_documents(index_name, chunk).await?);
        }
        Ok(summary)
    }

    async fn delete_documents(
        &self,
        index_name: &str,
        object_ids: &[String],
    ) -> Result<BatchOperationSummary, SearchEngineError> {
        validate_index_name(index_name)?;
        let (object_ids, mut summary) = split_invalid_ids(index_name, object_ids, String::as_str);
        if object_ids.is_empty() {
            return Ok(summary);
        }

        for chunk in object_ids.chunks(self.chunk_size(object_ids.len())) {
            debug!(index = %index_name, chunk = chunk.len(), "Sending delete chunk");
            summary.merge(self.provider.delete_documents(index_name, chunk).await?);
        }
        Ok(summary)
    }

    async fn document_count(&self, index_name: &str) -> Result<u64, SearchEngineError> {
        validate_index_name(index_name)?;
        self.provider.document_count(index_name).await
    }

    async fn resolve_alias(&self, alias: &str) -> Result<Option<String>, SearchEngineError> {
        validate_index_name(alias)?;
        self.provider.resolve_alias(alias).await
    }

    async fn is_physical_index(&self, name: &str) -> Result<bool, SearchEngineError> {
        validate_index_name(name)?;
        self.provider.is_physical_index(name).await
    }

    async fn swap_alias(
        &self,
        alias: &str,
        from: Option<&str>,
        to: &str,
    ) -> Result<(), SearchEngineError> {
        validate_index_name(alias)?;
        validate_index_name(to)?;
        if let Some(from) = from {
            validate_index_name(from)?;
            if from == to {
                return Err(SearchEngineError::validation(format!(
                    "Alias '{}' already targets '{}'",
                    alias, to
                )));
            }
        }
        self.provider.swap_alias(alias, from, to).await
    }
}
