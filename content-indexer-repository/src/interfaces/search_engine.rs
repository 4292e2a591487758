//! Search engine facade definition.
//!
//! This module defines the narrow interface the indexing pipeline needs from
//! a search engine, allowing different backend implementations (OpenSearch,
//! the in-memory engine used for local runs and tests, ...).

use async_trait::async_trait;

use content_indexer_shared::{IndexSchema, SearchDocument};

use crate::errors::SearchEngineError;
use crate::types::BatchOperationSummary;

/// Abstracts the underlying search engine.
///
/// Physical indices are concrete engine-side indices; a logical index is
/// reached through an alias that points at exactly one physical index. The
/// document operations accept either name, since the engine resolves aliases
/// on write.
///
/// All methods return `Result<T, SearchEngineError>`; implementations never
/// panic across this boundary.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Create a physical index using the mapping derived from `schema`.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the index was created
    /// * `Err(SearchEngineError)` - If the index already exists or creation fails
    async fn create_index(
        &self,
        physical_name: &str,
        schema: &IndexSchema,
    ) -> Result<(), SearchEngineError>;

    /// Delete a physical index. Deleting an index that does not exist succeeds.
    async fn delete_index(&self, physical_name: &str) -> Result<(), SearchEngineError>;

    /// Create or replace documents, keyed by `object_id`.
    ///
    /// # Arguments
    ///
    /// * `index_name` - Physical index or alias to write to
    /// * `documents` - Documents to upsert; later entries win over earlier
    ///   entries with the same `object_id`
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Aggregate statistics and per-document results
    /// * `Err(SearchEngineError)` - If the bulk operation failed entirely
    async fn upsert_documents(
        &self,
        index_name: &str,
        documents: &[SearchDocument],
    ) -> Result<BatchOperationSummary, SearchEngineError>;

    /// Delete documents by `object_id`. Documents that don't exist count as
    /// successful deletions.
    async fn delete_documents(
        &self,
        index_name: &str,
        object_ids: &[String],
    ) -> Result<BatchOperationSummary, SearchEngineError>;

    /// Number of documents in an index or alias; zero if it does not exist.
    async fn document_count(&self, index_name: &str) -> Result<u64, SearchEngineError>;

    /// The physical index an alias currently points at, if any.
    async fn resolve_alias(&self, alias: &str) -> Result<Option<String>, SearchEngineError>;

    /// Whether `name` is a concrete index. An alias is not.
    ///
    /// A concrete index holding an alias name blocks that alias for good, so
    /// callers check this before creating one.
    async fn is_physical_index(&self, name: &str) -> Result<bool, SearchEngineError>;

    /// Point `alias` at `to`, removing it from `from` in the same atomic
    /// update.
    ///
    /// With `from == None` the alias is simply created. The alias never
    /// resolves to nothing once `to` exists. Deleting `from` afterwards is the
    /// caller's decision.
    async fn swap_alias(
        &self,
        alias: &str,
        from: Option<&str>,
        to: &str,
    ) -> Result<(), SearchEngineError>;
}
