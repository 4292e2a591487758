//! In-memory search engine.
//!
//! A complete `SearchEngine` backed by process memory. It is used when the
//! indexer runs without a cluster (`SEARCH_ENGINE=memory`) and by the test
//! suites of the crates built on top of this one, which can inspect stored
//! documents, follow every call made, and inject failures.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use content_indexer_shared::{IndexSchema, SearchDocument};

use crate::errors::SearchEngineError;
use crate::interfaces::SearchEngine;
use crate::types::{BatchOperationResult, BatchOperationSummary};

/// A recorded call against the in-memory engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CreateIndex(String),
    DeleteIndex(String),
    Upsert { index: String, object_ids: Vec<String> },
    Delete { index: String, object_ids: Vec<String> },
    SwapAlias { alias: String, from: Option<String>, to: String },
}

/// Operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOperation {
    CreateIndex,
    DeleteIndex,
    Upsert,
    Delete,
    Count,
    ResolveAlias,
    SwapAlias,
}

#[derive(Debug, Default)]
struct StoredIndex {
    schema: IndexSchema,
    documents: BTreeMap<String, SearchDocument>,
}

#[derive(Debug, Default)]
struct EngineState {
    indices: HashMap<String, StoredIndex>,
    aliases: HashMap<String, String>,
    calls: Vec<EngineCall>,
    failing_operations: HashSet<EngineOperation>,
    failing_indices: HashSet<String>,
    rejected_documents: HashSet<String>,
}

impl EngineState {
    /// Follow an alias to its physical index; physical names resolve to themselves.
    fn resolve(&self, name: &str) -> String {
        self.aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn check(&self, operation: EngineOperation, index: &str) -> Result<(), SearchEngineError> {
        if self.failing_operations.contains(&operation) || self.failing_indices.contains(index) {
            return Err(SearchEngineError::connection(format!(
                "Injected {:?} failure on '{}'",
                operation, index
            )));
        }
        Ok(())
    }
}

/// Search engine that keeps every index in memory.
///
/// Writing to a name that is neither an index nor an alias creates the index
/// with an empty schema, matching the engine's auto-create behavior.
#[derive(Debug, Default)]
pub struct InMemorySearchEngine {
    state: Mutex<EngineState>,
}

impl InMemorySearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every call of `operation` fail until cleared.
    pub fn fail_operation(&self, operation: EngineOperation) {
        self.state().failing_operations.insert(operation);
    }

    /// Make every call that touches `index` (physical or alias name) fail.
    pub fn fail_index(&self, index: impl Into<String>) {
        self.state().failing_indices.insert(index.into());
    }

    /// Reject upserts of one document while accepting the rest of the batch.
    pub fn reject_document(&self, object_id: impl Into<String>) {
        self.state().rejected_documents.insert(object_id.into());
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing_operations.clear();
        state.failing_indices.clear();
        state.rejected_documents.clear();
    }

    /// Documents of an index or alias, ordered by `object_id`.
    pub fn documents(&self, index_name: &str) -> Vec<SearchDocument> {
        let state = self.state();
        let physical = state.resolve(index_name);
        state
            .indices
            .get(&physical)
            .map(|index| index.documents.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn document(&self, index_name: &str, object_id: &str) -> Option<SearchDocument> {
        let state = self.state();
        let physical = state.resolve(index_name);
        state
            .indices
            .get(&physical)
            .and_then(|index| index.documents.get(object_id).cloned())
    }

    pub fn index_exists(&self, physical_name: &str) -> bool {
        self.state().indices.contains_key(physical_name)
    }

    /// The schema an index was created with.
    pub fn schema(&self, physical_name: &str) -> Option<IndexSchema> {
        self.state()
            .indices
            .get(physical_name)
            .map(|index| index.schema.clone())
    }

    pub fn alias_target(&self, alias: &str) -> Option<String> {
        self.state().aliases.get(alias).cloned()
    }

    /// Names of all physical indices, sorted.
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state().indices.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every mutating call made so far, in order.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state().calls.clone()
    }
}

#[async_trait]
impl SearchEngine for InMemorySearchEngine {
    async fn create_index(
        &self,
        physical_name: &str,
        schema: &IndexSchema,
    ) -> Result<(), SearchEngineError> {
        let mut state = self.state();
        state.check(EngineOperation::CreateIndex, physical_name)?;
        if state.indices.contains_key(physical_name) || state.aliases.contains_key(physical_name)
        {
            return Err(SearchEngineError::index_creation(format!(
                "Index '{}' already exists",
                physical_name
            )));
        }
        state.indices.insert(
            physical_name.to_string(),
            StoredIndex {
                schema: schema.clone(),
                documents: BTreeMap::new(),
            },
        );
        state
            .calls
            .push(EngineCall::CreateIndex(physical_name.to_string()));
        Ok(())
    }

    async fn delete_index(&self, physical_name: &str) -> Result<(), SearchEngineError> {
        let mut state = self.state();
        state.check(EngineOperation::DeleteIndex, physical_name)?;
        if state.indices.remove(physical_name).is_some() {
            state.aliases.retain(|_, target| target.as_str() != physical_name);
        }
        state
            .calls
            .push(EngineCall::DeleteIndex(physical_name.to_string()));
        Ok(())
    }

    async fn upsert_documents(
        &self,
        index_name: &str,
        documents: &[SearchDocument],
    ) -> Result<BatchOperationSummary, SearchEngineError> {
        let mut state = self.state();
        state.check(EngineOperation::Upsert, index_name)?;
        let physical = state.resolve(index_name);
        state.check(EngineOperation::Upsert, &physical)?;

        let rejected = state.rejected_documents.clone();
        let index = state.indices.entry(physical).or_default();
        let results = documents
            .iter()
            .map(|document| {
                if rejected.contains(&document.object_id) {
                    BatchOperationResult::failed(
                        document.object_id.clone(),
                        SearchEngineError::bulk_index("Document rejected"),
                    )
                } else {
                    index
                        .documents
                        .insert(document.object_id.clone(), document.clone());
                    BatchOperationResult::succeeded(document.object_id.clone())
                }
            })
            .collect();

        state.calls.push(EngineCall::Upsert {
            index: index_name.to_string(),
            object_ids: documents.iter().map(|d| d.object_id.clone()).collect(),
        });
        Ok(BatchOperationSummary::from_results(results))
    }

    async fn delete_documents(
        &self,
        index_name: &str,
        object_ids: &[String],
    ) -> Result<BatchOperationSummary, SearchEngineError> {
        let mut state = self.state();
        state.check(EngineOperation::Delete, index_name)?;
        let physical = state.resolve(index_name);
        state.check(EngineOperation::Delete, &physical)?;

        if let Some(index) = state.indices.get_mut(&physical) {
            for id in object_ids {
                index.documents.remove(id);
            }
        }
        state.calls.push(EngineCall::Delete {
            index: index_name.to_string(),
            object_ids: object_ids.to_vec(),
        });
        Ok(BatchOperationSummary::from_results(
            object_ids
                .iter()
                .map(|id| BatchOperationResult::succeeded(id.clone()))
                .collect(),
        ))
    }

    async fn document_count(&self, index_name: &str) -> Result<u64, SearchEngineError> {
        let state = self.state();
        state.check(EngineOperation::Count, index_name)?;
        let physical = state.resolve(index_name);
        Ok(state
            .indices
            .get(&physical)
            .map(|index| index.documents.len() as u64)
            .unwrap_or(0))
    }

    async fn resolve_alias(&self, alias: &str) -> Result<Option<String>, SearchEngineError> {
        let state = self.state();
        state.check(EngineOperation::ResolveAlias, alias)?;
        Ok(state.aliases.get(alias).cloned())
    }

    async fn is_physical_index(&self, name: &str) -> Result<bool, SearchEngineError> {
        let state = self.state();
        state.check(EngineOperation::ResolveAlias, name)?;
        Ok(state.indices.contains_key(name))
    }

    async fn swap_alias(
        &self,
        alias: &str,
        from: Option<&str>,
        to: &str,
    ) -> Result<(), SearchEngineError> {
        let mut state = self.state();
        state.check(EngineOperation::SwapAlias, alias)?;
        if !state.indices.contains_key(to) {
            return Err(SearchEngineError::index_not_found(to));
        }
        if state.indices.contains_key(alias) {
            return Err(SearchEngineError::alias(format!(
                "'{}' is an index, not an alias",
                alias
            )));
        }
        if let Some(from) = from {
            if state.aliases.get(alias).map(String::as_str) != Some(from) {
                return Err(SearchEngineError::alias(format!(
                    "Alias '{}' does not point at '{}'",
                    alias, from
                )));
            }
        }
        state.aliases.insert(alias.to_string(), to.to_string());
        state.calls.push(EngineCall::SwapAlias {
            alias: alias.to_string(),
            from: from.map(str::to_string),
            to: to.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, name: &str) -> SearchDocument {
        let mut document = SearchDocument::new();
        document.object_id = id.to_string();
        document.name = name.to_string();
        document
    }

    #[tokio::test]
    async fn test_upsert_through_alias() {
        let engine = InMemorySearchEngine::new();
        engine
            .create_index("articles_v1", &IndexSchema::base())
            .await
            .unwrap();
        engine
            .swap_alias("articles", None, "articles_v1")
            .await
            .unwrap();

        let summary = engine
            .upsert_documents("articles", &[doc("a", "First"), doc("b", "Second")])
            .await
            .unwrap();
        assert_eq!(summary.succeeded, 2);

        assert_eq!(engine.documents("articles_v1").len(), 2);
        assert_eq!(engine.document_count("articles").await.unwrap(), 2);
        assert_eq!(engine.document("articles", "a").unwrap().name, "First");
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_object_id() {
        let engine = InMemorySearchEngine::new();
        engine
            .upsert_documents("plain", &[doc("a", "Old")])
            .await
            .unwrap();
        engine
            .upsert_documents("plain", &[doc("a", "New")])
            .await
            .unwrap();

        assert!(engine.index_exists("plain"));
        assert_eq!(engine.documents("plain").len(), 1);
        assert_eq!(engine.document("plain", "a").unwrap().name, "New");
    }

    #[tokio::test]
    async fn test_delete_missing_documents_succeeds() {
        let engine = InMemorySearchEngine::new();
        let summary = engine
            .delete_documents("nowhere", &["x".to_string()])
            .await
            .unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(engine.document_count("nowhere").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_swap_alias_moves_atomically() {
        let engine = InMemorySearchEngine::new();
        let schema = IndexSchema::base();
        engine.create_index("a_v1", &schema).await.unwrap();
        engine.create_index("a_v2", &schema).await.unwrap();
        engine.swap_alias("a", None, "a_v1").await.unwrap();

        let err = engine.swap_alias("a", Some("a_v9"), "a_v2").await;
        assert!(matches!(err, Err(SearchEngineError::AliasError(_))));
        assert_eq!(engine.alias_target("a").as_deref(), Some("a_v1"));

        engine.swap_alias("a", Some("a_v1"), "a_v2").await.unwrap();
        assert_eq!(engine.resolve_alias("a").await.unwrap().as_deref(), Some("a_v2"));
    }

    #[tokio::test]
    async fn test_swap_alias_to_missing_index_fails() {
        let engine = InMemorySearchEngine::new();
        let err = engine.swap_alias("a", None, "a_v1").await;
        assert!(matches!(err, Err(SearchEngineError::IndexNotFound(_))));
        assert_eq!(engine.resolve_alias("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_index_drops_aliases() {
        let engine = InMemorySearchEngine::new();
        engine
            .create_index("a_v1", &IndexSchema::base())
            .await
            .unwrap();
        engine.swap_alias("a", None, "a_v1").await.unwrap();

        engine.delete_index("a_v1").await.unwrap();
        engine.delete_index("a_v1").await.unwrap();

        assert!(!engine.index_exists("a_v1"));
        assert_eq!(engine.alias_target("a"), None);
    }

    #[tokio::test]
    async fn test_create_existing_index_fails() {
        let engine = InMemorySearchEngine::new();
        engine.create_index("x", &IndexSchema::base()).await.unwrap();
        assert!(matches!(
            engine.create_index("x", &IndexSchema::base()).await,
            Err(SearchEngineError::IndexCreationError(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let engine = InMemorySearchEngine::new();
        engine.fail_index("broken");
        engine.reject_document("bad");

        assert!(engine
            .upsert_documents("broken", &[doc("a", "A")])
            .await
            .is_err());

        let summary = engine
            .upsert_documents("ok", &[doc("good", "G"), doc("bad", "B")])
            .await
            .unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);

        engine.fail_operation(EngineOperation::Count);
        assert!(engine.document_count("ok").await.is_err());

        engine.clear_failures();
        assert_eq!(engine.document_count("ok").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let engine = InMemorySearchEngine::new();
        engine
            .delete_documents("x", &["1".to_string()])
            .await
            .unwrap();
        engine.upsert_documents("x", &[doc("1", "One")]).await.unwrap();

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::Delete {
                    index: "x".to_string(),
                    object_ids: vec!["1".to_string()]
                },
                EngineCall::Upsert {
                    index: "x".to_string(),
                    object_ids: vec!["1".to_string()]
                },
            ]
        );
    }
}
