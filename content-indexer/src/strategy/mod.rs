//! Indexing strategies.
//!
//! A strategy decides how content items of one index become search
//! documents, which related items must be reindexed when something changes,
//! and which fields the physical index declares. Strategies are looked up by
//! the `strategy_key` of an index definition.

mod default_strategy;

pub use default_strategy::DefaultStrategy;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use content_indexer_shared::{
    IndexDefinition, IndexSchema, ItemToIndex, ReusableItem, SearchDocument, WebPageItem,
    DEFAULT_STRATEGY_KEY,
};

use crate::errors::IndexerError;

/// Per-index mapping logic.
#[async_trait]
pub trait IndexingStrategy: Send + Sync {
    /// Map an item to a document, or `None` if it must not be in the index.
    ///
    /// `None` for an item that was indexed before removes its document.
    /// Base fields left empty are filled in by the task processor.
    async fn map_or_none(&self, item: &ItemToIndex)
        -> Result<Option<SearchDocument>, IndexerError>;

    /// Items to reindex after a web page changed. Defaults to the page itself.
    async fn find_items_to_reindex_web_page(
        &self,
        changed: &WebPageItem,
    ) -> Result<Vec<ItemToIndex>, IndexerError> {
        Ok(vec![ItemToIndex::WebPage(changed.clone())])
    }

    /// Items to reindex after a reusable item changed, typically the pages
    /// that embed it. Defaults to none.
    async fn find_items_to_reindex_reusable(
        &self,
        _changed: &ReusableItem,
    ) -> Result<Vec<ItemToIndex>, IndexerError> {
        Ok(Vec::new())
    }

    /// Fields of the physical index, read once when it is created.
    fn declare_schema(&self) -> IndexSchema;
}

/// Builds the strategy instance bound to one index.
pub type StrategyFactory =
    Arc<dyn Fn(&IndexDefinition) -> Arc<dyn IndexingStrategy> + Send + Sync>;

/// Table of strategy factories keyed by `strategy_key`.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    factories: HashMap<String, StrategyFactory>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

impl StrategyRegistry {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding the built-in `"default"` strategy.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_STRATEGY_KEY, |definition| {
            Arc::new(DefaultStrategy::new(definition.clone()))
        });
        registry
    }

    /// Register a factory, replacing any earlier one with the same key.
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F)
    where
        F: Fn(&IndexDefinition) -> Arc<dyn IndexingStrategy> + Send + Sync + 'static,
    {
        self.factories.insert(key.into(), Arc::new(factory));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Build the strategy for `definition`.
    pub fn build(
        &self,
        definition: &IndexDefinition,
    ) -> Result<Arc<dyn IndexingStrategy>, IndexerError> {
        self.factories
            .get(&definition.strategy_key)
            .map(|factory| factory(definition))
            .ok_or_else(|| IndexerError::unknown_strategy(definition.strategy_key.clone()))
    }
}
