//! The built-in `"default"` strategy.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use content_indexer_shared::{IndexDefinition, IndexSchema, ItemToIndex, SearchDocument};

use crate::errors::IndexerError;
use crate::strategy::IndexingStrategy;

/// Keyword field holding the channel of a web page.
pub const CHANNEL_NAME: &str = "channel_name";

/// Keyword field holding the tree path of a web page.
pub const TREE_PATH: &str = "tree_path";

/// Indexes the item name and its scalar content fields.
///
/// Secured items and items the index definition does not include (wrong
/// channel, language, path, or content type) map to `None`. Arrays and
/// objects in the content fields are not indexed, and content fields never
/// override a base field.
#[derive(Debug, Clone)]
pub struct DefaultStrategy {
    definition: IndexDefinition,
}

impl DefaultStrategy {
    pub fn new(definition: IndexDefinition) -> Self {
        Self { definition }
    }

    fn is_base_field(key: &str) -> bool {
        matches!(
            key,
            SearchDocument::OBJECT_ID
                | SearchDocument::ITEM_GUID
                | SearchDocument::URL
                | SearchDocument::CONTENT_TYPE_NAME
                | SearchDocument::LANGUAGE_NAME
                | SearchDocument::NAME
                | SearchDocument::INDEXED_AT
                | CHANNEL_NAME
                | TREE_PATH
        )
    }
}

#[async_trait]
impl IndexingStrategy for DefaultStrategy {
    async fn map_or_none(
        &self,
        item: &ItemToIndex,
    ) -> Result<Option<SearchDocument>, IndexerError> {
        if item.is_secured() {
            debug!(item_guid = %item.item_guid(), "Secured item is not indexed");
            return Ok(None);
        }
        if !self.definition.includes(item) {
            debug!(
                item_guid = %item.item_guid(),
                content_type = %item.content_type_name(),
                index = %self.definition.index_name,
                "Item is outside the index definition"
            );
            return Ok(None);
        }

        let content = item.content();
        let mut document = SearchDocument::new();
        document.name = content.name.clone();

        for (key, value) in &content.fields {
            if key.is_empty() {
                return Err(IndexerError::mapping(format!(
                    "Item {} has a field with an empty name",
                    content.item_guid
                )));
            }
            let is_scalar = matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_));
            if is_scalar && !Self::is_base_field(key) {
                document.set_field(key.clone(), value.clone());
            }
        }

        if let Some(page) = item.as_web_page() {
            document.set_field(CHANNEL_NAME, page.channel_name.clone());
            document.set_field(TREE_PATH, page.tree_path.clone());
        }

        Ok(Some(document))
    }

    fn declare_schema(&self) -> IndexSchema {
        IndexSchema::base().keyword(CHANNEL_NAME).keyword(TREE_PATH)
    }
}
