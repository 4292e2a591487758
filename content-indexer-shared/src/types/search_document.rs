//! Search document types for the search index.
//!
//! This module defines the document structure that is written to the search
//! engine. Every document carries the base fields below; strategies add their
//! own typed fields, which are flattened into the same JSON object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::types::content_item::{ContentItem, ItemToIndex};

/// Document representation for the search index.
///
/// # Identity
///
/// Two documents with the same `object_id` in the same physical index are the
/// same logical document. Strategies may choose the identity; when they leave
/// it empty the task processor uses `{item_guid}_{language_name}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchDocument {
    #[serde(default)]
    pub object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_guid: Option<Uuid>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content_type_name: String,
    #[serde(default)]
    pub language_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<DateTime<Utc>>,
    /// Strategy-defined fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SearchDocument {
    pub const OBJECT_ID: &'static str = "object_id";
    pub const ITEM_GUID: &'static str = "item_guid";
    pub const URL: &'static str = "url";
    pub const CONTENT_TYPE_NAME: &'static str = "content_type_name";
    pub const LANGUAGE_NAME: &'static str = "language_name";
    pub const NAME: &'static str = "name";
    pub const INDEXED_AT: &'static str = "indexed_at";

    /// Create an empty document; base fields are filled later.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity used when the strategy does not choose one.
    pub fn default_object_id(item_guid: Uuid, language_name: &str) -> String {
        format!("{}_{}", item_guid, language_name)
    }

    /// Add a strategy-defined field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Fill every base field the strategy left empty from the item snapshot.
    ///
    /// `url` is not touched here; it needs the URL resolver.
    pub fn fill_base_fields(&mut self, item: &ItemToIndex) {
        let content: &ContentItem = item.content();
        if self.item_guid.is_none() {
            self.item_guid = Some(content.item_guid);
        }
        if self.object_id.is_empty() {
            self.object_id = item.default_object_id();
        }
        if self.content_type_name.is_empty() {
            self.content_type_name = content.content_type_name.clone();
        }
        if self.language_name.is_empty() {
            self.language_name = content.language_name.clone();
        }
        if self.name.is_empty() {
            self.name = content.name.clone();
        }
    }

    /// Serialize into the JSON object sent to the engine.
    pub fn to_source(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::content_item::WebPageItem;
    use serde_json::json;

    fn item() -> ItemToIndex {
        let content = ContentItem::new(
            1,
            Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
            "en",
            "Article",
            "First post",
        );
        WebPageItem::new(content, "main", "/blog/first").into()
    }

    #[test]
    fn test_fill_base_fields_defaults() {
        let mut doc = SearchDocument::new().with_field("summary", "short");
        doc.fill_base_fields(&item());

        assert_eq!(doc.object_id, "550e8400-e29b-41d4-a716-446655440000_en");
        assert_eq!(doc.content_type_name, "Article");
        assert_eq!(doc.language_name, "en");
        assert_eq!(doc.name, "First post");
        assert!(doc.url.is_empty());
    }

    #[test]
    fn test_fill_base_fields_keeps_strategy_values() {
        let mut doc = SearchDocument {
            object_id: "custom".to_string(),
            name: "Chosen".to_string(),
            ..Default::default()
        };
        doc.fill_base_fields(&item());

        assert_eq!(doc.object_id, "custom");
        assert_eq!(doc.name, "Chosen");
        assert_eq!(doc.language_name, "en");
    }

    #[test]
    fn test_fields_are_flattened() {
        let mut doc = SearchDocument::new()
            .with_field("rating", 4)
            .with_field("tags", json!(["a", "b"]));
        doc.fill_base_fields(&item());

        let source = doc.to_source().unwrap();
        assert_eq!(source["rating"], 4);
        assert_eq!(source["tags"][1], "b");
        assert_eq!(source["object_id"], "550e8400-e29b-41d4-a716-446655440000_en");
        assert!(source.get("fields").is_none());
    }
}
