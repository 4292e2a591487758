//! Content item snapshots carried by indexing tasks.
//!
//! The CMS raises change notifications for two kinds of items: web pages,
//! which live in a channel's content tree, and reusable items, which have no
//! tree position and are embedded by pages. Both share the fields in
//! [`ContentItem`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Fields common to every content item snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub item_id: i32,
    pub item_guid: Uuid,
    pub language_name: String,
    pub content_type_name: String,
    #[serde(default)]
    pub content_type_id: i32,
    #[serde(default)]
    pub content_language_id: i32,
    #[serde(default)]
    pub name: String,
    /// Secured items require authentication to view and are never indexed
    /// by the built-in strategy.
    #[serde(default)]
    pub is_secured: bool,
    /// Raw content field values keyed by field name.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl ContentItem {
    /// Create a content item snapshot with no field values.
    pub fn new(
        item_id: i32,
        item_guid: Uuid,
        language_name: impl Into<String>,
        content_type_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            item_id,
            item_guid,
            language_name: language_name.into(),
            content_type_name: content_type_name.into(),
            content_type_id: 0,
            content_language_id: 0,
            name: name.into(),
            is_secured: false,
            fields: Map::new(),
        }
    }

    /// Set a raw field value.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Mark the item as secured.
    pub fn secured(mut self) -> Self {
        self.is_secured = true;
        self
    }
}

/// A page in a channel's content tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebPageItem {
    #[serde(flatten)]
    pub content: ContentItem,
    pub channel_name: String,
    /// Tree path of the page, e.g. `/blog/post-1`.
    pub tree_path: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub parent_id: i32,
}

impl WebPageItem {
    pub fn new(
        content: ContentItem,
        channel_name: impl Into<String>,
        tree_path: impl Into<String>,
    ) -> Self {
        Self {
            content,
            channel_name: channel_name.into(),
            tree_path: tree_path.into(),
            order: 0,
            parent_id: 0,
        }
    }
}

/// A reusable content item (no tree position).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReusableItem {
    #[serde(flatten)]
    pub content: ContentItem,
}

impl ReusableItem {
    pub fn new(content: ContentItem) -> Self {
        Self { content }
    }
}

/// The item an indexing task refers to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemToIndex {
    WebPage(WebPageItem),
    Reusable(ReusableItem),
}

impl ItemToIndex {
    /// The fields shared by both item kinds.
    pub fn content(&self) -> &ContentItem {
        match self {
            ItemToIndex::WebPage(page) => &page.content,
            ItemToIndex::Reusable(item) => &item.content,
        }
    }

    pub fn item_guid(&self) -> Uuid {
        self.content().item_guid
    }

    pub fn language_name(&self) -> &str {
        &self.content().language_name
    }

    pub fn content_type_name(&self) -> &str {
        &self.content().content_type_name
    }

    pub fn is_secured(&self) -> bool {
        self.content().is_secured
    }

    /// Returns the page when this is a web page item.
    pub fn as_web_page(&self) -> Option<&WebPageItem> {
        match self {
            ItemToIndex::WebPage(page) => Some(page),
            ItemToIndex::Reusable(_) => None,
        }
    }

    /// Document identity used when the strategy does not choose one:
    /// `{item_guid}_{language_name}`.
    pub fn default_object_id(&self) -> String {
        crate::SearchDocument::default_object_id(self.item_guid(), self.language_name())
    }
}

impl From<WebPageItem> for ItemToIndex {
    fn from(page: WebPageItem) -> Self {
        ItemToIndex::WebPage(page)
    }
}

impl From<ReusableItem> for ItemToIndex {
    fn from(item: ReusableItem) -> Self {
        ItemToIndex::Reusable(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn article(language: &str) -> ContentItem {
        ContentItem::new(
            7,
            Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
            language,
            "Article",
            "Hello",
        )
    }

    #[test]
    fn test_default_object_id() {
        let item: ItemToIndex = WebPageItem::new(article("en"), "main", "/blog/hello").into();
        assert_eq!(
            item.default_object_id(),
            "550e8400-e29b-41d4-a716-446655440000_en"
        );
    }

    #[test]
    fn test_web_page_deserializes_flat_payload() {
        let payload = json!({
            "kind": "web_page",
            "item_id": 3,
            "item_guid": "6ba7b810-9dad-11d1-80b4-00c04fd430c8",
            "language_name": "en",
            "content_type_name": "Article",
            "name": "Post",
            "is_secured": true,
            "channel_name": "main",
            "tree_path": "/blog/post",
            "fields": { "summary": "text" }
        });

        let item: ItemToIndex = serde_json::from_value(payload).unwrap();
        let page = item.as_web_page().expect("web page");
        assert_eq!(page.tree_path, "/blog/post");
        assert_eq!(page.content.item_id, 3);
        assert!(item.is_secured());
        assert_eq!(item.content().fields["summary"], "text");
    }

    #[test]
    fn test_reusable_has_no_page() {
        let item: ItemToIndex = ReusableItem::new(article("fr")).into();
        assert!(item.as_web_page().is_none());
        assert_eq!(item.language_name(), "fr");
    }
}
