//! In-memory content store.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use content_indexer_shared::{IndexDefinition, ItemToIndex};

use crate::content::{ContentSource, UrlResolver};
use crate::errors::IndexerError;

#[derive(Debug, Default)]
struct ContentState {
    items: Vec<ItemToIndex>,
    fail_queries: bool,
    fail_urls: bool,
}

/// Content source and URL resolver over a fixed set of items.
///
/// Page URLs are `/{language}{tree_path}`.
#[derive(Debug, Default)]
pub struct InMemoryContent {
    state: Mutex<ContentState>,
}

impl InMemoryContent {
    pub fn new(items: Vec<ItemToIndex>) -> Self {
        Self {
            state: Mutex::new(ContentState {
                items,
                ..ContentState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ContentState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_item(&self, item: impl Into<ItemToIndex>) {
        self.state().items.push(item.into());
    }

    /// Replace every item.
    pub fn set_items(&self, items: Vec<ItemToIndex>) {
        self.state().items = items;
    }

    pub fn fail_queries(&self, fail: bool) {
        self.state().fail_queries = fail;
    }

    pub fn fail_urls(&self, fail: bool) {
        self.state().fail_urls = fail;
    }
}

#[async_trait]
impl ContentSource for InMemoryContent {
    async fn query_items(
        &self,
        definition: &IndexDefinition,
    ) -> Result<Vec<ItemToIndex>, IndexerError> {
        let state = self.state();
        if state.fail_queries {
            return Err(IndexerError::content("Content store unavailable"));
        }
        Ok(state
            .items
            .iter()
            .filter(|item| definition.includes(item))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UrlResolver for InMemoryContent {
    async fn resolve_url(
        &self,
        tree_path: &str,
        _channel_name: &str,
        language_name: &str,
    ) -> Result<String, IndexerError> {
        if self.state().fail_urls {
            return Err(IndexerError::content("URL resolution unavailable"));
        }
        Ok(format!("/{}{}", language_name, tree_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_indexer_shared::{ContentItem, IncludedPath, WebPageItem};
    use uuid::Uuid;

    fn page(language: &str, tree_path: &str) -> WebPageItem {
        WebPageItem::new(
            ContentItem::new(1, Uuid::new_v4(), language, "Article", "P"),
            "main",
            tree_path,
        )
    }

    #[tokio::test]
    async fn test_query_applies_definition() {
        let content = InMemoryContent::new(vec![
            page("en", "/blog/a").into(),
            page("fr", "/blog/b").into(),
            page("en", "/news/c").into(),
        ]);
        let definition = IndexDefinition::new(1, "Blog", "main")
            .with_languages(["en"])
            .with_path(IncludedPath::new("/blog/%"));

        let items = content.query_items(&definition).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_web_page().unwrap().tree_path, "/blog/a");

        content.fail_queries(true);
        assert!(content.query_items(&definition).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_url() {
        let content = InMemoryContent::default();
        assert_eq!(
            content.resolve_url("/blog/a", "main", "en").await.unwrap(),
            "/en/blog/a"
        );
        content.fail_urls(true);
        assert!(content.resolve_url("/blog/a", "main", "en").await.is_err());
    }
}
