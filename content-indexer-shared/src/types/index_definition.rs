//! Index definitions as loaded from the configuration store.

use serde::{Deserialize, Serialize};

use crate::types::content_item::{ContentItem, ItemToIndex, WebPageItem};

/// Strategy binding used when a definition does not name one.
pub const DEFAULT_STRATEGY_KEY: &str = "default";

/// Suffix marking a path pattern as "this subtree".
const SUBTREE_WILDCARD: &str = "/%";

fn default_strategy_key() -> String {
    DEFAULT_STRATEGY_KEY.to_string()
}

/// A content tree path included in an index, optionally restricted to a set
/// of content types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncludedPath {
    /// Exact tree path, or a subtree pattern ending in `/%`.
    pub path_pattern: String,
    /// Content types indexed under this path. Empty means any type.
    #[serde(default)]
    pub content_types: Vec<String>,
}

impl IncludedPath {
    pub fn new(path_pattern: impl Into<String>) -> Self {
        Self {
            path_pattern: path_pattern.into(),
            content_types: Vec::new(),
        }
    }

    /// Restrict the path to the given content types.
    pub fn with_content_types<I, S>(mut self, content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content_types = content_types.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `tree_path` falls under this pattern.
    ///
    /// `/blog/%` matches `/blog` and everything below it; `/blog` matches only
    /// `/blog`.
    pub fn matches_path(&self, tree_path: &str) -> bool {
        match self.path_pattern.strip_suffix(SUBTREE_WILDCARD) {
            Some(parent) => {
                (!parent.is_empty() && tree_path == parent)
                    || tree_path
                        .strip_prefix(parent)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            None => tree_path == self.path_pattern,
        }
    }

    pub fn allows_content_type(&self, content_type_name: &str) -> bool {
        self.content_types.is_empty()
            || self
                .content_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(content_type_name))
    }
}

/// Configuration of one logical search index.
///
/// Definitions are immutable once loaded; an admin edit replaces the whole
/// registry rather than mutating a definition in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Numeric key, stable across edits.
    pub identifier: i32,
    /// Logical name, unique case-insensitively.
    pub index_name: String,
    /// Channel the index draws pages from.
    pub channel_name: String,
    pub languages: Vec<String>,
    #[serde(default)]
    pub included_paths: Vec<IncludedPath>,
    #[serde(default)]
    pub included_reusable_content_types: Vec<String>,
    #[serde(default = "default_strategy_key")]
    pub strategy_key: String,
}

impl IndexDefinition {
    /// Create a definition bound to the default strategy, with no languages
    /// or paths yet.
    pub fn new(
        identifier: i32,
        index_name: impl Into<String>,
        channel_name: impl Into<String>,
    ) -> Self {
        Self {
            identifier,
            index_name: index_name.into(),
            channel_name: channel_name.into(),
            languages: Vec::new(),
            included_paths: Vec::new(),
            included_reusable_content_types: Vec::new(),
            strategy_key: default_strategy_key(),
        }
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_path(mut self, path: IncludedPath) -> Self {
        self.included_paths.push(path);
        self
    }

    pub fn with_reusable_content_types<I, S>(mut self, content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.included_reusable_content_types =
            content_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_strategy(mut self, strategy_key: impl Into<String>) -> Self {
        self.strategy_key = strategy_key.into();
        self
    }

    /// Case-insensitive comparison against the logical name.
    pub fn has_name(&self, name: &str) -> bool {
        self.index_name.eq_ignore_ascii_case(name)
    }

    pub fn supports_language(&self, language_name: &str) -> bool {
        self.languages
            .iter()
            .any(|l| l.eq_ignore_ascii_case(language_name))
    }

    /// Whether a page belongs to this index: same channel, supported language,
    /// and at least one included path that matches both its tree path and
    /// its content type.
    pub fn includes_web_page(&self, page: &WebPageItem) -> bool {
        self.channel_name.eq_ignore_ascii_case(&page.channel_name)
            && self.supports_language(&page.content.language_name)
            && self.included_paths.iter().any(|path| {
                path.matches_path(&page.tree_path)
                    && path.allows_content_type(&page.content.content_type_name)
            })
    }

    /// Whether a reusable item is indexed on its own by this index.
    pub fn includes_reusable(&self, item: &ContentItem) -> bool {
        self.supports_language(&item.language_name)
            && self
                .included_reusable_content_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(&item.content_type_name))
    }

    pub fn includes(&self, item: &ItemToIndex) -> bool {
        match item {
            ItemToIndex::WebPage(page) => self.includes_web_page(page),
            ItemToIndex::Reusable(reusable) => self.includes_reusable(&reusable.content),
        }
    }

    /// Every content type named by an included path.
    pub fn page_content_types(&self) -> impl Iterator<Item = &str> {
        self.included_paths
            .iter()
            .flat_map(|p| p.content_types.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::content_item::ReusableItem;
    use uuid::Uuid;

    fn page(language: &str, content_type: &str, channel: &str, tree_path: &str) -> WebPageItem {
        WebPageItem::new(
            ContentItem::new(1, Uuid::new_v4(), language, content_type, "Page"),
            channel,
            tree_path,
        )
    }

    fn article_index() -> IndexDefinition {
        IndexDefinition::new(1, "Articles", "main")
            .with_languages(["en"])
            .with_path(IncludedPath::new("/%").with_content_types(["Article"]))
    }

    #[test]
    fn test_wildcard_path_matches_subtree_and_parent() {
        let path = IncludedPath::new("/blog/%");
        assert!(path.matches_path("/blog/post-1"));
        assert!(path.matches_path("/blog/2024/post-2"));
        assert!(path.matches_path("/blog"));
        assert!(!path.matches_path("/news"));
        assert!(!path.matches_path("/blogger"));
    }

    #[test]
    fn test_exact_path_matches_only_itself() {
        let path = IncludedPath::new("/blog");
        assert!(path.matches_path("/blog"));
        assert!(!path.matches_path("/blog/post-1"));
        assert!(!path.matches_path("/news"));
    }

    #[test]
    fn test_root_wildcard_matches_everything() {
        let path = IncludedPath::new("/%");
        assert!(path.matches_path("/"));
        assert!(path.matches_path("/anything/below"));
    }

    #[test]
    fn test_includes_web_page_filters() {
        let index = article_index();
        assert!(index.includes_web_page(&page("en", "Article", "main", "/blog/a")));
        assert!(index.includes_web_page(&page("EN", "article", "Main", "/a")));
        assert!(!index.includes_web_page(&page("fr", "Article", "main", "/blog/a")));
        assert!(!index.includes_web_page(&page("en", "Product", "main", "/blog/a")));
        assert!(!index.includes_web_page(&page("en", "Article", "other", "/blog/a")));
    }

    #[test]
    fn test_includes_reusable() {
        let index = article_index().with_reusable_content_types(["Banner"]);
        let banner = ContentItem::new(2, Uuid::new_v4(), "en", "Banner", "Promo");
        let author = ContentItem::new(3, Uuid::new_v4(), "en", "Author", "Ann");
        assert!(index.includes(&ReusableItem::new(banner.clone()).into()));
        assert!(!index.includes(&ReusableItem::new(author).into()));

        let mut french = banner;
        french.language_name = "fr".to_string();
        assert!(!index.includes_reusable(&french));
    }

    #[test]
    fn test_deserialize_defaults_strategy() {
        let json = r#"{
            "identifier": 4,
            "index_name": "Docs",
            "channel_name": "main",
            "languages": ["en"]
        }"#;
        let def: IndexDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.strategy_key, DEFAULT_STRATEGY_KEY);
        assert!(def.included_paths.is_empty());
        assert!(def.has_name("docs"));
    }
}
