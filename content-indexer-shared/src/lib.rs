//! # Content Indexer Shared
//!
//! This crate defines the data structures shared across the content indexer
//! ecosystem: index definitions, content item snapshots, queued indexing
//! tasks, search documents, and the schema descriptor strategies declare.

pub mod types;

pub use types::content_item::{ContentItem, ItemToIndex, ReusableItem, WebPageItem};
pub use types::index_definition::{IncludedPath, IndexDefinition, DEFAULT_STRATEGY_KEY};
pub use types::queue_item::{QueueItem, RebuildState, TaskType};
pub use types::schema::{FieldKind, IndexSchema, SchemaField};
pub use types::search_document::SearchDocument;
