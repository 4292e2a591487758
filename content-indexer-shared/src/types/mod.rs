//! This module defines the core data structures used across the content indexer.

pub mod content_item;
pub mod index_definition;
pub mod queue_item;
pub mod schema;
pub mod search_document;

pub use content_item::{ContentItem, ItemToIndex, ReusableItem, WebPageItem};
pub use index_definition::{IncludedPath, IndexDefinition};
pub use queue_item::{QueueItem, RebuildState, TaskType};
pub use schema::{FieldKind, IndexSchema, SchemaField};
pub use search_document::SearchDocument;
