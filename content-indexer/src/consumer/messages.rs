//! Message types for the consumer.
//!
//! Defines the content events that flow from Kafka into the task logger.

use serde::{Deserialize, Serialize};

use content_indexer_shared::ItemToIndex;

/// What happened to a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentEventKind {
    Created,
    Updated,
    Published,
    /// A page moved to another tree path.
    Moved,
    Unpublished,
    Deleted,
}

impl ContentEventKind {
    /// Whether the item is gone from the live site after this event.
    pub fn is_removal(self) -> bool {
        matches!(self, Self::Unpublished | Self::Deleted)
    }
}

/// A content change received from Kafka.
///
/// On the wire:
///
/// ```json
/// {"event": "updated", "item": {"kind": "web_page", "item_guid": "...", ...}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEvent {
    #[serde(rename = "event")]
    pub kind: ContentEventKind,
    /// Snapshot of the item after the change (before it, for deletions).
    pub item: ItemToIndex,
}

impl ContentEvent {
    pub fn new(kind: ContentEventKind, item: impl Into<ItemToIndex>) -> Self {
        Self {
            kind,
            item: item.into(),
        }
    }

    pub fn updated(item: impl Into<ItemToIndex>) -> Self {
        Self::new(ContentEventKind::Updated, item)
    }

    pub fn deleted(item: impl Into<ItemToIndex>) -> Self {
        Self::new(ContentEventKind::Deleted, item)
    }
}

/// Messages that flow between the consumer and the orchestrator.
#[derive(Debug)]
pub enum StreamMessage {
    /// A batch of content events with associated offsets for acknowledgment.
    Events {
        events: Vec<ContentEvent>,
        offsets: Vec<(String, i32, i64)>,
    },
    /// Acknowledgment that events were turned into queued tasks.
    Acknowledgment {
        offsets: Vec<(String, i32, i64)>,
        success: bool,
        error: Option<String>,
    },
    /// Stream has ended.
    End,
    /// An error occurred.
    Error(String),
}
