//! Indexing tasks as they travel through the in-process queue.

use serde::{Deserialize, Serialize};

use crate::types::content_item::ItemToIndex;

/// What a queued task asks the processor to do.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Never processed; the queue drops it on enqueue.
    #[default]
    Unknown,
    /// Map the item and upsert it (or delete it if it no longer qualifies).
    Update,
    /// Remove the item's document.
    Delete,
    /// Same as `Update`, but written to the shadow index of a rebuild.
    RebuildItem,
    /// Terminates a rebuild: swap the alias to the shadow index.
    RebuildEnd,
}

/// Bookkeeping for one zero-downtime rebuild.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RebuildState {
    pub logical_index_name: String,
    /// Physical index the alias pointed at when the rebuild started; `None`
    /// on the first build.
    pub old_physical_index_name: Option<String>,
    pub new_physical_index_name: String,
}

impl RebuildState {
    /// The old physical index, treating an empty name as absent.
    pub fn old_physical(&self) -> Option<&str> {
        self.old_physical_index_name
            .as_deref()
            .filter(|name| !name.is_empty())
    }
}

/// One unit of indexing work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueItem {
    pub task_type: TaskType,
    /// Logical index the task belongs to.
    pub index_name: String,
    /// Required for every task type except `RebuildEnd`.
    pub item: Option<ItemToIndex>,
    /// Physical index to write to instead of the logical alias.
    pub target_index: Option<String>,
    /// Present only on `RebuildEnd`.
    pub rebuild: Option<RebuildState>,
}

impl QueueItem {
    pub fn update(item: ItemToIndex, index_name: impl Into<String>) -> Self {
        Self::with_item(TaskType::Update, item, index_name)
    }

    pub fn delete(item: ItemToIndex, index_name: impl Into<String>) -> Self {
        Self::with_item(TaskType::Delete, item, index_name)
    }

    /// Backfill task targeting the shadow index `physical_index`.
    pub fn rebuild_item(
        item: ItemToIndex,
        index_name: impl Into<String>,
        physical_index: impl Into<String>,
    ) -> Self {
        Self {
            target_index: Some(physical_index.into()),
            ..Self::with_item(TaskType::RebuildItem, item, index_name)
        }
    }

    pub fn rebuild_end(state: RebuildState) -> Self {
        Self {
            task_type: TaskType::RebuildEnd,
            index_name: state.logical_index_name.clone(),
            item: None,
            target_index: None,
            rebuild: Some(state),
        }
    }

    fn with_item(task_type: TaskType, item: ItemToIndex, index_name: impl Into<String>) -> Self {
        Self {
            task_type,
            index_name: index_name.into(),
            item: Some(item),
            target_index: None,
            rebuild: None,
        }
    }

    /// `Update` and `RebuildItem` both map the item.
    pub fn is_update(&self) -> bool {
        matches!(self.task_type, TaskType::Update | TaskType::RebuildItem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::content_item::{ContentItem, ReusableItem};
    use uuid::Uuid;

    fn item() -> ItemToIndex {
        ReusableItem::new(ContentItem::new(1, Uuid::new_v4(), "en", "Banner", "B")).into()
    }

    #[test]
    fn test_rebuild_item_targets_physical_index() {
        let task = QueueItem::rebuild_item(item(), "Articles", "articles_v2");
        assert_eq!(task.task_type, TaskType::RebuildItem);
        assert_eq!(task.index_name, "Articles");
        assert_eq!(task.target_index.as_deref(), Some("articles_v2"));
        assert!(task.is_update());
    }

    #[test]
    fn test_rebuild_end_carries_state() {
        let task = QueueItem::rebuild_end(RebuildState {
            logical_index_name: "Articles".to_string(),
            old_physical_index_name: Some(String::new()),
            new_physical_index_name: "articles_v2".to_string(),
        });
        assert_eq!(task.index_name, "Articles");
        assert!(task.item.is_none());
        assert_eq!(task.rebuild.unwrap().old_physical(), None);
    }

    #[test]
    fn test_default_task_type_is_unknown() {
        assert_eq!(TaskType::default(), TaskType::Unknown);
        assert!(!QueueItem::delete(item(), "x").is_update());
    }
}
