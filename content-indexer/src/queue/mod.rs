//! In-process indexing task queue.
//!
//! Many producers enqueue; the single queue worker takes batches from the
//! front. The lock is only held for the push or the pop itself.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use content_indexer_shared::{QueueItem, TaskType};

use crate::errors::IndexerError;
use crate::registry::IndexRegistry;

/// FIFO queue of indexing tasks.
pub struct TaskQueue {
    registry: Arc<IndexRegistry>,
    items: Mutex<VecDeque<QueueItem>>,
}

impl TaskQueue {
    pub fn new(registry: Arc<IndexRegistry>) -> Self {
        Self {
            registry,
            items: Mutex::new(VecDeque::new()),
        }
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<QueueItem>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a task to the back of the queue.
    ///
    /// Tasks with an `Unknown` type, an empty index name, no item (except
    /// `RebuildEnd`), or a `RebuildEnd` without rebuild state are dropped.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The task was queued
    /// * `Ok(false)` - The task was dropped
    /// * `Err(IndexerError::NotRegistered)` - The index name is not registered
    pub fn enqueue(&self, item: QueueItem) -> Result<bool, IndexerError> {
        if item.task_type == TaskType::Unknown {
            warn!(index = %item.index_name, "Dropping task with unknown type");
            return Ok(false);
        }
        if item.index_name.trim().is_empty() {
            warn!(task_type = ?item.task_type, "Dropping task without index name");
            return Ok(false);
        }
        match item.task_type {
            TaskType::RebuildEnd if item.rebuild.is_none() => {
                warn!(index = %item.index_name, "Dropping rebuild end without rebuild state");
                return Ok(false);
            }
            TaskType::RebuildEnd => {}
            _ if item.item.is_none() => {
                warn!(index = %item.index_name, task_type = ?item.task_type, "Dropping task without item");
                return Ok(false);
            }
            _ => {}
        }
        if !self.registry.is_registered(&item.index_name) {
            return Err(IndexerError::not_registered(item.index_name));
        }

        debug!(index = %item.index_name, task_type = ?item.task_type, "Enqueued task");
        self.items().push_back(item);
        Ok(true)
    }

    /// Enqueue several tasks, stopping at the first configuration error.
    ///
    /// Returns how many tasks were queued.
    pub fn enqueue_all(
        &self,
        items: impl IntoIterator<Item = QueueItem>,
    ) -> Result<usize, IndexerError> {
        let mut queued = 0;
        for item in items {
            if self.enqueue(item)? {
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// Remove up to `max` tasks from the front.
    pub fn take_batch(&self, max: usize) -> Vec<QueueItem> {
        let mut items = self.items();
        let count = max.min(items.len());
        items.drain(..count).collect()
    }

    /// Put tasks back at the front, keeping their order.
    pub fn requeue_front(&self, deferred: Vec<QueueItem>) {
        let mut items = self.items();
        for item in deferred.into_iter().rev() {
            items.push_front(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyRegistry;
    use content_indexer_shared::{
        ContentItem, IndexDefinition, ItemToIndex, RebuildState, ReusableItem,
    };
    use uuid::Uuid;

    fn queue() -> TaskQueue {
        let registry = Arc::new(IndexRegistry::new(Arc::new(StrategyRegistry::with_defaults())));
        registry
            .add_index(IndexDefinition::new(1, "Articles", "main").with_languages(["en"]))
            .unwrap();
        TaskQueue::new(registry)
    }

    fn item(name: &str) -> ItemToIndex {
        ReusableItem::new(ContentItem::new(1, Uuid::new_v4(), "en", "Author", name)).into()
    }

    #[test]
    fn test_enqueue_unregistered_fails() {
        let queue = queue();
        let result = queue.enqueue(QueueItem::update(item("a"), "Missing"));
        assert!(matches!(result, Err(IndexerError::NotRegistered(_))));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_noops() {
        let queue = queue();

        let mut unknown = QueueItem::update(item("a"), "Articles");
        unknown.task_type = TaskType::Unknown;
        assert!(!queue.enqueue(unknown).unwrap());

        let mut without_item = QueueItem::update(item("a"), "Articles");
        without_item.item = None;
        assert!(!queue.enqueue(without_item).unwrap());

        assert!(!queue.enqueue(QueueItem::update(item("a"), "")).unwrap());

        let mut end = QueueItem::rebuild_end(RebuildState {
            logical_index_name: "Articles".to_string(),
            old_physical_index_name: None,
            new_physical_index_name: "articles_v1".to_string(),
        });
        end.rebuild = None;
        assert!(!queue.enqueue(end).unwrap());

        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_is_case_insensitive() {
        let queue = queue();
        assert!(queue.enqueue(QueueItem::update(item("a"), "articles")).unwrap());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_take_batch_and_requeue_keep_order() {
        let queue = queue();
        let names = ["a", "b", "c", "d"];
        queue
            .enqueue_all(names.iter().map(|n| QueueItem::update(item(n), "Articles")))
            .unwrap();

        let batch = queue.take_batch(3);
        assert_eq!(batch.len(), 3);
        assert_eq!(queue.len(), 1);

        queue.requeue_front(batch);
        let all = queue.take_batch(10);
        let order: Vec<String> = all
            .iter()
            .map(|t| t.item.as_ref().unwrap().content().name.clone())
            .collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }
}
