//! Task logger.
//!
//! Turns content events into indexing tasks for every registered index the
//! changed item affects, using each index's strategy to fan out to related
//! items.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use content_indexer_shared::{ItemToIndex, QueueItem, ReusableItem, WebPageItem};

use crate::consumer::{ContentEvent, ContentEventKind};
use crate::errors::IndexerError;
use crate::queue::TaskQueue;
use crate::registry::{IndexRegistry, RegisteredIndex};

/// Creates queue tasks from content events.
pub struct TaskLogger {
    registry: Arc<IndexRegistry>,
    queue: Arc<TaskQueue>,
}

impl TaskLogger {
    pub fn new(registry: Arc<IndexRegistry>, queue: Arc<TaskQueue>) -> Self {
        Self { registry, queue }
    }

    /// Enqueue the tasks for one event. Returns how many were queued.
    ///
    /// A strategy that fails to list related items is logged and skipped;
    /// other indices still get their tasks.
    #[instrument(skip(self, event), fields(event = ?event.kind, item_guid = %event.item.item_guid()))]
    pub async fn log_event(&self, event: &ContentEvent) -> Result<usize, IndexerError> {
        let mut queued = 0;
        for entry in self.registry.indices() {
            let tasks = match &event.item {
                ItemToIndex::WebPage(page) => Self::page_tasks(&entry, event, page).await,
                ItemToIndex::Reusable(item) => Self::reusable_tasks(&entry, event, item).await,
            };
            match tasks {
                Ok(tasks) => queued += self.queue.enqueue_all(tasks)?,
                Err(e) => warn!(
                    index = %entry.name(),
                    error = %e,
                    "Failed to find items to reindex"
                ),
            }
        }
        debug!(queued = queued, "Logged content event");
        Ok(queued)
    }

    /// Enqueue the tasks for several events, in order.
    pub async fn log_events(&self, events: &[ContentEvent]) -> Result<usize, IndexerError> {
        let mut queued = 0;
        for event in events {
            queued += self.log_event(event).await?;
        }
        Ok(queued)
    }

    async fn page_tasks(
        entry: &RegisteredIndex,
        event: &ContentEvent,
        page: &WebPageItem,
    ) -> Result<Vec<QueueItem>, IndexerError> {
        let definition = &entry.definition;
        if !definition.channel_name.eq_ignore_ascii_case(&page.channel_name)
            || !definition.supports_language(&page.content.language_name)
        {
            return Ok(Vec::new());
        }

        let included = definition.includes_web_page(page);
        // A moved page may have left the included paths; its update then
        // maps to a removal.
        if !included && event.kind != ContentEventKind::Moved {
            return Ok(Vec::new());
        }

        let related = entry.strategy.find_items_to_reindex_web_page(page).await?;
        let mut tasks = Vec::with_capacity(related.len() + 1);
        if event.kind.is_removal() {
            let changed = ItemToIndex::WebPage(page.clone());
            tasks.push(QueueItem::delete(changed.clone(), entry.name()));
            tasks.extend(
                related
                    .into_iter()
                    .filter(|item| !same_item(item, &changed))
                    .map(|item| QueueItem::update(item, entry.name())),
            );
        } else {
            tasks.extend(related.into_iter().map(|item| QueueItem::update(item, entry.name())));
        }
        Ok(tasks)
    }

    async fn reusable_tasks(
        entry: &RegisteredIndex,
        event: &ContentEvent,
        item: &ReusableItem,
    ) -> Result<Vec<QueueItem>, IndexerError> {
        let definition = &entry.definition;
        if !definition.supports_language(&item.content.language_name) {
            return Ok(Vec::new());
        }

        let mut tasks = Vec::new();
        if definition.includes_reusable(&item.content) {
            let changed = ItemToIndex::Reusable(item.clone());
            tasks.push(if event.kind.is_removal() {
                QueueItem::delete(changed, entry.name())
            } else {
                QueueItem::update(changed, entry.name())
            });
        }

        // Pages embedding the item are reindexed either way.
        let related = entry.strategy.find_items_to_reindex_reusable(item).await?;
        tasks.extend(related.into_iter().map(|item| QueueItem::update(item, entry.name())));
        Ok(tasks)
    }
}

fn same_item(a: &ItemToIndex, b: &ItemToIndex) -> bool {
    a.item_guid() == b.item_guid() && a.language_name().eq_ignore_ascii_case(b.language_name())
}
