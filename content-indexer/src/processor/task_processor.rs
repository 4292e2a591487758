//! Batch task processor.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use content_indexer_repository::{BatchOperationSummary, SearchEngine};
use content_indexer_shared::{ItemToIndex, QueueItem, SearchDocument, TaskType};

use crate::content::UrlResolver;
use crate::errors::IndexerError;
use crate::rebuild::RebuildCoordinator;
use crate::registry::{IndexRegistry, RegisteredIndex};

/// Configuration for the task processor.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Upper bound on index groups written at the same time.
    pub max_concurrent_groups: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_groups: 4,
        }
    }
}

/// Result of processing one batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Engine operations (document writes, deletes, alias swaps) that succeeded.
    pub successful_operations: usize,
    /// Engine operations that failed, including whole calls that errored.
    pub failed_operations: usize,
    /// Tasks not processed because the batch was cancelled, in batch order.
    pub deferred: Vec<QueueItem>,
}

/// Tasks that share a logical index and a physical target.
struct TaskGroup {
    index_name: String,
    target_index: Option<String>,
    tasks: Vec<QueueItem>,
}

#[derive(Default)]
struct GroupResult {
    successful: usize,
    failed: usize,
    deferred: Vec<QueueItem>,
}

/// Deletes and upserts of one group after mapping and deduplication.
#[derive(Debug, Default, PartialEq)]
struct WriteSet {
    deletes: Vec<String>,
    upserts: Vec<SearchDocument>,
}

impl WriteSet {
    fn delete(&mut self, object_id: String) {
        // A later delete supersedes an earlier upsert of the same document.
        self.upserts.retain(|d| d.object_id != object_id);
        if !self.deletes.contains(&object_id) {
            self.deletes.push(object_id);
        }
    }

    fn upsert(&mut self, document: SearchDocument) {
        match self
            .upserts
            .iter_mut()
            .find(|d| d.object_id == document.object_id)
        {
            Some(existing) => *existing = document,
            None => self.upserts.push(document),
        }
    }

    fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.upserts.is_empty()
    }
}

/// Processes batches of queued tasks.
pub struct TaskProcessor {
    registry: Arc<IndexRegistry>,
    engine: Arc<dyn SearchEngine>,
    urls: Arc<dyn UrlResolver>,
    coordinator: Arc<RebuildCoordinator>,
    config: ProcessorConfig,
}

impl TaskProcessor {
    pub fn new(
        registry: Arc<IndexRegistry>,
        engine: Arc<dyn SearchEngine>,
        urls: Arc<dyn UrlResolver>,
        coordinator: Arc<RebuildCoordinator>,
    ) -> Self {
        Self::with_config(registry, engine, urls, coordinator, ProcessorConfig::default())
    }

    pub fn with_config(
        registry: Arc<IndexRegistry>,
        engine: Arc<dyn SearchEngine>,
        urls: Arc<dyn UrlResolver>,
        coordinator: Arc<RebuildCoordinator>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            registry,
            engine,
            urls,
            coordinator,
            config,
        }
    }

    /// Process one batch.
    ///
    /// Failures are logged and counted; they never abort other groups. If
    /// `cancel` fires, groups that have not started yet and every
    /// `RebuildEnd` of the batch are returned in `deferred`.
    #[instrument(skip(self, batch, cancel), fields(batch_size = batch.len()))]
    pub async fn process(&self, batch: Vec<QueueItem>, cancel: &CancellationToken) -> BatchOutcome {
        let (rebuild_ends, tasks): (Vec<QueueItem>, Vec<QueueItem>) = batch
            .into_iter()
            .partition(|task| task.task_type == TaskType::RebuildEnd);

        let groups = group_tasks(tasks);
        debug!(groups = groups.len(), "Grouped tasks");

        let concurrency = self.config.max_concurrent_groups.max(1);
        let results: Vec<GroupResult> = stream::iter(groups)
            .map(|group| self.process_group(group, cancel))
            .buffered(concurrency)
            .collect()
            .await;

        let mut outcome = BatchOutcome::default();
        for result in results {
            outcome.successful_operations += result.successful;
            outcome.failed_operations += result.failed;
            outcome.deferred.extend(result.deferred);
        }

        if cancel.is_cancelled() {
            outcome.deferred.extend(rebuild_ends);
        } else {
            for task in rebuild_ends {
                let Some(state) = task.rebuild else { continue };
                match self.coordinator.complete_rebuild(&state).await {
                    Ok(()) => outcome.successful_operations += 1,
                    Err(e) => {
                        error!(
                            index = %state.logical_index_name,
                            new_index = %state.new_physical_index_name,
                            error = %e,
                            "Failed to complete rebuild"
                        );
                        outcome.failed_operations += 1;
                    }
                }
            }
        }

        if !outcome.deferred.is_empty() {
            info!(deferred = outcome.deferred.len(), "Batch cancelled, deferring tasks");
        }
        outcome
    }

    async fn process_group(&self, group: TaskGroup, cancel: &CancellationToken) -> GroupResult {
        if cancel.is_cancelled() {
            return GroupResult {
                deferred: group.tasks,
                ..GroupResult::default()
            };
        }

        let Some(entry) = self.registry.get_index(&group.index_name) else {
            warn!(
                index = %group.index_name,
                tasks = group.tasks.len(),
                "Index no longer registered, dropping tasks"
            );
            return GroupResult::default();
        };

        let write_set = self.build_write_set(&entry, &group.tasks).await;
        let mut result = GroupResult::default();
        if write_set.is_empty() {
            return result;
        }

        let target = match group.target_index.clone() {
            Some(target) => target,
            None => match self.live_target(&entry).await {
                Ok(target) => target,
                Err(e) => {
                    let count = write_set.deletes.len() + write_set.upserts.len();
                    error!(
                        index = %entry.name(),
                        count = count,
                        error = %e,
                        "No live index to write to"
                    );
                    result.failed += count;
                    return result;
                }
            },
        };
        self.write(&target, write_set, &mut result).await;

        if group.target_index.is_some() {
            self.coordinator.tracker().record_backfill(
                entry.name(),
                &target,
                result.successful,
                result.failed,
            );
        }
        result
    }

    /// Where live writes for `entry` go.
    ///
    /// The alias once it exists. During the first build of an index the alias
    /// is not set yet, so writes go to the shadow index that will become its
    /// target. Otherwise the alias is bootstrapped first; the bare alias name
    /// is never written to while unset, since that would create a concrete
    /// index in its place.
    async fn live_target(&self, entry: &RegisteredIndex) -> Result<String, IndexerError> {
        let alias = entry.alias();
        if self.engine.resolve_alias(&alias).await?.is_some() {
            return Ok(alias);
        }

        if let Some(status) = self.coordinator.tracker().status(entry.name()) {
            if let (true, Some(shadow)) = (status.phase.is_active(), status.new_physical_index_name) {
                return Ok(shadow);
            }
        }

        self.coordinator.ensure_index(entry.name()).await?;
        match self.engine.resolve_alias(&alias).await? {
            Some(_) => Ok(alias),
            None => Err(IndexerError::rebuild(format!(
                "Alias '{}' has no index yet",
                alias
            ))),
        }
    }

    /// Map every task of a group, in arrival order.
    async fn build_write_set(&self, entry: &RegisteredIndex, tasks: &[QueueItem]) -> WriteSet {
        let mut write_set = WriteSet::default();
        for task in tasks {
            let Some(item) = task.item.as_ref() else {
                continue;
            };
            if task.task_type == TaskType::Delete {
                write_set.delete(item.default_object_id());
                continue;
            }

            match entry.strategy.map_or_none(item).await {
                Ok(Some(mut document)) => {
                    self.fill_document(&mut document, item).await;
                    write_set.upsert(document);
                }
                Ok(None) => write_set.delete(item.default_object_id()),
                Err(e) => {
                    warn!(
                        index = %entry.name(),
                        item_guid = %item.item_guid(),
                        language = %item.language_name(),
                        error = %e,
                        "Failed to map item, skipping"
                    );
                }
            }
        }
        write_set
    }

    async fn fill_document(&self, document: &mut SearchDocument, item: &ItemToIndex) {
        document.fill_base_fields(item);
        if document.url.is_empty() {
            if let Some(page) = item.as_web_page() {
                document.url = match self
                    .urls
                    .resolve_url(&page.tree_path, &page.channel_name, item.language_name())
                    .await
                {
                    Ok(url) => url,
                    Err(e) => {
                        debug!(tree_path = %page.tree_path, error = %e, "No URL for page");
                        String::new()
                    }
                };
            }
        }
        document.indexed_at = Some(Utc::now());
    }

    async fn write(&self, target: &str, write_set: WriteSet, result: &mut GroupResult) {
        if !write_set.deletes.is_empty() {
            let count = write_set.deletes.len();
            let outcome = self.engine.delete_documents(target, &write_set.deletes).await;
            Self::fold(target, "delete", count, outcome, result);
        }
        if !write_set.upserts.is_empty() {
            let count = write_set.upserts.len();
            let outcome = self.engine.upsert_documents(target, &write_set.upserts).await;
            Self::fold(target, "upsert", count, outcome, result);
        }
    }

    fn fold(
        target: &str,
        operation: &str,
        count: usize,
        outcome: Result<BatchOperationSummary, content_indexer_repository::SearchEngineError>,
        result: &mut GroupResult,
    ) {
        match outcome {
            Ok(summary) => {
                for failure in summary.failures() {
                    if let Some(ref err) = failure.error {
                        error!(
                            index = %target,
                            object_id = %failure.document_id,
                            operation = operation,
                            error = %err,
                            "Document operation failed"
                        );
                    }
                }
                debug!(
                    index = %target,
                    operation = operation,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    "Engine call completed"
                );
                result.successful += summary.succeeded;
                result.failed += summary.failed;
            }
            Err(e) => {
                error!(
                    index = %target,
                    operation = operation,
                    count = count,
                    error = %e,
                    "Engine call failed"
                );
                result.failed += count;
            }
        }
    }
}

/// Group tasks by `(index_name, target_index)` in first-appearance order.
fn group_tasks(tasks: Vec<QueueItem>) -> Vec<TaskGroup> {
    let mut groups: Vec<TaskGroup> = Vec::new();
    let mut positions: HashMap<(String, Option<String>), usize> = HashMap::new();
    for task in tasks {
        let key = (task.index_name.to_lowercase(), task.target_index.clone());
        match positions.get(&key) {
            Some(&i) => groups[i].tasks.push(task),
            None => {
                positions.insert(key, groups.len());
                groups.push(TaskGroup {
                    index_name: task.index_name.clone(),
                    target_index: task.target_index.clone(),
                    tasks: vec![task],
                });
            }
        }
    }
    groups
}
