//! Zero-downtime index rebuilds.
//!
//! A rebuild creates a versioned shadow index, backfills it through the task
//! queue, and moves the logical alias onto it once every backfill task has
//! been written. Readers keep querying the alias the whole time.

mod tracker;

pub use tracker::{RebuildPhase, RebuildStatus, RebuildTracker};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use content_indexer_repository::{versioned_index_name, SearchEngine};
use content_indexer_shared::{QueueItem, RebuildState};

use crate::content::ContentSource;
use crate::errors::IndexerError;
use crate::queue::TaskQueue;
use crate::registry::{alias_name, IndexRegistry, RegisteredIndex};

/// Drives rebuilds and bootstraps aliases for newly registered indices.
pub struct RebuildCoordinator {
    registry: Arc<IndexRegistry>,
    engine: Arc<dyn SearchEngine>,
    content: Arc<dyn ContentSource>,
    queue: Arc<TaskQueue>,
    tracker: Arc<RebuildTracker>,
    last_version: AtomicU64,
}

impl RebuildCoordinator {
    pub fn new(
        registry: Arc<IndexRegistry>,
        engine: Arc<dyn SearchEngine>,
        content: Arc<dyn ContentSource>,
        queue: Arc<TaskQueue>,
        tracker: Arc<RebuildTracker>,
    ) -> Self {
        Self {
            registry,
            engine,
            content,
            queue,
            tracker,
            last_version: AtomicU64::new(0),
        }
    }

    pub fn tracker(&self) -> &Arc<RebuildTracker> {
        &self.tracker
    }

    /// Version suffix for a new physical index: current unix millis, strictly
    /// increasing within this process.
    fn next_version(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let mut current = self.last_version.load(Ordering::SeqCst);
        loop {
            let next = now.max(current + 1);
            match self.last_version.compare_exchange(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// Start rebuilding `logical_index_name`.
    ///
    /// Creates the shadow index, enqueues one `RebuildItem` per item the
    /// content source returns for the index, then a single `RebuildEnd`.
    /// Returns once everything is queued; the alias moves when the worker
    /// reaches the `RebuildEnd`.
    ///
    /// # Errors
    ///
    /// * `NotRegistered` - the index is unknown
    /// * `RebuildError` - a rebuild of the index is already running, or the
    ///   content query failed (the shadow index is deleted again)
    /// * `Engine` - the alias could not be read or the shadow index created
    #[instrument(skip(self))]
    pub async fn start_rebuild(&self, logical_index_name: &str) -> Result<RebuildState, IndexerError> {
        let entry = self.registry.get_required_index(logical_index_name)?;
        self.tracker.begin(entry.name())?;

        match self.backfill(&entry).await {
            Ok(state) => Ok(state),
            Err(e) => {
                error!(index = %entry.name(), error = %e, "Rebuild failed to start");
                self.tracker.mark_failed(entry.name(), e.to_string());
                Err(e)
            }
        }
    }

    async fn backfill(&self, entry: &RegisteredIndex) -> Result<RebuildState, IndexerError> {
        let alias = entry.alias();
        let old = self.engine.resolve_alias(&alias).await?;
        if old.is_none() {
            self.check_alias_free(&alias).await?;
        }
        let new = versioned_index_name(&alias, self.next_version());

        self.engine
            .create_index(&new, &entry.strategy.declare_schema())
            .await?;
        self.tracker.set_targets(entry.name(), old.clone(), new.clone());
        info!(index = %entry.name(), old_index = ?old, new_index = %new, "Created shadow index");

        let items = match self.content.query_items(&entry.definition).await {
            Ok(items) => items,
            Err(e) => {
                self.discard_index(&new).await;
                return Err(IndexerError::rebuild(format!(
                    "Content query for '{}' failed: {}",
                    entry.name(),
                    e
                )));
            }
        };

        let tasks = items
            .into_iter()
            .map(|item| QueueItem::rebuild_item(item, entry.name(), new.clone()));
        let queued = match self.queue.enqueue_all(tasks) {
            Ok(queued) => queued,
            Err(e) => {
                self.discard_index(&new).await;
                return Err(e);
            }
        };
        self.tracker.set_enqueued(entry.name(), queued);

        let state = RebuildState {
            logical_index_name: entry.name().to_string(),
            old_physical_index_name: old,
            new_physical_index_name: new,
        };
        self.queue.enqueue(QueueItem::rebuild_end(state.clone()))?;

        info!(
            index = %entry.name(),
            new_index = %state.new_physical_index_name,
            items = queued,
            "Rebuild backfill queued"
        );
        Ok(state)
    }

    /// Finish a rebuild: move the alias onto the new index and delete the old one.
    ///
    /// Refuses to swap if any backfill write failed, or if the alias was moved
    /// by someone else since the rebuild started. In both cases the new index
    /// is left in place and the rebuild is marked failed. If the index was
    /// unregistered meanwhile, the new index is deleted instead.
    #[instrument(skip(self, state), fields(index = %state.logical_index_name))]
    pub async fn complete_rebuild(&self, state: &RebuildState) -> Result<(), IndexerError> {
        let logical = state.logical_index_name.as_str();
        let status = self
            .tracker
            .status(logical)
            .unwrap_or_else(|| RebuildStatus::not_started(logical));

        if status.phase != RebuildPhase::Backfilling
            || status.new_physical_index_name.as_deref() != Some(state.new_physical_index_name.as_str())
        {
            warn!(
                new_index = %state.new_physical_index_name,
                phase = ?status.phase,
                "Ignoring stale rebuild completion"
            );
            return Err(IndexerError::rebuild(format!(
                "Rebuild of '{}' into '{}' is not in progress",
                logical, state.new_physical_index_name
            )));
        }

        if self.registry.get_index(logical).is_none() {
            let msg = format!("Index '{}' was removed during the rebuild", logical);
            self.tracker.mark_failed(logical, msg.clone());
            self.discard_index(&state.new_physical_index_name).await;
            return Err(IndexerError::rebuild(msg));
        }

        if status.items_failed > 0 {
            let msg = format!(
                "{} backfill writes into '{}' failed, alias not moved",
                status.items_failed, state.new_physical_index_name
            );
            self.tracker.mark_failed(logical, msg.clone());
            return Err(IndexerError::rebuild(msg));
        }

        self.tracker.mark_swapping(logical);
        match self.swap(state).await {
            Ok(()) => {
                self.tracker.mark_done(logical);
                info!(
                    new_index = %state.new_physical_index_name,
                    written = status.items_written,
                    "Rebuild completed"
                );
                Ok(())
            }
            Err(e) => {
                self.tracker.mark_failed(logical, e.to_string());
                Err(e)
            }
        }
    }

    async fn swap(&self, state: &RebuildState) -> Result<(), IndexerError> {
        let alias = alias_name(&state.logical_index_name);
        let current = self.engine.resolve_alias(&alias).await?;

        let from = match (state.old_physical(), current.as_deref()) {
            (Some(old), Some(current)) if old != current => {
                return Err(IndexerError::rebuild(format!(
                    "Alias '{}' moved from '{}' to '{}' during the rebuild",
                    alias, old, current
                )));
            }
            (Some(old), _) => Some(old.to_string()),
            // Another writer bootstrapped the alias after the rebuild began.
            (None, current) => current.map(str::to_string),
        };

        self.engine
            .swap_alias(&alias, from.as_deref(), &state.new_physical_index_name)
            .await?;

        if let Some(old) = from {
            if let Err(e) = self.engine.delete_index(&old).await {
                warn!(index = %old, error = %e, "Failed to delete replaced index");
            }
        }
        Ok(())
    }

    /// Make sure the alias of `logical_index_name` points at a physical index.
    ///
    /// Returns `true` if a new physical index was created.
    #[instrument(skip(self))]
    pub async fn ensure_index(&self, logical_index_name: &str) -> Result<bool, IndexerError> {
        let entry = self.registry.get_required_index(logical_index_name)?;
        if self.tracker.is_active(entry.name()) {
            return Ok(false);
        }

        let alias = entry.alias();
        if self.engine.resolve_alias(&alias).await?.is_some() {
            return Ok(false);
        }
        self.check_alias_free(&alias).await?;

        let physical = versioned_index_name(&alias, self.next_version());
        self.engine
            .create_index(&physical, &entry.strategy.declare_schema())
            .await?;
        if let Err(e) = self.engine.swap_alias(&alias, None, &physical).await {
            self.discard_index(&physical).await;
            return Err(e.into());
        }

        info!(index = %entry.name(), alias = %alias, physical_index = %physical, "Bootstrapped index");
        Ok(true)
    }

    /// Run [`ensure_index`](Self::ensure_index) for every registered index.
    ///
    /// Failures are logged and returned per index; they do not stop the others.
    pub async fn ensure_all(&self) -> Vec<(String, Result<bool, IndexerError>)> {
        let mut results = Vec::new();
        for entry in self.registry.indices() {
            let result = self.ensure_index(entry.name()).await;
            if let Err(ref e) = result {
                error!(index = %entry.name(), error = %e, "Failed to bootstrap index");
            }
            results.push((entry.name().to_string(), result));
        }
        results
    }

    /// A concrete index under the alias name would shadow the alias forever.
    async fn check_alias_free(&self, alias: &str) -> Result<(), IndexerError> {
        if self.engine.is_physical_index(alias).await? {
            return Err(IndexerError::rebuild(format!(
                "'{}' is a concrete index, not an alias; delete it before rebuilding",
                alias
            )));
        }
        Ok(())
    }

    async fn discard_index(&self, physical: &str) {
        if let Err(e) = self.engine.delete_index(physical).await {
            warn!(index = %physical, error = %e, "Failed to delete unused index");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InMemoryContent;
    use crate::strategy::StrategyRegistry;
    use content_indexer_repository::{EngineOperation, InMemorySearchEngine};
    use content_indexer_shared::{
        ContentItem, IncludedPath, IndexDefinition, IndexSchema, TaskType, WebPageItem,
    };
    use uuid::Uuid;

    struct Fixture {
        registry: Arc<IndexRegistry>,
        engine: Arc<InMemorySearchEngine>,
        content: Arc<InMemoryContent>,
        queue: Arc<TaskQueue>,
        coordinator: RebuildCoordinator,
    }

    fn fixture(pages: usize) -> Fixture {
        let registry = Arc::new(IndexRegistry::new(Arc::new(StrategyRegistry::with_defaults())));
        registry
            .add_index(
                IndexDefinition::new(1, "Articles", "main")
                    .with_languages(["en"])
                    .with_path(IncludedPath::new("/%")),
            )
            .unwrap();
        let engine = Arc::new(InMemorySearchEngine::new());
        let content = Arc::new(InMemoryContent::default());
        for i in 0..pages {
            content.add_item(WebPageItem::new(
                ContentItem::new(i as i32, Uuid::new_v4(), "en", "Article", format!("Page {i}")),
                "main",
                format!("/p{i}"),
            ));
        }
        let queue = Arc::new(TaskQueue::new(registry.clone()));
        let coordinator = RebuildCoordinator::new(
            registry.clone(),
            engine.clone(),
            content.clone(),
            queue.clone(),
            Arc::new(RebuildTracker::new()),
        );
        Fixture {
            registry,
            engine,
            content,
            queue,
            coordinator,
        }
    }

    #[test]
    fn test_versions_strictly_increase() {
        let f = fixture(0);
        let a = f.coordinator.next_version();
        let b = f.coordinator.next_version();
        let c = f.coordinator.next_version();
        assert!(a < b && b < c);
    }

    #[tokio::test]
    async fn test_start_rebuild_queues_items_then_end() {
        let f = fixture(3);
        let state = f.coordinator.start_rebuild("articles").await.unwrap();

        assert_eq!(state.logical_index_name, "Articles");
        assert!(state.old_physical_index_name.is_none());
        assert!(state.new_physical_index_name.starts_with("articles_v"));
        assert!(f.engine.index_exists(&state.new_physical_index_name));

        let tasks = f.queue.take_batch(10);
        assert_eq!(tasks.len(), 4);
        assert!(tasks[..3].iter().all(|t| t.task_type == TaskType::RebuildItem
            && t.target_index.as_deref() == Some(state.new_physical_index_name.as_str())));
        assert_eq!(tasks[3].task_type, TaskType::RebuildEnd);

        let status = f.coordinator.tracker().status("Articles").unwrap();
        assert_eq!(status.phase, RebuildPhase::Backfilling);
        assert_eq!(status.items_enqueued, 3);
    }

    #[tokio::test]
    async fn test_start_rebuild_rejects_unknown_and_concurrent() {
        let f = fixture(1);
        assert!(matches!(
            f.coordinator.start_rebuild("Missing").await,
            Err(IndexerError::NotRegistered(_))
        ));

        f.coordinator.start_rebuild("Articles").await.unwrap();
        assert!(matches!(
            f.coordinator.start_rebuild("Articles").await,
            Err(IndexerError::RebuildError(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_content_query_discards_shadow_index() {
        let f = fixture(2);
        f.content.fail_queries(true);

        let result = f.coordinator.start_rebuild("Articles").await;
        assert!(matches!(result, Err(IndexerError::RebuildError(_))));
        assert!(f.engine.index_names().is_empty());
        assert!(f.queue.is_empty());
        assert_eq!(
            f.coordinator.tracker().status("Articles").unwrap().phase,
            RebuildPhase::Failed
        );
    }

    #[tokio::test]
    async fn test_complete_rebuild_swaps_and_deletes_old() {
        let f = fixture(0);
        assert!(f.coordinator.ensure_index("Articles").await.unwrap());
        let old = f.engine.alias_target("articles").unwrap();

        let state = f.coordinator.start_rebuild("Articles").await.unwrap();
        assert_eq!(state.old_physical_index_name.as_deref(), Some(old.as_str()));
        f.coordinator.complete_rebuild(&state).await.unwrap();

        assert_eq!(
            f.engine.alias_target("articles").as_deref(),
            Some(state.new_physical_index_name.as_str())
        );
        assert!(!f.engine.index_exists(&old));
        assert_eq!(
            f.coordinator.tracker().status("Articles").unwrap().phase,
            RebuildPhase::Done
        );
    }

    #[tokio::test]
    async fn test_complete_rebuild_refuses_after_backfill_failures() {
        let f = fixture(0);
        let state = f.coordinator.start_rebuild("Articles").await.unwrap();
        f.coordinator.tracker().record_backfill(
            "Articles",
            &state.new_physical_index_name,
            0,
            2,
        );

        let result = f.coordinator.complete_rebuild(&state).await;
        assert!(matches!(result, Err(IndexerError::RebuildError(_))));
        assert!(f.engine.alias_target("articles").is_none());
        assert!(f.engine.index_exists(&state.new_physical_index_name));
    }

    #[tokio::test]
    async fn test_complete_rebuild_swap_failure_marks_failed() {
        let f = fixture(0);
        let state = f.coordinator.start_rebuild("Articles").await.unwrap();
        f.engine.fail_operation(EngineOperation::SwapAlias);

        assert!(f.coordinator.complete_rebuild(&state).await.is_err());
        let status = f.coordinator.tracker().status("Articles").unwrap();
        assert_eq!(status.phase, RebuildPhase::Failed);
        assert!(status.error.is_some());
    }

    #[tokio::test]
    async fn test_ensure_index_is_idempotent() {
        let f = fixture(0);
        assert!(f.coordinator.ensure_index("Articles").await.unwrap());
        assert!(!f.coordinator.ensure_index("Articles").await.unwrap());
        assert_eq!(f.engine.index_names().len(), 1);

        let results = f.coordinator.ensure_all().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].1, Ok(false)));
    }

    #[tokio::test]
    async fn test_complete_rebuild_of_removed_index_discards_new_index() {
        let f = fixture(1);
        let state = f.coordinator.start_rebuild("Articles").await.unwrap();
        f.registry.set_indices(vec![]).unwrap();

        let result = f.coordinator.complete_rebuild(&state).await;
        assert!(matches!(result, Err(IndexerError::RebuildError(_))));
        assert!(f.engine.alias_target("articles").is_none());
        assert!(!f.engine.index_exists(&state.new_physical_index_name));

        let status = f.coordinator.tracker().status("Articles").unwrap();
        assert_eq!(status.phase, RebuildPhase::Failed);
        assert!(status.error.unwrap().contains("removed"));
    }

    #[tokio::test]
    async fn test_concrete_index_under_alias_name_is_reported() {
        let f = fixture(1);
        f.engine
            .create_index("articles", &IndexSchema::base())
            .await
            .unwrap();

        let err = f.coordinator.ensure_index("Articles").await.unwrap_err();
        assert!(err.to_string().contains("concrete index"));

        let err = f.coordinator.start_rebuild("Articles").await.unwrap_err();
        assert!(err.to_string().contains("concrete index"));
        assert_eq!(f.engine.index_names(), vec!["articles".to_string()]);
        assert!(f.queue.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_index_retries_after_create_failure() {
        let f = fixture(0);
        f.engine.fail_operation(EngineOperation::CreateIndex);
        let results = f.coordinator.ensure_all().await;
        assert!(results[0].1.is_err());
        assert!(f.engine.index_names().is_empty());

        f.engine.clear_failures();
        assert!(f.coordinator.ensure_index("Articles").await.unwrap());
        assert!(f.engine.alias_target("articles").is_some());
        assert!(!f.engine.index_exists("articles"));
    }
}
