//! Queue worker.
//!
//! Drains the task queue on a fixed interval or when a flush is requested.
//! At most one drain runs at a time; a drain requested while another is in
//! progress is coalesced into it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::processor::TaskProcessor;
use crate::queue::TaskQueue;

/// Configuration for the queue worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Time between scheduled drains.
    pub interval: Duration,
    /// Maximum tasks handed to the processor at once.
    pub max_batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_batch_size: 100,
        }
    }
}

/// What one drain did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub batches: usize,
    pub successful_operations: usize,
    pub failed_operations: usize,
    /// Tasks put back at the front of the queue because of cancellation.
    pub deferred: usize,
}

/// Resets the draining flag when a drain ends, including by panic.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Single consumer of the task queue.
pub struct QueueWorker {
    queue: Arc<TaskQueue>,
    processor: Arc<TaskProcessor>,
    config: WorkerConfig,
    flush: Notify,
    draining: AtomicBool,
    total_successful: AtomicU64,
    total_failed: AtomicU64,
}

impl QueueWorker {
    pub fn new(queue: Arc<TaskQueue>, processor: Arc<TaskProcessor>, config: WorkerConfig) -> Self {
        Self {
            queue,
            processor,
            config,
            flush: Notify::new(),
            draining: AtomicBool::new(false),
            total_successful: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
        }
    }

    /// Ask the running worker to drain now instead of waiting for the next tick.
    pub fn request_flush(&self) {
        self.flush.notify_one();
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    /// Engine operations that succeeded since startup.
    pub fn total_successful(&self) -> u64 {
        self.total_successful.load(Ordering::Relaxed)
    }

    /// Engine operations that failed since startup.
    pub fn total_failed(&self) -> u64 {
        self.total_failed.load(Ordering::Relaxed)
    }

    /// Run until `cancel` fires.
    ///
    /// Tasks still queued on exit stay in the queue.
    #[instrument(skip(self, cancel))]
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            max_batch_size = self.config.max_batch_size,
            "Queue worker started"
        );
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                _ = self.flush.notified() => {
                    debug!("Flush requested");
                }
            }
            self.drain(&cancel).await;
        }

        info!(remaining = self.queue.len(), "Queue worker stopped");
    }

    /// Process batches until the queue is empty or `cancel` fires.
    ///
    /// Returns `None` if another drain was already running.
    pub async fn drain(&self, cancel: &CancellationToken) -> Option<DrainReport> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Drain already in progress");
            return None;
        }
        let _guard = DrainGuard(&self.draining);

        let mut report = DrainReport::default();
        let batch_size = self.config.max_batch_size.max(1);
        while !cancel.is_cancelled() {
            let batch = self.queue.take_batch(batch_size);
            if batch.is_empty() {
                break;
            }

            let outcome = self.processor.process(batch, cancel).await;
            report.batches += 1;
            report.successful_operations += outcome.successful_operations;
            report.failed_operations += outcome.failed_operations;
            self.total_successful
                .fetch_add(outcome.successful_operations as u64, Ordering::Relaxed);
            self.total_failed
                .fetch_add(outcome.failed_operations as u64, Ordering::Relaxed);

            if !outcome.deferred.is_empty() {
                report.deferred += outcome.deferred.len();
                self.queue.requeue_front(outcome.deferred);
                break;
            }
        }

        if report.batches > 0 {
            info!(
                batches = report.batches,
                successful = report.successful_operations,
                failed = report.failed_operations,
                deferred = report.deferred,
                remaining = self.queue.len(),
                "Drained task queue"
            );
        }
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InMemoryContent;
    use crate::rebuild::{RebuildCoordinator, RebuildTracker};
    use crate::registry::IndexRegistry;
    use crate::strategy::StrategyRegistry;
    use content_indexer_repository::InMemorySearchEngine;
    use content_indexer_shared::{ContentItem, IncludedPath, IndexDefinition, QueueItem, WebPageItem};
    use uuid::Uuid;

    fn worker(batch_size: usize) -> (Arc<QueueWorker>, Arc<InMemorySearchEngine>) {
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
        let queue = Arc::new(TaskQueue::new(registry.clone()));
        let coordinator = Arc::new(RebuildCoordinator::new(
            registry.clone(),
            engine.clone(),
            content.clone(),
            queue.clone(),
            Arc::new(RebuildTracker::new()),
        ));
        let processor = Arc::new(TaskProcessor::new(registry, engine.clone(), content, coordinator));
        let config = WorkerConfig {
            interval: Duration::from_millis(50),
            max_batch_size: batch_size,
        };
        (Arc::new(QueueWorker::new(queue, processor, config)), engine)
    }

    fn page(i: i32) -> QueueItem {
        let page = WebPageItem::new(
            ContentItem::new(i, Uuid::new_v4(), "en", "Article", format!("Page {i}")),
            "main",
            format!("/p{i}"),
        );
        QueueItem::update(page.into(), "Articles")
    }

    #[tokio::test]
    async fn test_drain_empties_queue_in_batches() {
        let (worker, engine) = worker(2);
        worker.queue().enqueue_all((0..5).map(page)).unwrap();

        let report = worker.drain(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(report.successful_operations, 5);
        assert!(worker.queue().is_empty());
        assert_eq!(engine.documents("articles").len(), 5);
        assert_eq!(worker.total_successful(), 5);
    }

    #[tokio::test]
    async fn test_cancelled_drain_leaves_queue() {
        let (worker, _) = worker(2);
        worker.queue().enqueue_all((0..3).map(page)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = worker.drain(&cancel).await.unwrap();
        assert_eq!(report.batches, 0);
        assert_eq!(worker.queue().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_drain_is_coalesced() {
        let (worker, _) = worker(2);
        worker.draining.store(true, Ordering::SeqCst);
        assert!(worker.drain(&CancellationToken::new()).await.is_none());

        worker.draining.store(false, Ordering::SeqCst);
        assert!(worker.drain(&CancellationToken::new()).await.is_some());
    }

    #[tokio::test]
    async fn test_run_drains_on_flush_and_stops_on_cancel() {
        let (worker, engine) = worker(10);
        let cancel = CancellationToken::new();
        let handle = {
            let worker = worker.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { worker.run(cancel).await })
        };

        worker.queue().enqueue(page(1)).unwrap();
        worker.request_flush();
        for _ in 0..50 {
            if !engine.documents("articles").is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(engine.documents("articles").len(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }
}
