//! Orchestrator module for the content indexer.
//!
//! Coordinates the consumer, task logger, and queue worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::{ContentEvent, StreamMessage};
use crate::errors::IndexerError;
use crate::logger::TaskLogger;
use crate::worker::QueueWorker;

/// Source of content event batches.
#[async_trait]
pub trait Consumer: Send + Sync {
    fn subscribe(&self) -> Result<(), IndexerError>;

    /// Send event batches on `sender` until the stream ends or `shutdown`
    /// fires, committing offsets as acknowledgments arrive on `ack_receiver`.
    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        ack_receiver: mpsc::Receiver<StreamMessage>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IndexerError>;
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Size of the message channel buffer.
    pub channel_buffer_size: usize,
    /// Time between progress log lines.
    pub progress_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
            progress_interval: Duration::from_secs(10),
        }
    }
}

/// Orchestrator that wires the consumer to the task queue.
///
/// Each event batch is turned into queued tasks and acknowledged; the queue
/// worker runs alongside and writes the tasks to the search engine.
pub struct Orchestrator {
    consumer: Arc<dyn Consumer>,
    task_logger: TaskLogger,
    worker: Arc<QueueWorker>,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
    worker_cancel: CancellationToken,
    /// Total number of events received since startup.
    total_events_processed: Arc<AtomicU64>,
    /// Total number of tasks enqueued since startup.
    total_tasks_enqueued: Arc<AtomicU64>,
}

impl Orchestrator {
    pub fn new(consumer: Arc<dyn Consumer>, task_logger: TaskLogger, worker: Arc<QueueWorker>) -> Self {
        Self::with_config(consumer, task_logger, worker, OrchestratorConfig::default())
    }

    pub fn with_config(
        consumer: Arc<dyn Consumer>,
        task_logger: TaskLogger,
        worker: Arc<QueueWorker>,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            consumer,
            task_logger,
            worker,
            config,
            shutdown_tx,
            worker_cancel: CancellationToken::new(),
            total_events_processed: Arc::new(AtomicU64::new(0)),
            total_tasks_enqueued: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn worker(&self) -> &Arc<QueueWorker> {
        &self.worker
    }

    pub fn total_events_processed(&self) -> u64 {
        self.total_events_processed.load(Ordering::Relaxed)
    }

    pub fn total_tasks_enqueued(&self) -> u64 {
        self.total_tasks_enqueued.load(Ordering::Relaxed)
    }

    /// Run the orchestrator.
    ///
    /// Blocks until the consumer stream ends or a shutdown signal arrives.
    /// When the stream ends, queued tasks are drained before returning; on
    /// a shutdown signal they are left in the queue.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), IndexerError> {
        info!("Starting content indexer orchestrator");

        self.consumer.subscribe()?;

        let (event_transmitter, mut event_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);
        let (ack_transmitter, ack_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);

        let consumer = self.consumer.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let consumer_handle = tokio::spawn(async move {
            if let Err(e) = consumer
                .run(event_transmitter, ack_receiver, shutdown_rx)
                .await
            {
                error!(error = %e, "Consumer error");
            }
        });

        let worker = self.worker.clone();
        let worker_cancel = self.worker_cancel.clone();
        let worker_handle = tokio::spawn(async move { worker.run(worker_cancel).await });

        info!("Ready to process content events");

        let total_events = Arc::clone(&self.total_events_processed);
        let total_tasks = Arc::clone(&self.total_tasks_enqueued);
        let mut progress_timer = interval(self.config.progress_interval);
        progress_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut prev_events: u64 = 0;
        let mut prev_operations: u64 = 0;
        let mut prev_time = std::time::Instant::now();
        let mut stream_ended = false;

        loop {
            tokio::select! {
                msg = event_receiver.recv() => {
                    match msg {
                        Some(StreamMessage::Events { events, offsets }) => {
                            debug!(
                                event_count = events.len(),
                                offset_count = offsets.len(),
                                "Received events from consumer"
                            );
                            let ack = match self.process_events(&events).await {
                                Ok(queued) => {
                                    if queued > 0 {
                                        self.worker.request_flush();
                                    }
                                    StreamMessage::Acknowledgment { offsets, success: true, error: None }
                                }
                                Err(e) => {
                                    error!(error = %e, "Failed to queue tasks for events. Sending NACK to broker");
                                    StreamMessage::Acknowledgment {
                                        offsets,
                                        success: false,
                                        error: Some(e.to_string()),
                                    }
                                }
                            };
                            let _ = ack_transmitter.send(ack).await;
                        }
                        Some(StreamMessage::Error(e)) => {
                            error!(error = %e, "Received error from consumer");
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Consumer stream ended");
                            stream_ended = true;
                            break;
                        }
                        Some(StreamMessage::Acknowledgment { .. }) => {
                            warn!("Received acknowledgment on event channel (should be on ack channel)");
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = progress_timer.tick() => {
                    let events = total_events.load(Ordering::Relaxed);
                    let operations = self.worker.total_successful();

                    let now = std::time::Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();
                    let rate = |current: u64, previous: u64| {
                        if elapsed_secs > 0.0 {
                            (current.saturating_sub(previous) as f64) / elapsed_secs
                        } else {
                            0.0
                        }
                    };

                    info!(
                        events_processed = events,
                        tasks_enqueued = total_tasks.load(Ordering::Relaxed),
                        queue_depth = self.worker.queue().len(),
                        operations_succeeded = operations,
                        operations_failed = self.worker.total_failed(),
                        events_per_sec = format!("{:.2}", rate(events, prev_events)),
                        operations_per_sec = format!("{:.2}", rate(operations, prev_operations)),
                        "Processing progress"
                    );

                    prev_events = events;
                    prev_operations = operations;
                    prev_time = now;
                }
            }
        }

        let _ = self.shutdown_tx.send(());
        self.worker_cancel.cancel();
        let _ = worker_handle.await;
        let _ = consumer_handle.await;

        if stream_ended {
            // Nothing else will drain the queue once the worker has stopped.
            if let Some(report) = self.worker.drain(&CancellationToken::new()).await {
                debug!(batches = report.batches, "Final drain finished");
            }
        }

        info!(
            total_events_processed = self.total_events_processed(),
            total_tasks_enqueued = self.total_tasks_enqueued(),
            operations_succeeded = self.worker.total_successful(),
            operations_failed = self.worker.total_failed(),
            tasks_remaining = self.worker.queue().len(),
            "Orchestrator shutdown complete"
        );
        Ok(())
    }

    async fn process_events(&self, events: &[ContentEvent]) -> Result<usize, IndexerError> {
        self.total_events_processed
            .fetch_add(events.len() as u64, Ordering::Relaxed);

        let queued = self.task_logger.log_events(events).await?;
        self.total_tasks_enqueued
            .fetch_add(queued as u64, Ordering::Relaxed);
        debug!(event_count = events.len(), queued = queued, "Queued tasks for events");
        Ok(queued)
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        self.worker_cancel.cancel();
    }
}
