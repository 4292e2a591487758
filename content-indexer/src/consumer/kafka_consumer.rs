//! Kafka consumer implementation for the content indexer.
//!
//! Consumes JSON content events from a Kafka topic and forwards them in
//! batches to the orchestrator. Offsets are committed only after the
//! orchestrator acknowledges a batch.

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer as _, StreamConsumer},
    message::{BorrowedMessage, Message as KafkaMessage},
    Offset, TopicPartitionList,
};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::messages::{ContentEvent, StreamMessage};
use crate::errors::IndexerError;
use crate::orchestrator::Consumer;

/// Default topic carrying content events.
pub const DEFAULT_CONTENT_EVENTS_TOPIC: &str = "content.changes";

/// Default batch size for Kafka message batching.
const DEFAULT_BATCH_SIZE: usize = 50;

/// Default batch timeout in milliseconds.
const DEFAULT_BATCH_TIMEOUT_MS: u64 = 1000;

/// Kafka consumer for content events.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    topics: Vec<String>,
    batch_size: usize,
    batch_timeout: Duration,
}

impl KafkaConsumer {
    /// Create a consumer for `topic` with default batching.
    ///
    /// # Arguments
    ///
    /// * `brokers` - Kafka broker addresses (comma-separated)
    /// * `group_id` - Consumer group ID
    /// * `topic` - Topic carrying content events
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, IndexerError> {
        Self::with_batch_config(
            brokers,
            group_id,
            topic,
            DEFAULT_BATCH_SIZE,
            DEFAULT_BATCH_TIMEOUT_MS,
        )
    }

    /// Create a consumer with custom batching.
    ///
    /// # Arguments
    ///
    /// * `batch_size` - Number of messages to batch before sending
    /// * `batch_timeout_ms` - Maximum time to wait before flushing a partial batch (milliseconds)
    pub fn with_batch_config(
        brokers: &str,
        group_id: &str,
        topic: &str,
        batch_size: usize,
        batch_timeout_ms: u64,
    ) -> Result<Self, IndexerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()?;

        info!(
            brokers = %brokers,
            group_id = %group_id,
            topic = %topic,
            batch_size = batch_size,
            batch_timeout_ms = batch_timeout_ms,
            "Created Kafka consumer"
        );

        Ok(Self {
            consumer,
            topics: vec![topic.to_string()],
            batch_size: batch_size.max(1),
            batch_timeout: Duration::from_millis(batch_timeout_ms),
        })
    }

    /// Send the pending batch to the orchestrator.
    async fn flush_batch(
        &self,
        events: &mut Vec<ContentEvent>,
        offsets: &mut Vec<(String, i32, i64)>,
        sender: &mpsc::Sender<StreamMessage>,
    ) -> Result<(), IndexerError> {
        if offsets.is_empty() {
            return Ok(());
        }
        info!(
            event_count = events.len(),
            offset_count = offsets.len(),
            "Sending batch of content events"
        );
        sender
            .send(StreamMessage::Events {
                events: std::mem::take(events),
                offsets: std::mem::take(offsets),
            })
            .await
            .map_err(|e| IndexerError::channel(e.to_string()))
    }

    /// Commit offsets for acknowledged messages.
    fn commit_offsets(&self, offsets: &[(String, i32, i64)]) -> Result<(), IndexerError> {
        if offsets.is_empty() {
            return Ok(());
        }
        let mut tpl = TopicPartitionList::new();
        for (topic, partition, offset) in offsets {
            tpl.add_partition_offset(topic, *partition, Offset::Offset(offset + 1))?;
        }
        self.consumer.commit(&tpl, CommitMode::Async)?;
        Ok(())
    }

    /// Commit a single message that carries no work.
    fn skip_message(&self, msg: &BorrowedMessage<'_>) -> Result<(), IndexerError> {
        self.commit_offsets(&[(msg.topic().to_string(), msg.partition(), msg.offset())])
    }
}

/// Decode one message payload.
///
/// `Ok(None)` for an empty payload.
pub fn parse_payload(payload: Option<&[u8]>) -> Result<Option<ContentEvent>, IndexerError> {
    match payload {
        None => Ok(None),
        Some(bytes) if bytes.is_empty() => Ok(None),
        Some(bytes) => serde_json::from_slice(bytes)
            .map(Some)
            .map_err(|e| IndexerError::parse(format!("Invalid content event: {}", e))),
    }
}

#[async_trait]
impl Consumer for KafkaConsumer {
    fn subscribe(&self) -> Result<(), IndexerError> {
        let topics: Vec<&str> = self.topics.iter().map(|s| s.as_str()).collect();
        self.consumer.subscribe(&topics)?;
        info!(topics = ?self.topics, "Subscribed to Kafka topics");
        Ok(())
    }

    #[instrument(skip(self, sender, ack_receiver, shutdown))]
    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        mut ack_receiver: mpsc::Receiver<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IndexerError> {
        use futures::StreamExt;

        let mut message_stream = self.consumer.stream();
        let mut events: Vec<ContentEvent> = Vec::with_capacity(self.batch_size);
        let mut offsets: Vec<(String, i32, i64)> = Vec::with_capacity(self.batch_size);

        let mut flush_timer = tokio::time::interval(self.batch_timeout);
        flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        flush_timer.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Consumer received shutdown signal");
                    // Uncommitted messages are read again on restart.
                    let _ = sender.send(StreamMessage::End).await;
                    break;
                }
                ack_msg = ack_receiver.recv() => {
                    match ack_msg {
                        Some(StreamMessage::Acknowledgment { offsets, success, error }) => {
                            if success {
                                match self.commit_offsets(&offsets) {
                                    Ok(()) => debug!(offset_count = offsets.len(), "Committed offsets"),
                                    Err(e) => error!(error = %e, "Failed to commit offsets after acknowledgment"),
                                }
                            } else {
                                error!(
                                    offset_count = offsets.len(),
                                    error = error.as_deref().unwrap_or("Unknown error"),
                                    "Not committing offsets due to processing failure"
                                );
                            }
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Acknowledgment channel closed");
                            break;
                        }
                        _ => {}
                    }
                }
                message = message_stream.next() => {
                    match message {
                        Some(Ok(msg)) => {
                            debug!(
                                topic = %msg.topic(),
                                partition = msg.partition(),
                                offset = msg.offset(),
                                "Received message from Kafka"
                            );
                            match parse_payload(msg.payload()) {
                                Ok(Some(event)) => {
                                    events.push(event);
                                    offsets.push((msg.topic().to_string(), msg.partition(), msg.offset()));
                                    if offsets.len() >= self.batch_size {
                                        self.flush_batch(&mut events, &mut offsets, &sender).await?;
                                    }
                                }
                                Ok(None) => {
                                    debug!(offset = msg.offset(), "Empty message, committing");
                                    self.skip_message(&msg)?;
                                }
                                Err(e) => {
                                    // A malformed event never becomes valid; skip past it.
                                    warn!(
                                        topic = %msg.topic(),
                                        partition = msg.partition(),
                                        offset = msg.offset(),
                                        error = %e,
                                        "Skipping unparseable message"
                                    );
                                    self.skip_message(&msg)?;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Kafka error");
                            let _ = sender.send(StreamMessage::Error(e.to_string())).await;
                        }
                        None => {
                            info!("Kafka stream ended");
                            self.flush_batch(&mut events, &mut offsets, &sender).await?;
                            let _ = sender.send(StreamMessage::End).await;
                            break;
                        }
                    }
                }
                _ = flush_timer.tick() => {
                    if !offsets.is_empty() {
                        debug!(count = offsets.len(), "Flushing batch due to timeout");
                        self.flush_batch(&mut events, &mut offsets, &sender).await?;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::ContentEventKind;

    #[test]
    fn test_parse_payload() {
        assert!(parse_payload(None).unwrap().is_none());
        assert!(parse_payload(Some(b"")).unwrap().is_none());
        assert!(matches!(
            parse_payload(Some(b"not json")),
            Err(IndexerError::ParseError(_))
        ));

        let payload = br#"{"event":"deleted","item":{"kind":"reusable","item_id":3,
            "item_guid":"6f1c1a5e-2a47-4c8e-9d59-6a3f9d0f7c11","language_name":"en",
            "content_type_name":"Author","name":"Ann"}}"#;
        let event = parse_payload(Some(payload)).unwrap().unwrap();
        assert_eq!(event.kind, ContentEventKind::Deleted);
        assert_eq!(event.item.content_type_name(), "Author");
    }
}
