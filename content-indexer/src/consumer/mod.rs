//! Consumer module for the content indexer.
//!
//! Provides the Kafka consumer that receives content change events.

mod kafka_consumer;
mod messages;

pub use kafka_consumer::{parse_payload, KafkaConsumer, DEFAULT_CONTENT_EVENTS_TOPIC};
pub use messages::{ContentEvent, ContentEventKind, StreamMessage};
