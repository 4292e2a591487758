//! Processor module for the content indexer pipeline.
//!
//! Turns a batch of queued tasks into engine calls: tasks are grouped by
//! target index, mapped through the index strategy, deduplicated, and written
//! as one delete call followed by one upsert call per group.

mod task_processor;

pub use task_processor::{BatchOutcome, ProcessorConfig, TaskProcessor};
