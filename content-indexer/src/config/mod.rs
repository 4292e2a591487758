//! Configuration and dependency initialization.

mod definition_store;
mod dependencies;
mod settings;

pub use definition_store::{IndexDefinitionStore, JsonFileIndexStore};
pub use dependencies::Dependencies;
pub use settings::{ConnectionMode, EngineKind, IndexerConfig};
