//! Error types for the content indexer pipeline.

use content_indexer_repository::SearchEngineError;
use thiserror::Error;

/// Errors that can occur in the content indexer pipeline.
#[derive(Error, Debug, Clone)]
pub enum IndexerError {
    /// The logical index is not in the registry.
    #[error("Index '{0}' is not registered")]
    NotRegistered(String),

    /// An index with the same name or identifier is already registered.
    #[error("Index already registered: {0}")]
    AlreadyRegistered(String),

    /// The index definition is unusable (empty name, no languages, ...).
    #[error("Invalid index definition: {0}")]
    InvalidDefinition(String),

    /// The definition names a strategy key nobody registered.
    #[error("Unknown indexing strategy: {0}")]
    UnknownStrategy(String),

    /// A strategy failed to map one item.
    #[error("Mapping error: {0}")]
    MappingError(String),

    /// Error from the search engine.
    #[error("Search engine error: {0}")]
    Engine(#[from] SearchEngineError),

    /// A rebuild could not be started or completed.
    #[error("Rebuild error: {0}")]
    RebuildError(String),

    /// Content query or URL resolution failed.
    #[error("Content error: {0}")]
    ContentError(String),

    /// Reading or writing the index definition store failed.
    #[error("Definition store error: {0}")]
    StoreError(String),

    /// Kafka-related error.
    #[error("Kafka error: {0}")]
    KafkaError(String),

    /// Error parsing or decoding data.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl IndexerError {
    pub fn not_registered(name: impl Into<String>) -> Self {
        Self::NotRegistered(name.into())
    }

    pub fn already_registered(msg: impl Into<String>) -> Self {
        Self::AlreadyRegistered(msg.into())
    }

    pub fn invalid_definition(msg: impl Into<String>) -> Self {
        Self::InvalidDefinition(msg.into())
    }

    pub fn unknown_strategy(key: impl Into<String>) -> Self {
        Self::UnknownStrategy(key.into())
    }

    /// Create a mapping error.
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::MappingError(msg.into())
    }

    /// Create a rebuild error.
    pub fn rebuild(msg: impl Into<String>) -> Self {
        Self::RebuildError(msg.into())
    }

    /// Create a content error.
    pub fn content(msg: impl Into<String>) -> Self {
        Self::ContentError(msg.into())
    }

    /// Create a definition store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    /// Create a Kafka error.
    pub fn kafka(msg: impl Into<String>) -> Self {
        Self::KafkaError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }

    /// Configuration errors fail fast and are never retried.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::NotRegistered(_)
                | Self::AlreadyRegistered(_)
                | Self::InvalidDefinition(_)
                | Self::UnknownStrategy(_)
        )
    }
}

impl From<rdkafka::error::KafkaError> for IndexerError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::KafkaError(err.to_string())
    }
}
