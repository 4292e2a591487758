//! Environment-driven settings.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::warn;

use crate::IndexingError;

const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";
const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";
const DEFAULT_KAFKA_GROUP_ID: &str = "content-indexer";
const DEFAULT_CMS_API_URL: &str = "http://localhost:5000/api/search";
const DEFAULT_INDEX_DEFINITIONS_PATH: &str = "indices.json";
const DEFAULT_ADMIN_ADDR: &str = "0.0.0.0:8090";
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;
const DEFAULT_ENGINE_MAX_BATCH_SIZE: usize = 1000;
const DEFAULT_WORKER_INTERVAL_MS: u64 = 1000;
const DEFAULT_WORKER_MAX_BATCH_SIZE: usize = 100;
const DEFAULT_WORKER_MAX_CONCURRENT_GROUPS: usize = 4;

/// Connection mode for OpenSearch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection on an interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Anything else falls back to retry.
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "retry".to_string())
            .to_lowercase()
            .as_str()
        {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Which search engine backs the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    OpenSearch,
    /// Everything in process memory; for local runs.
    Memory,
}

/// All settings read at startup.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub engine: EngineKind,
    pub opensearch_url: String,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    pub shards: u32,
    pub replicas: u32,
    pub engine_max_batch_size: usize,
    pub kafka_broker: String,
    pub kafka_group_id: String,
    pub content_events_topic: String,
    pub cms_api_url: String,
    pub index_definitions_path: String,
    pub worker_interval: Duration,
    pub worker_max_batch_size: usize,
    pub worker_max_concurrent_groups: usize,
    pub admin_addr: SocketAddr,
}

impl IndexerConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns `None` for unset keys.
    ///
    /// Unparseable numbers fall back to their defaults with a warning; an
    /// unknown engine or an invalid admin address is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let number = |key: &str, default: u64| -> u64 {
            match lookup(key) {
                None => default,
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    warn!(key = key, value = %raw, default = default, "Invalid number, using default");
                    default
                }),
            }
        };

        let engine = match string("SEARCH_ENGINE", "opensearch").to_lowercase().as_str() {
            "opensearch" => EngineKind::OpenSearch,
            "memory" | "in-memory" => EngineKind::Memory,
            other => {
                return Err(IndexingError::config(format!(
                    "Unknown SEARCH_ENGINE '{}', expected 'opensearch' or 'memory'",
                    other
                )))
            }
        };

        let admin_raw = string("ADMIN_ADDR", DEFAULT_ADMIN_ADDR);
        let admin_addr = admin_raw
            .parse::<SocketAddr>()
            .map_err(|e| IndexingError::config(format!("Invalid ADMIN_ADDR '{}': {}", admin_raw, e)))?;

        Ok(Self {
            engine,
            opensearch_url: string("OPENSEARCH_URL", DEFAULT_OPENSEARCH_URL),
            connection_mode: ConnectionMode::parse(lookup("OPENSEARCH_CONNECTION_MODE")),
            retry_interval: Duration::from_secs(number(
                "OPENSEARCH_RETRY_INTERVAL_SECS",
                DEFAULT_RETRY_INTERVAL_SECS,
            )),
            shards: number("OPENSEARCH_SHARDS", 1) as u32,
            replicas: number("OPENSEARCH_REPLICAS", 1) as u32,
            engine_max_batch_size: number(
                "ENGINE_MAX_BATCH_SIZE",
                DEFAULT_ENGINE_MAX_BATCH_SIZE as u64,
            ) as usize,
            kafka_broker: string("KAFKA_BROKER", DEFAULT_KAFKA_BROKER),
            kafka_group_id: string("KAFKA_GROUP_ID", DEFAULT_KAFKA_GROUP_ID),
            content_events_topic: string(
                "CONTENT_EVENTS_TOPIC",
                crate::consumer::DEFAULT_CONTENT_EVENTS_TOPIC,
            ),
            cms_api_url: string("CMS_API_URL", DEFAULT_CMS_API_URL),
            index_definitions_path: string("INDEX_DEFINITIONS_PATH", DEFAULT_INDEX_DEFINITIONS_PATH),
            worker_interval: Duration::from_millis(number(
                "WORKER_INTERVAL_MS",
                DEFAULT_WORKER_INTERVAL_MS,
            )),
            worker_max_batch_size: number(
                "WORKER_MAX_BATCH_SIZE",
                DEFAULT_WORKER_MAX_BATCH_SIZE as u64,
            ) as usize,
            worker_max_concurrent_groups: number(
                "WORKER_MAX_CONCURRENT_GROUPS",
                DEFAULT_WORKER_MAX_CONCURRENT_GROUPS as u64,
            ) as usize,
            admin_addr,
        })
    }
}
