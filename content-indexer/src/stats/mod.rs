//! Per-index statistics for the admin API.

use serde::Serialize;
use tracing::warn;

use content_indexer_repository::SearchEngine;

use crate::rebuild::{RebuildStatus, RebuildTracker};
use crate::registry::{IndexRegistry, RegisteredIndex};

/// Current state of one logical index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatistics {
    pub index_name: String,
    pub identifier: i32,
    pub alias: String,
    pub strategy_key: String,
    /// Physical index the alias currently points at.
    pub physical_index: Option<String>,
    pub document_count: Option<u64>,
    pub rebuild: RebuildStatus,
    /// Set when the engine could not be asked for the fields above.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Statistics for one registered index. Engine failures end up in `error`.
pub async fn index_statistics(
    entry: &RegisteredIndex,
    engine: &dyn SearchEngine,
    tracker: &RebuildTracker,
) -> IndexStatistics {
    let alias = entry.alias();
    let mut stats = IndexStatistics {
        index_name: entry.name().to_string(),
        identifier: entry.definition.identifier,
        alias: alias.clone(),
        strategy_key: entry.definition.strategy_key.clone(),
        physical_index: None,
        document_count: None,
        rebuild: tracker
            .status(entry.name())
            .unwrap_or_else(|| RebuildStatus::not_started(entry.name())),
        error: None,
    };

    match engine.resolve_alias(&alias).await {
        Ok(Some(physical)) => {
            match engine.document_count(&alias).await {
                Ok(count) => stats.document_count = Some(count),
                Err(e) => {
                    warn!(index = %entry.name(), error = %e, "Failed to count documents");
                    stats.error = Some(e.to_string());
                }
            }
            stats.physical_index = Some(physical);
        }
        Ok(None) => stats.document_count = Some(0),
        Err(e) => {
            warn!(index = %entry.name(), error = %e, "Failed to resolve alias");
            stats.error = Some(e.to_string());
        }
    }
    stats
}

/// Statistics for every registered index, in registration order.
pub async fn collect_statistics(
    registry: &IndexRegistry,
    engine: &dyn SearchEngine,
    tracker: &RebuildTracker,
) -> Vec<IndexStatistics> {
    let mut all = Vec::new();
    for entry in registry.indices() {
        all.push(index_statistics(&entry, engine, tracker).await);
    }
    all
}
