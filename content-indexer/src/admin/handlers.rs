// HTTP request handlers for the admin API
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use content_indexer_shared::IndexDefinition;

use crate::admin::state::AppState;
use crate::errors::IndexerError;
use crate::rebuild::RebuildStatus;
use crate::stats::collect_statistics;

type Reply = (StatusCode, Json<Value>);

/// Map an error to a status code; the message is passed through unchanged.
fn error_reply(e: &IndexerError) -> Reply {
    let status = match e {
        IndexerError::NotRegistered(_) => StatusCode::NOT_FOUND,
        e if e.is_configuration_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({
            "status": "error",
            "message": e.to_string()
        })),
    )
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Reply {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "indices": state.registry.len(),
            "queue_depth": state.worker.queue().len()
        })),
    )
}

/// Every registered index with its alias target, document count and rebuild state
pub async fn list_indices(State(state): State<AppState>) -> Reply {
    let stats = collect_statistics(
        &state.registry,
        state.engine.as_ref(),
        state.coordinator.tracker(),
    )
    .await;
    (StatusCode::OK, Json(json!({ "indices": stats })))
}

/// Replace all index definitions.
///
/// The new set is validated, persisted, then swapped into the registry.
/// Indices without a physical index get one.
pub async fn replace_indices(
    State(state): State<AppState>,
    Json(definitions): Json<Vec<IndexDefinition>>,
) -> Reply {
    if let Err(e) = state.registry.validate_indices(&definitions) {
        warn!(error = %e, "Rejected index definitions");
        return error_reply(&e);
    }
    if let Err(e) = state.store.save(&definitions).await {
        error!(error = %e, "Failed to persist index definitions");
        return error_reply(&e);
    }
    let count = definitions.len();
    if let Err(e) = state.registry.set_indices(definitions) {
        return error_reply(&e);
    }

    let mut created = Vec::new();
    let mut failed = Vec::new();
    for (name, result) in state.coordinator.ensure_all().await {
        match result {
            Ok(true) => created.push(name),
            Ok(false) => {}
            Err(e) => failed.push(json!({ "index": name, "message": e.to_string() })),
        }
    }

    info!(count = count, created = created.len(), failed = failed.len(), "Replaced index definitions");
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "indices": count,
            "created": created,
            "failed": failed
        })),
    )
}

/// Start a rebuild of one index
pub async fn start_rebuild(State(state): State<AppState>, Path(name): Path<String>) -> Reply {
    if state.registry.is_registered(&name) && state.coordinator.tracker().is_active(&name) {
        return (
            StatusCode::CONFLICT,
            Json(json!({
                "status": "error",
                "message": format!("A rebuild of '{}' is already in progress", name)
            })),
        );
    }

    match state.coordinator.start_rebuild(&name).await {
        Ok(rebuild) => {
            state.worker.request_flush();
            (
                StatusCode::ACCEPTED,
                Json(json!({
                    "status": "accepted",
                    "logical_index_name": rebuild.logical_index_name,
                    "old_physical_index_name": rebuild.old_physical_index_name,
                    "new_physical_index_name": rebuild.new_physical_index_name
                })),
            )
        }
        Err(e) => {
            error!(index = %name, error = %e, "Failed to start rebuild");
            error_reply(&e)
        }
    }
}

/// Latest rebuild status of one index
pub async fn rebuild_status(State(state): State<AppState>, Path(name): Path<String>) -> Reply {
    let entry = match state.registry.get_required_index(&name) {
        Ok(entry) => entry,
        Err(e) => return error_reply(&e),
    };
    let status = state
        .coordinator
        .tracker()
        .status(entry.name())
        .unwrap_or_else(|| RebuildStatus::not_started(entry.name()));
    (StatusCode::OK, Json(json!(status)))
}

/// Ask the queue worker to drain now
pub async fn flush_queue(State(state): State<AppState>) -> Reply {
    state.worker.request_flush();
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "accepted",
            "queue_depth": state.worker.queue().len()
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexDefinitionStore, JsonFileIndexStore};
    use crate::content::InMemoryContent;
    use crate::processor::TaskProcessor;
    use crate::queue::TaskQueue;
    use crate::rebuild::{RebuildCoordinator, RebuildTracker};
    use crate::registry::IndexRegistry;
    use crate::strategy::StrategyRegistry;
    use crate::worker::{QueueWorker, WorkerConfig};
    use content_indexer_repository::InMemorySearchEngine;
    use content_indexer_shared::IncludedPath;
    use std::sync::Arc;

    struct Fixture {
        state: AppState,
        engine: Arc<InMemorySearchEngine>,
        store: Arc<JsonFileIndexStore>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileIndexStore::new(dir.path().join("indices.json")));
        let registry = Arc::new(IndexRegistry::new(Arc::new(StrategyRegistry::with_defaults())));
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
        let processor = Arc::new(TaskProcessor::new(
            registry.clone(),
            engine.clone(),
            content,
            coordinator.clone(),
        ));
        let worker = Arc::new(QueueWorker::new(queue, processor, WorkerConfig::default()));
        let state = AppState {
            registry,
            engine: engine.clone(),
            coordinator,
            worker,
            store: store.clone(),
        };
        Fixture {
            state,
            engine,
            store,
            _dir: dir,
        }
    }

    fn blog() -> IndexDefinition {
        IndexDefinition::new(1, "Blog", "main")
            .with_languages(["en"])
            .with_path(IncludedPath::new("/blog/%"))
    }

    #[tokio::test]
    async fn test_replace_indices_persists_registers_and_bootstraps() {
        let f = fixture();

        let (status, Json(body)) =
            replace_indices(State(f.state.clone()), Json(vec![blog()])).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["created"], json!(["Blog"]));
        assert!(f.state.registry.is_registered("blog"));
        assert_eq!(f.store.load().await.unwrap(), vec![blog()]);
        assert!(f.engine.alias_target("blog").is_some());
    }

    #[tokio::test]
    async fn test_replace_indices_rejects_invalid_set() {
        let f = fixture();
        let duplicate = IndexDefinition::new(2, "BLOG", "main").with_languages(["en"]);

        let (status, Json(body)) =
            replace_indices(State(f.state.clone()), Json(vec![blog(), duplicate])).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(f.state.registry.is_empty());
        assert!(f.store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_endpoints() {
        let f = fixture();
        f.state.registry.add_index(blog()).unwrap();

        let (status, _) = start_rebuild(State(f.state.clone()), Path("missing".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, Json(body)) =
            start_rebuild(State(f.state.clone()), Path("blog".to_string())).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body["new_physical_index_name"]
            .as_str()
            .unwrap()
            .starts_with("blog_v"));

        let (status, _) = start_rebuild(State(f.state.clone()), Path("Blog".to_string())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, Json(body)) =
            rebuild_status(State(f.state.clone()), Path("BLOG".to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "backfilling");
    }

    #[tokio::test]
    async fn test_health_list_and_flush() {
        let f = fixture();
        f.state.registry.add_index(blog()).unwrap();

        let (status, Json(body)) = health_check(State(f.state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["indices"], 1);

        let (status, Json(body)) = list_indices(State(f.state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["indices"][0]["index_name"], "Blog");

        let (status, _) = flush_queue(State(f.state.clone())).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    #[test]
    fn test_engine_errors_keep_message() {
        let error = IndexerError::from(
            content_indexer_repository::SearchEngineError::alias("Alias 'blog' is busy"),
        );
        let (status, Json(body)) = error_reply(&error);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], error.to_string());
    }
}
