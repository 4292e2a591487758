// Shared state for the admin server
use std::sync::Arc;

use content_indexer_repository::SearchEngine;

use crate::config::IndexDefinitionStore;
use crate::rebuild::RebuildCoordinator;
use crate::registry::IndexRegistry;
use crate::worker::QueueWorker;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<IndexRegistry>,
    pub engine: Arc<dyn SearchEngine>,
    pub coordinator: Arc<RebuildCoordinator>,
    pub worker: Arc<QueueWorker>,
    pub store: Arc<dyn IndexDefinitionStore>,
}
