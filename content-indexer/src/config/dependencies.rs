//! Dependency initialization and wiring for the content indexer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::time::sleep;
use tracing::{info, warn};

use content_indexer_repository::opensearch::IndexConfig;
use content_indexer_repository::{
    InMemorySearchEngine, OpenSearchProvider, SearchEngine, SearchEngineError,
    SearchEngineService, SearchEngineServiceConfig,
};

use crate::admin::{self, state::AppState};
use crate::config::{
    ConnectionMode, EngineKind, IndexDefinitionStore, IndexerConfig, JsonFileIndexStore,
};
use crate::consumer::KafkaConsumer;
use crate::content::HttpContentClient;
use crate::logger::TaskLogger;
use crate::orchestrator::Orchestrator;
use crate::processor::{ProcessorConfig, TaskProcessor};
use crate::queue::TaskQueue;
use crate::rebuild::{RebuildCoordinator, RebuildTracker};
use crate::registry::IndexRegistry;
use crate::strategy::StrategyRegistry;
use crate::worker::{QueueWorker, WorkerConfig};
use crate::IndexingError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    /// Admin API router.
    pub admin_app: Router,
    pub admin_addr: SocketAddr,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables, with the
    /// built-in strategies only.
    pub async fn new() -> Result<Self, IndexingError> {
        Self::with_strategies(IndexerConfig::from_env()?, StrategyRegistry::with_defaults()).await
    }

    /// Initialize all dependencies.
    ///
    /// Loads the index definitions, connects to the search engine, makes sure
    /// every registered index has a physical index behind its alias, and
    /// wires the pipeline.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If initialization fails (engine connection errors only in fail-fast mode)
    pub async fn with_strategies(
        config: IndexerConfig,
        strategies: StrategyRegistry,
    ) -> Result<Self, IndexingError> {
        info!(
            engine = ?config.engine,
            opensearch_url = %config.opensearch_url,
            kafka_broker = %config.kafka_broker,
            kafka_group_id = %config.kafka_group_id,
            topic = %config.content_events_topic,
            cms_api_url = %config.cms_api_url,
            connection_mode = ?config.connection_mode,
            "Initializing dependencies"
        );

        let store: Arc<dyn IndexDefinitionStore> =
            Arc::new(JsonFileIndexStore::new(&config.index_definitions_path));
        let definitions = store.load().await?;

        let registry = Arc::new(IndexRegistry::new(Arc::new(strategies)));
        registry.set_indices(definitions)?;
        info!(indices = registry.len(), "Index registry loaded");

        let provider = Self::create_engine(&config).await?;
        let engine: Arc<dyn SearchEngine> = Arc::new(SearchEngineService::with_config(
            provider,
            SearchEngineServiceConfig::with_max_batch_size(config.engine_max_batch_size),
        ));

        let content = Arc::new(HttpContentClient::new(&config.cms_api_url)?);
        let queue = Arc::new(TaskQueue::new(registry.clone()));
        let coordinator = Arc::new(RebuildCoordinator::new(
            registry.clone(),
            engine.clone(),
            content.clone(),
            queue.clone(),
            Arc::new(RebuildTracker::new()),
        ));

        // Indices that cannot be bootstrapped are logged; the rest still start.
        coordinator.ensure_all().await;

        let processor = Arc::new(TaskProcessor::with_config(
            registry.clone(),
            engine.clone(),
            content,
            coordinator.clone(),
            ProcessorConfig {
                max_concurrent_groups: config.worker_max_concurrent_groups,
            },
        ));
        let worker = Arc::new(QueueWorker::new(
            queue.clone(),
            processor,
            WorkerConfig {
                interval: config.worker_interval,
                max_batch_size: config.worker_max_batch_size,
            },
        ));

        let consumer = KafkaConsumer::new(
            &config.kafka_broker,
            &config.kafka_group_id,
            &config.content_events_topic,
        )
        .map_err(|e| IndexingError::config(format!("Failed to create Kafka consumer: {}", e)))?;
        info!("Kafka consumer created");

        let task_logger = TaskLogger::new(registry.clone(), queue);
        let orchestrator = Orchestrator::new(Arc::new(consumer), task_logger, worker.clone());

        let admin_app = admin::create_app(AppState {
            registry,
            engine,
            coordinator,
            worker,
            store,
        });

        Ok(Self {
            orchestrator,
            admin_app,
            admin_addr: config.admin_addr,
        })
    }

    async fn create_engine(config: &IndexerConfig) -> Result<Arc<dyn SearchEngine>, IndexingError> {
        match config.engine {
            EngineKind::Memory => {
                warn!("Using the in-memory search engine; indexed documents are not persisted");
                Ok(Arc::new(InMemorySearchEngine::new()))
            }
            EngineKind::OpenSearch => {
                let provider = Self::connect_to_opensearch(
                    &config.opensearch_url,
                    IndexConfig::new(config.shards, config.replicas),
                    config.connection_mode,
                    config.retry_interval,
                )
                .await?;
                info!("OpenSearch connection established");
                Ok(Arc::new(provider))
            }
        }
    }

    /// Connect to OpenSearch with retry logic based on connection mode.
    async fn connect_to_opensearch(
        url: &str,
        index_config: IndexConfig,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<OpenSearchProvider, IndexingError> {
        loop {
            match Self::try_connect_opensearch(url, index_config).await {
                Ok(provider) => return Ok(provider),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(IndexingError::config(format!(
                            "Failed to connect to OpenSearch: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to OpenSearch, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }

    /// Create the provider and check that the cluster answers.
    async fn try_connect_opensearch(
        url: &str,
        index_config: IndexConfig,
    ) -> Result<OpenSearchProvider, SearchEngineError> {
        let provider = OpenSearchProvider::new(url, index_config).await?;
        provider.ping().await?;
        Ok(provider)
    }
}
