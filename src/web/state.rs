//! # Web API Application State
//!
//! Shared, cheaply clonable handles to the store, the services built on it,
//! the event publisher and the loaded configuration.

use std::sync::Arc;
use tracing::info;

use crate::config::{LimsConfig, StorageBackend};
use crate::database::{Fixtures, InMemoryStore, LimsStore, PgStore};
use crate::error::Result;
use crate::events::EventPublisher;
use crate::services::{TestTaskService, WorkflowEngine};

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<LimsConfig>,
    pub store: Arc<dyn LimsStore>,
    pub engine: Arc<WorkflowEngine>,
    pub tasks: Arc<TestTaskService>,
    pub publisher: EventPublisher,
}

impl AppState {
    /// Wire services over an existing store
    pub fn new(store: Arc<dyn LimsStore>, config: LimsConfig) -> Self {
        let publisher = EventPublisher::new(config.events.channel_capacity);
        let engine = WorkflowEngine::new(store.clone(), publisher.clone())
            .with_assign_retry_limit(config.workflow.assign_retry_limit);
        let tasks = TestTaskService::new(store.clone());

        Self {
            config: Arc::new(config),
            store,
            engine: Arc::new(engine),
            tasks: Arc::new(tasks),
            publisher,
        }
    }

    /// Build the configured store backend, then wire services over it
    pub async fn from_config(config: LimsConfig) -> Result<Self> {
        let store: Arc<dyn LimsStore> = match config.database.backend {
            StorageBackend::Postgres => {
                let store = PgStore::connect(&config.database).await?;
                if config.database.run_migrations {
                    store.migrate().await?;
                }
                Arc::new(store)
            }
            StorageBackend::Memory => {
                let store = InMemoryStore::new();
                if let Some(path) = &config.database.fixtures_path {
                    store.load_fixtures(Fixtures::from_path(path)?);
                    info!(fixtures = %path.display(), "Loaded fixtures into memory store");
                }
                Arc::new(store)
            }
        };

        info!(backend = ?config.database.backend, "Storage backend ready");
        Ok(Self::new(store, config))
    }
}
