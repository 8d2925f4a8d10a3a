use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use crate::{
    clock::SystemClock,
    events::{hashmap_event_storage::HashMapEventStorage, selectors::TimeWindowSelector},
    server::{config::ServerConfig, documents::HashMapDocumentStore, error::AppError},
};

pub type ServerEventStorage = HashMapEventStorage<TimeWindowSelector>;

pub struct AppState {
    pub config: ServerConfig,
    pub clock: SystemClock,
    pub events: Mutex<ServerEventStorage>,
    pub documents: Mutex<HashMapDocumentStore>,
}

impl AppState {
    /// Builds the state, seeding clients from the configured file if any.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, anyhow::Error> {
        let mut documents = HashMapDocumentStore::new();
        if let Some(path) = &config.clients_file {
            let count = documents.load_clients_file(path)?;
            info!("Loaded {count} clients from {}", path.display());
        }
        Ok(Self::with_stores(config, ServerEventStorage::new(), documents))
    }

    pub fn with_stores(
        config: ServerConfig,
        events: ServerEventStorage,
        documents: HashMapDocumentStore,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            clock: SystemClock,
            events: Mutex::new(events),
            documents: Mutex::new(documents),
        })
    }

    pub fn events(&self) -> Result<MutexGuard<'_, ServerEventStorage>, AppError> {
        self.events
            .lock()
            .map_err(|_| AppError::Storage("event store lock poisoned".to_string()))
    }

    pub fn documents(&self) -> Result<MutexGuard<'_, HashMapDocumentStore>, AppError> {
        self.documents
            .lock()
            .map_err(|_| AppError::Storage("document store lock poisoned".to_string()))
    }
}
