//! In-memory collaborators wired for handler tests.

use crate::bus::EventBus;
use crate::config::PipelineSettings;
use crate::definition::PipelineDefinitionRegistry;
use crate::handlers::HandlerDependencies;
use crate::remote::{InMemoryConnector, InMemoryRemoteSource};
use crate::storage::{InMemoryObjectStorage, InMemoryStateStore};
use std::sync::Arc;

/// In-memory storage, state and remote source around one registry.
#[derive(Debug)]
pub struct InMemoryHarness {
    /// Definition registry.
    pub registry: Arc<PipelineDefinitionRegistry>,
    /// Object storage.
    pub storage: Arc<InMemoryObjectStorage>,
    /// Processed markers.
    pub state: Arc<InMemoryStateStore>,
    /// Remote file tree.
    pub remote: Arc<InMemoryRemoteSource>,
    /// Connector over `remote`.
    pub connector: Arc<InMemoryConnector>,
    /// Settings.
    pub settings: Arc<PipelineSettings>,
}

impl InMemoryHarness {
    /// Creates a harness with default settings.
    #[must_use]
    pub fn new(registry: PipelineDefinitionRegistry) -> Self {
        Self::with_settings(registry, PipelineSettings::default())
    }

    /// Creates a harness with explicit settings.
    #[must_use]
    pub fn with_settings(registry: PipelineDefinitionRegistry, settings: PipelineSettings) -> Self {
        let remote = Arc::new(InMemoryRemoteSource::new());
        Self {
            registry: Arc::new(registry),
            storage: Arc::new(InMemoryObjectStorage::new()),
            state: Arc::new(InMemoryStateStore::new()),
            connector: Arc::new(InMemoryConnector::new(remote.clone())),
            remote,
            settings: Arc::new(settings),
        }
    }

    /// Handler dependencies publishing on `bus`.
    #[must_use]
    pub fn dependencies(&self, bus: Arc<dyn EventBus>) -> HandlerDependencies {
        HandlerDependencies {
            bus,
            storage: self.storage.clone(),
            state: self.state.clone(),
            connector: self.connector.clone(),
            settings: self.settings.clone(),
        }
    }
}
