//! Process wiring: builds handlers, orchestrator and triggers around one
//! set of collaborators, and runs them until cancelled.

use crate::bus::EventBus;
use crate::cancellation::CancellationToken;
use crate::config::PipelineSettings;
use crate::definition::PipelineDefinitionRegistry;
use crate::errors::DropflowError;
use crate::handlers::{default_handlers, HandlerDependencies};
use crate::orchestrator::{PipelineOrchestrator, Subscription};
use crate::remote::RemoteConnector;
use crate::storage::{ObjectStorage, ObjectStorageStateStore, StateStore};
use crate::trigger::{IterationStore, ManualTrigger, PeriodicScheduler, TriggerService};
use std::sync::Arc;
use tracing::info;

/// External systems the runtime talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Message bus.
    pub bus: Arc<dyn EventBus>,
    /// Object storage for raw and parsed files.
    pub storage: Arc<dyn ObjectStorage>,
    /// Processed-file ledger.
    pub state: Arc<dyn StateStore>,
    /// Remote source factory.
    pub connector: Arc<dyn RemoteConnector>,
}

impl Collaborators {
    /// Uses `storage` for both files and processed markers, the markers
    /// living under the configured state prefix.
    #[must_use]
    pub fn with_object_state(
        bus: Arc<dyn EventBus>,
        storage: Arc<dyn ObjectStorage>,
        connector: Arc<dyn RemoteConnector>,
        settings: &PipelineSettings,
    ) -> Self {
        let state = Arc::new(ObjectStorageStateStore::new(
            storage.clone(),
            &settings.ftp_detection.state_store.prefix,
        ));
        Self {
            bus,
            storage,
            state,
            connector,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Every long-lived component of a dropflow process.
#[derive(Debug)]
pub struct PipelineRuntime {
    settings: Arc<PipelineSettings>,
    registry: Arc<PipelineDefinitionRegistry>,
    orchestrator: Arc<PipelineOrchestrator>,
    triggers: Arc<TriggerService>,
    scheduler: Arc<PeriodicScheduler>,
    manual: Arc<ManualTrigger>,
}

impl PipelineRuntime {
    /// Builds the built-in handlers and trigger sources.
    #[must_use]
    pub fn new(
        settings: PipelineSettings,
        registry: PipelineDefinitionRegistry,
        collaborators: Collaborators,
    ) -> Self {
        let settings = Arc::new(settings);
        let registry = Arc::new(registry);

        let deps = HandlerDependencies {
            bus: collaborators.bus.clone(),
            storage: collaborators.storage,
            state: collaborators.state,
            connector: collaborators.connector,
            settings: settings.clone(),
        };
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            collaborators.bus.clone(),
            registry.clone(),
            default_handlers(&deps),
        ));

        let triggers = Arc::new(TriggerService::new(
            collaborators.bus,
            Arc::new(IterationStore::new()),
        ));
        let scheduler = Arc::new(PeriodicScheduler::new(
            registry.clone(),
            triggers.clone(),
            settings.clone(),
        ));
        let manual = Arc::new(ManualTrigger::new(
            registry.clone(),
            triggers.clone(),
            settings.ftp_detection.trigger_mode,
        ));

        Self {
            settings,
            registry,
            orchestrator,
            triggers,
            scheduler,
            manual,
        }
    }

    /// Process settings.
    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Loaded definitions.
    #[must_use]
    pub fn registry(&self) -> &Arc<PipelineDefinitionRegistry> {
        &self.registry
    }

    /// Handler registration.
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<PipelineOrchestrator> {
        &self.orchestrator
    }

    /// Trigger publisher shared by the scheduler and manual triggers.
    #[must_use]
    pub fn triggers(&self) -> &Arc<TriggerService> {
        &self.triggers
    }

    /// On-demand trigger for operator requests.
    #[must_use]
    pub fn manual_trigger(&self) -> &Arc<ManualTrigger> {
        &self.manual
    }

    /// Background worker for this runtime.
    #[must_use]
    pub fn worker(&self) -> PipelineWorker {
        PipelineWorker {
            orchestrator: self.orchestrator.clone(),
            scheduler: self.scheduler.clone(),
            settings: self.settings.clone(),
        }
    }
}

/// Registers handlers once, then drives the scheduler until cancelled.
#[derive(Debug)]
pub struct PipelineWorker {
    orchestrator: Arc<PipelineOrchestrator>,
    scheduler: Arc<PeriodicScheduler>,
    settings: Arc<PipelineSettings>,
}

impl PipelineWorker {
    /// Runs until `cancel` fires. Handler registration failures are fatal.
    pub async fn run(&self, cancel: Arc<CancellationToken>) -> Result<Vec<Subscription>, DropflowError> {
        info!("pipeline worker started");
        let subscriptions = self.orchestrator.register_handlers()?;
        info!(trigger_mode = %self.settings.ftp_detection.trigger_mode, "trigger mode");

        let runs = self.scheduler.run(cancel.clone()).await;
        if !cancel.is_cancelled() {
            info!(runs, "scheduler idle; waiting for shutdown");
        }

        cancel.cancelled().await;
        info!(reason = %cancel.reason().unwrap_or_default(), "pipeline worker stopped");
        Ok(subscriptions)
    }
}
