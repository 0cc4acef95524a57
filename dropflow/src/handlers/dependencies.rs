//! Shared collaborators handed to every built-in handler.

use super::{
    FtpScanHandler, LogMessageHandler, LogSinkHandler, ParseCsvHandler, StepHandler,
};
use crate::bus::EventBus;
use crate::config::PipelineSettings;
use crate::remote::RemoteConnector;
use crate::storage::{ObjectStorage, StateStore};
use std::sync::Arc;

/// Collaborators shared by the built-in handlers.
#[derive(Clone)]
pub struct HandlerDependencies {
    /// Bus to publish continuation messages on.
    pub bus: Arc<dyn EventBus>,
    /// Raw and parsed file storage.
    pub storage: Arc<dyn ObjectStorage>,
    /// Processed-file markers.
    pub state: Arc<dyn StateStore>,
    /// Remote source factory.
    pub connector: Arc<dyn RemoteConnector>,
    /// Process settings.
    pub settings: Arc<PipelineSettings>,
}

impl std::fmt::Debug for HandlerDependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDependencies")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Every built-in handler. `postTo` is included when the `http` feature is on.
#[must_use]
pub fn default_handlers(deps: &HandlerDependencies) -> Vec<Arc<dyn StepHandler>> {
    #[allow(unused_mut)]
    let mut handlers: Vec<Arc<dyn StepHandler>> = vec![
        Arc::new(FtpScanHandler::new(deps.clone())),
        Arc::new(ParseCsvHandler::new(deps.clone())),
        Arc::new(LogSinkHandler::new(deps.clone())),
        Arc::new(LogMessageHandler::new(deps.clone())),
    ];
    #[cfg(feature = "http")]
    handlers.push(Arc::new(super::PostToHandler::new(deps.clone())));
    handlers
}
