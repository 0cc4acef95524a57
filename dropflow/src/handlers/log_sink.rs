//! `log`: load a parsed document and report it.

use super::{step_names, HandlerDependencies, StepContext, StepHandler};
use crate::cancellation::CancellationToken;
use crate::core::{payload_keys, PipelineEvent, StepOutcome};
use crate::errors::StepError;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

/// Logs the item count of the parsed document, or the document itself when
/// `sink.logJson` is set.
pub struct LogSinkHandler {
    deps: HandlerDependencies,
}

impl LogSinkHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(deps: HandlerDependencies) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StepHandler for LogSinkHandler {
    fn step_name(&self) -> &str {
        step_names::LOG
    }

    fn enabled(&self) -> bool {
        self.deps.settings.is_handler_enabled(self.step_name())
    }

    async fn handle(
        &self,
        ctx: &StepContext,
        event: &PipelineEvent,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome, StepError> {
        let Some(parsed_path) = event.get_non_blank(payload_keys::PARSED_PATH) else {
            warn!("payload has no parsedPath");
            return Ok(StepOutcome::skip("missing parsedPath"));
        };

        if event.is_duplicate() {
            info!("duplicate file content reached the sink");
        }

        let raw = cancel.guard(self.deps.storage.get(parsed_path)).await??;
        let document: Value = serde_json::from_slice(&raw)?;
        let items = document.as_array().map_or(0, Vec::len);

        if self.deps.settings.sink.log_json {
            let pretty = serde_json::to_string_pretty(&document)?;
            info!(%parsed_path, items, "parsed json:\n{pretty}");
        } else {
            info!(%parsed_path, items, "parsed json loaded");
        }

        let next = ctx.next_event(event, std::iter::empty::<(String, String)>());
        cancel.guard(self.deps.bus.publish(next)).await??;
        Ok(StepOutcome::published())
    }
}
