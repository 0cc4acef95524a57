//! `logMessage`: emit a configured log line and pass the run along.

use super::{step_names, HandlerDependencies, StepContext, StepHandler};
use crate::cancellation::CancellationToken;
use crate::core::{payload_keys, PipelineEvent, StepOutcome};
use crate::errors::StepError;
use async_trait::async_trait;
use tracing::info;

const DEFAULT_MESSAGE: &str = "logMessage step";

/// Logs the step's `message` parameter and any `createdFile` from upstream.
pub struct LogMessageHandler {
    deps: HandlerDependencies,
}

impl LogMessageHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(deps: HandlerDependencies) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StepHandler for LogMessageHandler {
    fn step_name(&self) -> &str {
        step_names::LOG_MESSAGE
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
        let message = ctx.step.parameter("message").unwrap_or(DEFAULT_MESSAGE);
        match event.get_non_blank(payload_keys::CREATED_FILE) {
            Some(created_file) => info!(%created_file, "{message}"),
            None => info!("{message}"),
        }

        let next = ctx.next_event(event, [(payload_keys::PROCESS, ctx.pipeline_tag.clone())]);
        cancel.guard(self.deps.bus.publish(next)).await??;
        Ok(StepOutcome::published())
    }
}
