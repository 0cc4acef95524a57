//! `postTo`: forward a parsed document to an HTTP endpoint.

use super::{step_names, HandlerDependencies, StepContext, StepHandler};
use crate::cancellation::CancellationToken;
use crate::core::{payload_keys, PipelineEvent, StepOutcome};
use crate::errors::StepError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{info, warn};

/// POSTs the document at `parsedPath` to the step's `destination` URL and
/// records the response status.
pub struct PostToHandler {
    deps: HandlerDependencies,
    client: reqwest::Client,
}

impl PostToHandler {
    /// Creates the handler with a default HTTP client.
    #[must_use]
    pub fn new(deps: HandlerDependencies) -> Self {
        Self::with_client(deps, reqwest::Client::new())
    }

    /// Creates the handler with a preconfigured client.
    #[must_use]
    pub fn with_client(deps: HandlerDependencies, client: reqwest::Client) -> Self {
        Self { deps, client }
    }
}

#[async_trait]
impl StepHandler for PostToHandler {
    fn step_name(&self) -> &str {
        step_names::POST_TO
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
        let Some(destination) = ctx.step.parameters.first_non_blank(&["destination"]) else {
            warn!("destination parameter not set");
            return Ok(StepOutcome::skip("missing destination"));
        };
        let Some(parsed_path) = event.get_non_blank(payload_keys::PARSED_PATH) else {
            warn!("payload has no parsedPath");
            return Ok(StepOutcome::skip("missing parsedPath"));
        };

        info!(%destination, %parsed_path, "post started");
        let body = cancel.guard(self.deps.storage.get(parsed_path)).await??;

        let request = self
            .client
            .post(destination)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send();
        let response = cancel
            .guard(request)
            .await?
            .map_err(|e| StepError::Http(e.to_string()))?;
        let status = response.status().as_u16();
        let response_bytes = cancel
            .guard(response.bytes())
            .await?
            .map_or(0, |b| b.len());
        info!(status, response_bytes, "post completed");

        let next = ctx.next_event(event, [(payload_keys::STATUS, status.to_string())]);
        cancel.guard(self.deps.bus.publish(next)).await??;
        Ok(StepOutcome::published())
    }
}
