//! The per-message boundary between the bus and a handler.

use super::{StepContext, StepHandler};
use crate::bus::EventHandlerFn;
use crate::cancellation::CancellationToken;
use crate::core::{MessageState, PipelineEvent, StepOutcome};
use crate::definition::PipelineDefinitionRegistry;
use crate::errors::StepError;
use crate::observability::SpanTimer;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

/// How one message ended.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    /// Final lifecycle state.
    pub state: MessageState,
    /// Handler outcome, when it returned normally.
    pub outcome: Option<StepOutcome>,
    /// Error text, when the message failed.
    pub error: Option<String>,
    /// Handler wall time.
    pub duration_ms: f64,
}

/// Wraps a handler so that every delivery resolves context, runs inside a
/// span, and ends in a logged terminal state without propagating errors.
pub struct StepDispatcher {
    handler: Arc<dyn StepHandler>,
    registry: Arc<PipelineDefinitionRegistry>,
}

impl StepDispatcher {
    /// Creates a dispatcher for `handler`.
    #[must_use]
    pub fn new(handler: Arc<dyn StepHandler>, registry: Arc<PipelineDefinitionRegistry>) -> Self {
        Self { handler, registry }
    }

    /// Step type served.
    #[must_use]
    pub fn step_name(&self) -> &str {
        self.handler.step_name()
    }

    /// Processes one message to a terminal state.
    pub async fn dispatch(&self, event: PipelineEvent, cancel: &CancellationToken) -> DispatchReport {
        let step_name = self.handler.step_name();
        let timer = SpanTimer::start(step_name);
        let state = MessageState::Received;

        let ctx = match StepContext::resolve(&self.registry, step_name, &event) {
            Ok(ctx) => ctx,
            Err(e) => {
                error!(
                    step = step_name,
                    topic = %event.topic,
                    correlation_id = %event.correlation_id,
                    kind = ?e.kind(),
                    error = %e,
                    "could not resolve step context; message dropped"
                );
                return DispatchReport {
                    state: state.advance(MessageState::Failed),
                    outcome: None,
                    error: Some(e.to_string()),
                    duration_ms: timer.finish(),
                };
            }
        };

        let state = state.advance(MessageState::ContextResolved);
        let span = ctx.span();
        self.run(ctx, event, cancel, state, timer)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        ctx: StepContext,
        event: PipelineEvent,
        cancel: &CancellationToken,
        state: MessageState,
        timer: SpanTimer,
    ) -> DispatchReport {
        let state = state.advance(MessageState::Processing);
        debug!("processing message");

        let result = self.handler.handle(&ctx, &event, cancel).await;
        let duration_ms = timer.finish();

        match result {
            Ok(outcome) if outcome.is_published() => {
                info!(duration_ms, ?outcome, "step published");
                if ctx.is_last_step {
                    info!("pipeline run completed");
                }
                DispatchReport {
                    state: state.advance(MessageState::Published),
                    outcome: Some(outcome),
                    error: None,
                    duration_ms,
                }
            }
            Ok(outcome) => {
                if let StepOutcome::Skipped { reason } = &outcome {
                    info!(duration_ms, %reason, "step skipped");
                }
                DispatchReport {
                    state: state.advance(MessageState::Skipped),
                    outcome: Some(outcome),
                    error: None,
                    duration_ms,
                }
            }
            Err(StepError::Cancelled(cancelled)) => {
                warn!(duration_ms, reason = %cancelled.reason, "step cancelled; message dropped");
                DispatchReport {
                    state: state.advance(MessageState::Failed),
                    outcome: None,
                    error: Some(cancelled.to_string()),
                    duration_ms,
                }
            }
            Err(e) => {
                error!(duration_ms, error = %e, "step failed; message dropped");
                DispatchReport {
                    state: state.advance(MessageState::Failed),
                    outcome: None,
                    error: Some(e.to_string()),
                    duration_ms,
                }
            }
        }
    }

    /// Adapts the dispatcher to the bus callback shape.
    #[must_use]
    pub fn into_handler_fn(self: Arc<Self>) -> EventHandlerFn {
        Arc::new(move |event, cancel| {
            let dispatcher = self.clone();
            async move {
                dispatcher.dispatch(event, &cancel).await;
            }
            .boxed()
        })
    }
}

impl std::fmt::Debug for StepDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDispatcher")
            .field("step", &self.handler.step_name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StorageError;
    use crate::testing::{event_on, orders_registry, StubHandler};
    use pretty_assertions::assert_eq;

    fn dispatcher(handler: StubHandler) -> StepDispatcher {
        StepDispatcher::new(Arc::new(handler), Arc::new(orders_registry()))
    }

    #[tokio::test]
    async fn test_published() {
        let handler = StubHandler::new("log", || Ok(StepOutcome::published()));
        let calls = handler.calls();
        let report = dispatcher(handler)
            .dispatch(event_on("orders.parsed", &[]), &CancellationToken::new())
            .await;

        assert_eq!(report.state, MessageState::Published);
        assert_eq!(report.outcome, Some(StepOutcome::published()));
        assert_eq!(calls.lock().len(), 1);
        assert_eq!(calls.lock()[0].pipeline_tag, "orders");
        assert!(calls.lock()[0].is_last_step);
    }

    #[tokio::test]
    async fn test_skipped() {
        let handler = StubHandler::new("parseCsvToJsonArray", || Ok(StepOutcome::skip("empty csv")));
        let report = dispatcher(handler)
            .dispatch(event_on("orders.scan", &[]), &CancellationToken::new())
            .await;
        assert_eq!(report.state, MessageState::Skipped);
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_handler_error_is_contained() {
        let handler = StubHandler::new("parseCsvToJsonArray", || {
            Err(StorageError::Backend("down".to_string()).into())
        });
        let report = dispatcher(handler)
            .dispatch(event_on("orders.scan", &[]), &CancellationToken::new())
            .await;
        assert_eq!(report.state, MessageState::Failed);
        assert!(report.error.unwrap().contains("down"));
    }

    #[tokio::test]
    async fn test_unresolvable_topic_fails_without_calling_handler() {
        let handler = StubHandler::new("log", || Ok(StepOutcome::published()));
        let calls = handler.calls();
        let report = dispatcher(handler)
            .dispatch(event_on("nowhere.topic", &[]), &CancellationToken::new())
            .await;
        assert_eq!(report.state, MessageState::Failed);
        assert!(calls.lock().is_empty());
    }
}
