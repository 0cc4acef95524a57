//! Recording doubles for the bus and for step handlers.

use crate::bus::{EventBus, EventHandlerFn};
use crate::cancellation::CancellationToken;
use crate::core::{PipelineEvent, StepOutcome, Topic};
use crate::errors::{BusError, StepError};
use crate::handlers::{StepContext, StepHandler};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An event bus that delivers nothing and remembers everything.
#[derive(Debug, Default)]
pub struct RecordingEventBus {
    subscriptions: Mutex<Vec<Topic>>,
    published: Mutex<Vec<PipelineEvent>>,
    fail_publish: AtomicBool,
}

impl RecordingEventBus {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Topics subscribed so far, in order.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<Topic> {
        self.subscriptions.lock().clone()
    }

    /// Events published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<PipelineEvent> {
        self.published.lock().clone()
    }

    /// Makes subsequent publishes fail.
    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventBus for RecordingEventBus {
    fn subscribe(&self, topic: &Topic, _handler: EventHandlerFn) -> Result<(), BusError> {
        self.subscriptions.lock().push(topic.clone());
        Ok(())
    }

    async fn publish(&self, event: PipelineEvent) -> Result<(), BusError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(BusError::Publish {
                topic: event.topic.to_string(),
                message: "publish disabled by test".to_string(),
            });
        }
        self.published.lock().push(event);
        Ok(())
    }
}

type Responder = Box<dyn Fn() -> Result<StepOutcome, StepError> + Send + Sync>;

/// A step handler that records every context it sees and answers with a
/// fixed responder.
pub struct StubHandler {
    name: String,
    enabled: bool,
    responder: Responder,
    calls: Arc<Mutex<Vec<StepContext>>>,
}

impl StubHandler {
    /// Creates an enabled stub for `name`.
    pub fn new<F>(name: impl Into<String>, responder: F) -> Self
    where
        F: Fn() -> Result<StepOutcome, StepError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            enabled: true,
            responder: Box::new(responder),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Shared handle on the recorded contexts.
    #[must_use]
    pub fn calls(&self) -> Arc<Mutex<Vec<StepContext>>> {
        self.calls.clone()
    }
}

impl std::fmt::Debug for StubHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubHandler")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("calls", &self.calls.lock().len())
            .finish()
    }
}

#[async_trait]
impl StepHandler for StubHandler {
    fn step_name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn handle(
        &self,
        ctx: &StepContext,
        _event: &PipelineEvent,
        _cancel: &CancellationToken,
    ) -> Result<StepOutcome, StepError> {
        self.calls.lock().push(ctx.clone());
        (self.responder)()
    }
}
