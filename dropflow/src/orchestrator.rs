//! Binds step handlers to their topics on the bus.
//!
//! Registration happens once at startup. Each enabled handler is wrapped in
//! a [`StepDispatcher`] and subscribed to every topic it consumes; nothing
//! is re-subscribed afterwards.

use crate::bus::EventBus;
use crate::core::Topic;
use crate::definition::PipelineDefinitionRegistry;
use crate::errors::BusError;
use crate::handlers::{StepDispatcher, StepHandler};
use std::sync::Arc;
use tracing::{info, warn};

const UNATTRIBUTED: &str = "unattributed";

/// One topic bound to one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Subscribed topic.
    pub topic: Topic,
    /// Step type of the handler.
    pub step: String,
    /// Pipeline the topic feeds, when exactly one does.
    pub pipeline: Option<String>,
}

/// Owns the handler set and wires it to the bus.
pub struct PipelineOrchestrator {
    bus: Arc<dyn EventBus>,
    registry: Arc<PipelineDefinitionRegistry>,
    handlers: Vec<Arc<dyn StepHandler>>,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.handlers.iter().map(|h| h.step_name()).collect();
        f.debug_struct("PipelineOrchestrator")
            .field("handlers", &names)
            .finish_non_exhaustive()
    }
}

impl PipelineOrchestrator {
    /// Creates an orchestrator over `handlers`.
    #[must_use]
    pub fn new(
        bus: Arc<dyn EventBus>,
        registry: Arc<PipelineDefinitionRegistry>,
        handlers: Vec<Arc<dyn StepHandler>>,
    ) -> Self {
        Self {
            bus,
            registry,
            handlers,
        }
    }

    /// Registered handlers, enabled or not.
    #[must_use]
    pub fn handlers(&self) -> &[Arc<dyn StepHandler>] {
        &self.handlers
    }

    /// Subscribes every enabled handler to each of its topics.
    ///
    /// Returns the bindings made. A bus failure aborts registration.
    pub fn register_handlers(&self) -> Result<Vec<Subscription>, BusError> {
        let mut subscriptions = Vec::new();

        for handler in &self.handlers {
            let step = handler.step_name().to_string();
            if !handler.enabled() {
                info!(step = %step, "handler disabled; not subscribed");
                continue;
            }

            let topics = handler.topics(&self.registry);
            if topics.is_empty() {
                warn!(step = %step, "no pipeline uses this step; not subscribed");
                continue;
            }

            let dispatcher = Arc::new(StepDispatcher::new(handler.clone(), self.registry.clone()));
            for topic in topics {
                let pipeline = self
                    .registry
                    .resolve_by_input_topic(&step, topic.as_str(), None)
                    .ok()
                    .map(|def| def.tag.clone());

                self.bus.subscribe(&topic, dispatcher.clone().into_handler_fn())?;
                info!(
                    pipeline = pipeline.as_deref().unwrap_or(UNATTRIBUTED),
                    step = %step,
                    topic = %topic,
                    "handler subscribed"
                );

                subscriptions.push(Subscription {
                    topic,
                    step: step.clone(),
                    pipeline,
                });
            }
        }

        info!(count = subscriptions.len(), "handler registration complete");
        Ok(subscriptions)
    }
}
