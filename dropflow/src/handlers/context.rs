//! Per-message run context.

use crate::core::{payload_keys, PipelineEvent, Topic};
use crate::definition::{PipelineDefinitionRegistry, PipelineStep};
use crate::errors::ResolutionError;
use tracing::{info_span, Span};

/// Everything a handler needs to know about where a message sits in its run.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Owning pipeline.
    pub pipeline_tag: String,
    /// Configuration of the step being executed.
    pub step: PipelineStep,
    /// Topic the message arrived on.
    pub input_topic: Topic,
    /// Run counter carried by the payload.
    pub iteration: Option<String>,
    /// Run-scoped identifier.
    pub correlation_id: String,
    /// Whether this step ends the chain.
    pub is_last_step: bool,
}

impl StepContext {
    /// Resolves the pipeline and step for `event`, using the payload's
    /// `pipelineTag` as a hint when present.
    pub fn resolve(
        registry: &PipelineDefinitionRegistry,
        step_name: &str,
        event: &PipelineEvent,
    ) -> Result<Self, ResolutionError> {
        let resolved =
            registry.resolve_step(step_name, event.topic.as_str(), event.pipeline_tag())?;
        Ok(Self {
            pipeline_tag: resolved.definition.tag.clone(),
            step: resolved.step.clone(),
            input_topic: event.topic.clone(),
            iteration: event.iteration().map(str::to_string),
            correlation_id: event.correlation_id.clone(),
            is_last_step: resolved.is_last,
        })
    }

    /// Topic this step publishes to.
    #[must_use]
    pub fn output_topic(&self) -> &Topic {
        &self.step.topic
    }

    /// Iteration for log fields, `-` when unknown.
    #[must_use]
    pub fn iteration_label(&self) -> &str {
        self.iteration.as_deref().unwrap_or("-")
    }

    /// Continuation message on this step's topic. The pipeline tag is added
    /// to the payload if the incoming message did not carry one.
    #[must_use]
    pub fn next_event<I, K, V>(&self, incoming: &PipelineEvent, additions: I) -> PipelineEvent
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut next = incoming.continue_on(self.step.topic.clone(), additions);
        next.payload
            .entry(payload_keys::PIPELINE_TAG.to_string())
            .or_insert_with(|| self.pipeline_tag.clone());
        next
    }

    /// Span carrying the run's identifying fields.
    #[must_use]
    pub fn span(&self) -> Span {
        info_span!(
            "step",
            pipeline = %self.pipeline_tag,
            step = %self.step.name,
            iteration = %self.iteration_label(),
            correlation_id = %self.correlation_id,
            topic = %self.input_topic,
        )
    }
}
