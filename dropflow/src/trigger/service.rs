//! Publishing trigger messages that start a pipeline run.

use super::IterationStore;
use crate::bus::EventBus;
use crate::core::{payload_keys, Payload, PipelineEvent, Topic};
use crate::definition::PipelineDefinition;
use crate::errors::TriggerError;
use crate::utils::new_correlation_id;
use std::sync::Arc;
use tracing::info;

/// What a published trigger started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerReceipt {
    /// Pipeline started.
    pub pipeline_tag: String,
    /// Iteration number assigned to the run.
    pub iteration: u64,
    /// Correlation id shared by every message of the run.
    pub correlation_id: String,
    /// Topic the trigger was published on.
    pub topic: Topic,
}

/// Publishes the first message of a pipeline run.
pub struct TriggerService {
    bus: Arc<dyn EventBus>,
    iterations: Arc<IterationStore>,
}

impl std::fmt::Debug for TriggerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerService")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

impl TriggerService {
    /// Creates a service publishing on `bus`.
    #[must_use]
    pub fn new(bus: Arc<dyn EventBus>, iterations: Arc<IterationStore>) -> Self {
        Self { bus, iterations }
    }

    /// Shared iteration counters.
    #[must_use]
    pub fn iterations(&self) -> &Arc<IterationStore> {
        &self.iterations
    }

    /// Starts one run of `definition`.
    ///
    /// The caller's payload is kept; `pipelineTag` and `iteration` are always
    /// overwritten. The event goes to the first step's topic under a new
    /// correlation id. `trigger` labels the source in logs.
    pub async fn publish_trigger(
        &self,
        definition: &PipelineDefinition,
        trigger: &str,
        mut payload: Payload,
    ) -> Result<TriggerReceipt, TriggerError> {
        let topic = definition.first_step()?.topic.clone();
        let iteration = self.iterations.next(&definition.tag);
        let correlation_id = new_correlation_id();

        payload.insert(payload_keys::PIPELINE_TAG.to_string(), definition.tag.clone());
        payload.insert(payload_keys::ITERATION.to_string(), iteration.to_string());

        let event = PipelineEvent::new(topic.clone(), correlation_id.clone(), payload);
        self.bus.publish(event).await?;

        info!(
            pipeline = %definition.tag,
            step = trigger,
            iteration,
            correlation_id = %correlation_id,
            topic = %topic,
            "pipeline run started"
        );

        Ok(TriggerReceipt {
            pipeline_tag: definition.tag.clone(),
            iteration,
            correlation_id,
            topic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::PipelineDefinition;
    use crate::errors::ResolutionError;
    use crate::testing::{orders_definition, RecordingEventBus};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_publishes_on_first_step_topic() {
        let bus = Arc::new(RecordingEventBus::new());
        let service = TriggerService::new(bus.clone(), Arc::new(IterationStore::new()));

        let mut payload = Payload::new();
        payload.insert("fileName".to_string(), "orders.csv".to_string());
        payload.insert("iteration".to_string(), "99".to_string());
        let receipt = service
            .publish_trigger(&orders_definition(), "manualTrigger", payload)
            .await
            .unwrap();

        assert_eq!(receipt.iteration, 1);
        assert_eq!(receipt.topic.as_str(), "orders.trigger");

        let published = bus.published();
        assert_eq!(published.len(), 1);
        let event = &published[0];
        assert_eq!(event.correlation_id, receipt.correlation_id);
        assert_eq!(event.pipeline_tag(), Some("orders"));
        assert_eq!(event.iteration(), Some("1"));
        assert_eq!(event.get("fileName"), Some("orders.csv"));
    }

    #[tokio::test]
    async fn test_each_run_gets_new_correlation_and_iteration() {
        let bus = Arc::new(RecordingEventBus::new());
        let service = TriggerService::new(bus.clone(), Arc::new(IterationStore::new()));
        let definition = orders_definition();

        let first = service
            .publish_trigger(&definition, "periodicTrigger", Payload::new())
            .await
            .unwrap();
        let second = service
            .publish_trigger(&definition, "periodicTrigger", Payload::new())
            .await
            .unwrap();

        assert_eq!((first.iteration, second.iteration), (1, 2));
        assert_ne!(first.correlation_id, second.correlation_id);
    }

    #[tokio::test]
    async fn test_definition_without_steps_fails() {
        let bus = Arc::new(RecordingEventBus::new());
        let iterations = Arc::new(IterationStore::new());
        let service = TriggerService::new(bus.clone(), iterations.clone());

        let err = service
            .publish_trigger(&PipelineDefinition::new("empty"), "manualTrigger", Payload::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TriggerError::Resolution(ResolutionError::NoSteps { .. })
        ));
        assert_eq!(iterations.current("empty"), 0);
        assert!(bus.published().is_empty());
    }
}
