//! Definition and event fixtures.
#![allow(clippy::expect_used)]

use crate::core::{Payload, PipelineEvent, Topic};
use crate::definition::{PipelineDefinition, PipelineDefinitionRegistry, PipelineStep};

/// Builds a topic, panicking on blank input.
#[must_use]
pub fn topic(name: &str) -> Topic {
    Topic::new(name).expect("fixture topic must not be blank")
}

/// Builds an enabled definition from `(topic, step name)` pairs.
#[must_use]
pub fn definition(tag: &str, steps: &[(&str, &str)]) -> PipelineDefinition {
    steps.iter().fold(PipelineDefinition::new(tag), |def, (t, name)| {
        def.with_step(PipelineStep::new(topic(t), *name))
    })
}

/// The drop-folder pipeline used throughout the tests:
/// `periodicallyTrigger -> ftpScan -> parseCsvToJsonArray -> log`.
#[must_use]
pub fn orders_definition() -> PipelineDefinition {
    definition(
        "orders",
        &[
            ("orders.trigger", "periodicallyTrigger"),
            ("orders.scan", "ftpScan"),
            ("orders.parsed", "parseCsvToJsonArray"),
            ("orders.logged", "log"),
        ],
    )
}

/// A registry holding only [`orders_definition`].
#[must_use]
pub fn orders_registry() -> PipelineDefinitionRegistry {
    PipelineDefinitionRegistry::from_definitions(vec![orders_definition()])
        .expect("orders fixture must validate")
}

/// An event on `topic_name` with correlation id `test-run` and the given payload.
#[must_use]
pub fn event_on(topic_name: &str, payload: &[(&str, &str)]) -> PipelineEvent {
    let payload: Payload = payload
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    PipelineEvent::new(topic(topic_name), "test-run", payload)
}
