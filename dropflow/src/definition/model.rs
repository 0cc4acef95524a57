//! Pipeline definition model.

use crate::core::Topic;
use crate::errors::ResolutionError;
use serde::{Deserialize, Serialize};

/// Ordered step parameters with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepParameters(Vec<(String, String)>);

impl StepParameters {
    /// Creates an empty parameter list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, ignoring case. First occurrence wins.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first present, non-blank value among `keys`, trimmed.
    #[must_use]
    pub fn first_non_blank(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.get(key))
            .map(str::trim)
            .find(|v| !v.is_empty())
    }

    /// Appends a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Iterates parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StepParameters {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStep {
    /// Output topic of this step.
    pub topic: Topic,
    /// Handler type key, e.g. `ftpScan`.
    pub name: String,
    /// Step-specific configuration.
    #[serde(default)]
    pub parameters: StepParameters,
}

impl PipelineStep {
    /// Creates a step with no parameters.
    #[must_use]
    pub fn new(topic: Topic, name: impl Into<String>) -> Self {
        Self {
            topic,
            name: name.into(),
            parameters: StepParameters::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key, value);
        self
    }

    /// Case-insensitive parameter lookup.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key)
    }

    /// Returns whether this step is of the given handler type.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }
}

/// A named, ordered chain of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDefinition {
    /// Unique human identifier.
    pub tag: String,
    /// Disabled definitions are never loaded into the registry.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Steps in execution order.
    #[serde(default)]
    pub steps: Vec<PipelineStep>,
}

fn default_enabled() -> bool {
    true
}

impl PipelineDefinition {
    /// Creates an enabled definition with no steps.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            enabled: true,
            steps: Vec::new(),
        }
    }

    /// Appends a step.
    #[must_use]
    pub fn with_step(mut self, step: PipelineStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns whether this definition has the given tag (case-insensitive).
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag.trim())
    }

    /// Returns whether any step is of the given handler type.
    #[must_use]
    pub fn contains_step(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.is_named(name))
    }

    /// The entry step of the chain.
    pub fn first_step(&self) -> Result<&PipelineStep, ResolutionError> {
        self.steps.first().ok_or_else(|| ResolutionError::NoSteps {
            pipeline: self.tag.clone(),
        })
    }

    /// First step with the given handler type.
    pub fn step(&self, name: &str) -> Result<&PipelineStep, ResolutionError> {
        self.steps
            .iter()
            .find(|s| s.is_named(name))
            .ok_or_else(|| self.step_not_found(name))
    }

    /// The step immediately before the first occurrence of `name`.
    pub fn previous_step(&self, name: &str) -> Result<&PipelineStep, ResolutionError> {
        match self.steps.iter().position(|s| s.is_named(name)) {
            Some(index) if index > 0 => Ok(&self.steps[index - 1]),
            _ => Err(ResolutionError::NoPreviousStep {
                pipeline: self.tag.clone(),
                step: name.to_string(),
            }),
        }
    }

    /// The step named `name` that is fed by `input_topic`.
    pub fn step_by_input_topic(
        &self,
        name: &str,
        input_topic: &str,
    ) -> Result<&PipelineStep, ResolutionError> {
        self.position_by_input_topic(name, input_topic)
            .map(|i| &self.steps[i])
            .ok_or_else(|| ResolutionError::StepNotFoundForTopic {
                pipeline: self.tag.clone(),
                step: name.to_string(),
                topic: input_topic.to_string(),
            })
    }

    /// Whether the step named `name` fed by `input_topic` ends the chain.
    #[must_use]
    pub fn is_last_step_by_input_topic(&self, name: &str, input_topic: &str) -> bool {
        self.position_by_input_topic(name, input_topic)
            .is_some_and(|i| i + 1 == self.steps.len())
    }

    fn step_not_found(&self, name: &str) -> ResolutionError {
        ResolutionError::StepNotFound {
            pipeline: self.tag.clone(),
            step: name.to_string(),
        }
    }

    /// Index of the step named `name` whose predecessor publishes to
    /// `input_topic`. Scanning starts at index 1: the first step has no input.
    #[must_use]
    pub fn position_by_input_topic(&self, name: &str, input_topic: &str) -> Option<usize> {
        (1..self.steps.len()).find(|&i| {
            self.steps[i].is_named(name) && self.steps[i - 1].topic.matches(input_topic)
        })
    }

    /// Output topics of every step that directly precedes a step named `name`.
    #[must_use]
    pub fn input_topics(&self, name: &str) -> Vec<Topic> {
        self.steps
            .windows(2)
            .filter(|pair| pair[1].is_named(name))
            .map(|pair| pair[0].topic.clone())
            .collect()
    }
}
