//! The validated, process-lifetime definition set.

use super::{DefinitionSource, JsonFileDefinitionSource, PipelineDefinition, PipelineStep};
use crate::config::PipelineSettings;
use crate::core::Topic;
use crate::errors::{ConfigError, ResolutionError};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Holds every enabled pipeline definition and resolves incoming messages
/// back to the pipeline and step that should handle them.
///
/// Loaded once and immutable afterwards. Every topic is unique across the
/// whole enabled set, so a topic alone identifies the step that published it.
#[derive(Debug, Clone, Default)]
pub struct PipelineDefinitionRegistry {
    definitions: Vec<PipelineDefinition>,
}

/// A fully resolved step for one incoming message.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedStep<'a> {
    /// Owning pipeline.
    pub definition: &'a PipelineDefinition,
    /// The step fed by the input topic.
    pub step: &'a PipelineStep,
    /// Whether the step ends the chain.
    pub is_last: bool,
}

impl PipelineDefinitionRegistry {
    /// Validates and caches the enabled subset of `definitions`.
    pub fn from_definitions(definitions: Vec<PipelineDefinition>) -> Result<Self, ConfigError> {
        let enabled: Vec<_> = definitions.into_iter().filter(|d| d.enabled).collect();
        validate(&enabled)?;
        info!(pipelines = enabled.len(), "pipeline registry loaded");
        Ok(Self {
            definitions: enabled,
        })
    }

    /// Wraps `definitions` as-is, skipping validation.
    #[cfg(test)]
    pub(super) fn from_unchecked(definitions: Vec<PipelineDefinition>) -> Self {
        Self { definitions }
    }

    /// Loads and validates definitions from a source.
    pub fn load(source: &dyn DefinitionSource) -> Result<Self, ConfigError> {
        Self::from_definitions(source.load()?)
    }

    /// Loads definitions from the files named in settings.
    pub fn from_settings(settings: &PipelineSettings) -> Result<Self, ConfigError> {
        let source = JsonFileDefinitionSource::from_settings(&settings.pipeline_definition)?;
        Self::load(&source)
    }

    /// All enabled definitions.
    #[must_use]
    pub fn all(&self) -> &[PipelineDefinition] {
        &self.definitions
    }

    /// The definition with the given tag (case-insensitive).
    pub fn by_tag(&self, tag: &str) -> Result<&PipelineDefinition, ResolutionError> {
        self.definitions
            .iter()
            .find(|d| d.has_tag(tag))
            .ok_or_else(|| ResolutionError::PipelineNotFound {
                tag: tag.trim().to_string(),
            })
    }

    /// Finds the single pipeline in which a step named `name` is fed by
    /// `input_topic`. With a tag hint only that pipeline is considered, and
    /// it must still wire the step to the topic.
    pub fn resolve_by_input_topic(
        &self,
        name: &str,
        input_topic: &str,
        pipeline_tag: Option<&str>,
    ) -> Result<&PipelineDefinition, ResolutionError> {
        if let Some(tag) = pipeline_tag.map(str::trim).filter(|t| !t.is_empty()) {
            let definition = self.by_tag(tag)?;
            definition.step_by_input_topic(name, input_topic)?;
            return Ok(definition);
        }

        let mut matches = self
            .definitions
            .iter()
            .filter(|d| d.position_by_input_topic(name, input_topic).is_some());

        match (matches.next(), matches.next()) {
            (Some(definition), None) => Ok(definition),
            (None, _) => Err(ResolutionError::NoPipelineForTopic {
                step: name.to_string(),
                topic: input_topic.to_string(),
            }),
            (Some(first), Some(second)) => {
                let pipelines = [first, second]
                    .into_iter()
                    .chain(matches)
                    .map(|d| d.tag.clone())
                    .collect();
                Err(ResolutionError::Ambiguous {
                    step: name.to_string(),
                    topic: input_topic.to_string(),
                    pipelines,
                })
            }
        }
    }

    /// Resolves pipeline and step together, plus whether the step is last.
    pub fn resolve_step(
        &self,
        name: &str,
        input_topic: &str,
        pipeline_tag: Option<&str>,
    ) -> Result<ResolvedStep<'_>, ResolutionError> {
        let definition = self.resolve_by_input_topic(name, input_topic, pipeline_tag)?;
        let step = definition.step_by_input_topic(name, input_topic)?;
        Ok(ResolvedStep {
            definition,
            step,
            is_last: definition.is_last_step_by_input_topic(name, input_topic),
        })
    }

    /// Every topic that feeds a step named `name`, across all pipelines.
    #[must_use]
    pub fn all_input_topics(&self, name: &str) -> Vec<Topic> {
        let mut seen = HashSet::new();
        self.definitions
            .iter()
            .flat_map(|d| d.input_topics(name))
            .filter(|t| seen.insert(t.key()))
            .collect()
    }

    /// Definitions that contain at least one step of type `name`.
    #[must_use]
    pub fn definitions_with_step(&self, name: &str) -> Vec<&PipelineDefinition> {
        self.definitions
            .iter()
            .filter(|d| d.contains_step(name))
            .collect()
    }
}

fn validate(definitions: &[PipelineDefinition]) -> Result<(), ConfigError> {
    let mut tags = HashSet::new();
    let mut topics: HashMap<String, &str> = HashMap::new();

    for definition in definitions {
        if definition.tag.trim().is_empty() {
            return Err(ConfigError::EmptyTag);
        }
        if !tags.insert(definition.tag.to_ascii_lowercase()) {
            return Err(ConfigError::DuplicateTag {
                tag: definition.tag.clone(),
            });
        }
        if definition.steps.is_empty() {
            return Err(ConfigError::EmptySteps {
                pipeline: definition.tag.clone(),
            });
        }

        for step in &definition.steps {
            if let Some(first) = topics.insert(step.topic.key(), &definition.tag) {
                return Err(ConfigError::DuplicateTopic {
                    topic: step.topic.to_string(),
                    first: first.to_string(),
                    second: definition.tag.clone(),
                });
            }
        }
        debug!(tag = %definition.tag, steps = definition.steps.len(), "pipeline definition validated");
    }
    Ok(())
}
