//! On-disk shape of a pipeline definition file.
//!
//! ```json
//! {
//!   "tag": "orders",
//!   "enabled": true,
//!   "steps": [
//!     { "topicTag": "orders.trigger", "name": "periodicallyTrigger",
//!       "parameters": [{ "key": "periodInSeconds", "value": "30" }] },
//!     { "topicTag": "orders.scan", "name": "ftpScan",
//!       "parameters": { "byMask": "*.csv" } }
//!   ]
//! }
//! ```
//!
//! Property names are accepted in camelCase or PascalCase. Parameters may be
//! a list of key/value pairs or a plain object; non-string values are
//! stringified.

use super::{PipelineDefinition, PipelineStep, StepParameters};
use crate::core::Topic;
use crate::errors::{ConfigError, ValueError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A definition as read from JSON, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionDocument {
    /// Pipeline tag.
    #[serde(alias = "Tag")]
    pub tag: String,
    /// Enabled flag; defaults to true.
    #[serde(default = "default_enabled", alias = "Enabled")]
    pub enabled: bool,
    /// Step list.
    #[serde(default, alias = "Steps")]
    pub steps: Vec<StepDocument>,
}

/// A step as read from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDocument {
    /// Output topic.
    #[serde(rename = "topicTag", alias = "TopicTag", alias = "topic", alias = "Topic")]
    pub topic_tag: String,
    /// Handler type key.
    #[serde(alias = "Name")]
    pub name: String,
    /// Step parameters.
    #[serde(default, alias = "Parameters")]
    pub parameters: ParametersDocument,
}

/// Either form of the step parameter block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParametersDocument {
    /// `[{ "key": "...", "value": "..." }]`
    List(Vec<ParameterEntry>),
    /// `{ "key": "value" }`
    Map(BTreeMap<String, serde_json::Value>),
}

impl Default for ParametersDocument {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

/// One key/value parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterEntry {
    /// Parameter key.
    #[serde(alias = "Key")]
    pub key: String,
    /// Parameter value.
    #[serde(default, alias = "Value")]
    pub value: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

fn value_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl From<ParametersDocument> for StepParameters {
    fn from(doc: ParametersDocument) -> Self {
        match doc {
            ParametersDocument::List(entries) => entries
                .into_iter()
                .map(|e| (e.key, value_to_string(e.value)))
                .collect(),
            ParametersDocument::Map(map) => map
                .into_iter()
                .map(|(k, v)| (k, value_to_string(v)))
                .collect(),
        }
    }
}

impl DefinitionDocument {
    /// Parses a single definition from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Validates the document and converts it into a definition.
    pub fn into_definition(self) -> Result<PipelineDefinition, ConfigError> {
        let tag = self.tag.trim().to_string();
        if tag.is_empty() {
            return Err(ConfigError::EmptyTag);
        }

        let steps = self
            .steps
            .into_iter()
            .map(|step| {
                let topic = Topic::new(&step.topic_tag).map_err(|e: ValueError| {
                    ConfigError::InvalidSetting {
                        key: format!("{tag}.steps[{}].topicTag", step.name),
                        message: e.to_string(),
                    }
                })?;
                Ok(PipelineStep {
                    topic,
                    name: step.name.trim().to_string(),
                    parameters: step.parameters.into(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(PipelineDefinition {
            tag,
            enabled: self.enabled,
            steps,
        })
    }
}
