//! The message that flows between steps.

use super::Topic;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cumulative string-to-string payload carried along a chain.
pub type Payload = HashMap<String, String>;

/// Well-known payload keys.
pub mod payload_keys {
    /// Tag of the pipeline that owns the run.
    pub const PIPELINE_TAG: &str = "pipelineTag";
    /// Run counter for the pipeline tag.
    pub const ITERATION: &str = "iteration";
    /// Content hash of the ingested file.
    pub const FILE_ID: &str = "fileId";
    /// Remote file name; doubles as the manual trigger target.
    pub const FILE_NAME: &str = "fileName";
    /// Remote path the file was read from.
    pub const PATH: &str = "path";
    /// Object storage key of the raw file.
    pub const S3_PATH: &str = "s3Path";
    /// Object storage key of the parsed JSON document.
    pub const PARSED_PATH: &str = "parsedPath";
    /// Number of rows in the parsed document.
    pub const ROWS_COUNT: &str = "rowsCount";
    /// Whether the file content had already been processed.
    pub const IS_DUPLICATE: &str = "isDuplicate";
    /// HTTP status returned by a `postTo` destination.
    pub const STATUS: &str = "status";
    /// Process label attached by `logMessage`.
    pub const PROCESS: &str = "process";
    /// Name of a file produced earlier in the chain.
    pub const CREATED_FILE: &str = "createdFile";
}

/// A message on the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineEvent {
    /// Topic the message is published on.
    pub topic: Topic,
    /// Run-scoped identifier, stable across the whole chain.
    pub correlation_id: String,
    /// Accumulated payload.
    #[serde(default)]
    pub payload: Payload,
}

impl PipelineEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(topic: Topic, correlation_id: impl Into<String>, payload: Payload) -> Self {
        Self {
            topic,
            correlation_id: correlation_id.into(),
            payload,
        }
    }

    /// Returns a payload value as-is.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }

    /// Returns a trimmed payload value, treating blank values as absent.
    #[must_use]
    pub fn get_non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Explicit pipeline tag carried by the payload, if any.
    #[must_use]
    pub fn pipeline_tag(&self) -> Option<&str> {
        self.get_non_blank(payload_keys::PIPELINE_TAG)
    }

    /// Iteration carried by the payload, if any.
    #[must_use]
    pub fn iteration(&self) -> Option<&str> {
        self.get_non_blank(payload_keys::ITERATION)
    }

    /// Whether an upstream step flagged the content as already processed.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.get_non_blank(payload_keys::IS_DUPLICATE)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Builds the continuation message on `topic`: same correlation id,
    /// incoming payload copied, `additions` layered on top.
    #[must_use]
    pub fn continue_on<I, K, V>(&self, topic: Topic, additions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut payload = self.payload.clone();
        payload.extend(additions.into_iter().map(|(k, v)| (k.into(), v.into())));
        Self {
            topic,
            correlation_id: self.correlation_id.clone(),
            payload,
        }
    }
}
