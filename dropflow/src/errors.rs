//! Error types for the dropflow pipeline runtime.
//!
//! Errors are split by concern: configuration problems are fatal at startup,
//! resolution failures distinguish "not found" from "ambiguous", and step
//! errors are caught at the dispatch boundary so they never reach the bus.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for dropflow operations.
#[derive(Debug, Error)]
pub enum DropflowError {
    /// Definitions or settings could not be loaded or validated.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A pipeline, step or topic could not be resolved.
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    /// A step handler failed.
    #[error("{0}")]
    Step(#[from] StepError),

    /// The event bus rejected an operation.
    #[error("{0}")]
    Bus(#[from] BusError),

    /// A trigger could not be published.
    #[error("{0}")]
    Trigger(#[from] TriggerError),

    /// Tracing could not be initialised.
    #[error("{0}")]
    Telemetry(#[from] TelemetryError),
}

/// Rejected value for a validated domain type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// Topic was empty or whitespace-only.
    #[error("topic must not be empty")]
    EmptyTopic,

    /// File identifier was empty or whitespace-only.
    #[error("file id must not be empty")]
    EmptyFileId,
}

/// Load-time configuration errors. All of them abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Two enabled steps publish to the same topic.
    #[error("topic '{topic}' is used by both '{first}' and '{second}'")]
    DuplicateTopic {
        /// The conflicting topic.
        topic: String,
        /// Pipeline that declared the topic first.
        first: String,
        /// Pipeline that declared it again.
        second: String,
    },

    /// Two enabled definitions share a tag.
    #[error("pipeline tag '{tag}' is declared more than once")]
    DuplicateTag {
        /// The repeated tag.
        tag: String,
    },

    /// An enabled definition has no steps.
    #[error("pipeline '{pipeline}' is enabled but has no steps")]
    EmptySteps {
        /// The offending pipeline.
        pipeline: String,
    },

    /// A definition has a blank tag.
    #[error("pipeline definition has an empty tag")]
    EmptyTag,

    /// No definition file is configured.
    #[error("pipeline definition file name(s) not configured")]
    NoDefinitionFiles,

    /// A configured definition file does not exist.
    #[error("pipeline definition file not found: {}", path.display())]
    MissingFile {
        /// Resolved path.
        path: PathBuf,
    },

    /// A definition or settings file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Resolved path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A definition or settings document is not valid JSON for its shape.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// Resolved path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A setting has an unusable value.
    #[error("invalid setting '{key}': {message}")]
    InvalidSetting {
        /// Setting key.
        key: String,
        /// Why it was rejected.
        message: String,
    },
}

/// Coarse classification of a [`ResolutionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionErrorKind {
    /// Nothing matched.
    NotFound,
    /// More than one pipeline matched; a configuration conflict.
    Ambiguous,
}

/// Failure to resolve a pipeline, step or topic from the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// No enabled pipeline has this tag.
    #[error("pipeline '{tag}' not found")]
    PipelineNotFound {
        /// Requested tag.
        tag: String,
    },

    /// The pipeline has no steps.
    #[error("pipeline '{pipeline}' has no steps")]
    NoSteps {
        /// Pipeline tag.
        pipeline: String,
    },

    /// No step with this name exists in the pipeline.
    #[error("step '{step}' not found in pipeline '{pipeline}'")]
    StepNotFound {
        /// Pipeline tag.
        pipeline: String,
        /// Step name.
        step: String,
    },

    /// The step is first in the chain (or absent), so it has no predecessor.
    #[error("step '{step}' has no previous step in pipeline '{pipeline}'")]
    NoPreviousStep {
        /// Pipeline tag.
        pipeline: String,
        /// Step name.
        step: String,
    },

    /// The step exists but is not fed by this topic.
    #[error("step '{step}' is not fed by topic '{topic}' in pipeline '{pipeline}'")]
    StepNotFoundForTopic {
        /// Pipeline tag.
        pipeline: String,
        /// Step name.
        step: String,
        /// Input topic.
        topic: String,
    },

    /// No enabled pipeline wires this step to this input topic.
    #[error("no pipeline wires step '{step}' to input topic '{topic}'")]
    NoPipelineForTopic {
        /// Step name.
        step: String,
        /// Input topic.
        topic: String,
    },

    /// Several enabled pipelines wire this step to this input topic.
    #[error(
        "input topic '{topic}' for step '{step}' matches several pipelines: {}",
        pipelines.join(", ")
    )]
    Ambiguous {
        /// Step name.
        step: String,
        /// Input topic.
        topic: String,
        /// Tags of every matching pipeline.
        pipelines: Vec<String>,
    },
}

impl ResolutionError {
    /// Returns whether this is a "not found" or an "ambiguous" failure.
    #[must_use]
    pub fn kind(&self) -> ResolutionErrorKind {
        match self {
            Self::Ambiguous { .. } => ResolutionErrorKind::Ambiguous,
            _ => ResolutionErrorKind::NotFound,
        }
    }

    /// True for [`ResolutionErrorKind::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ResolutionErrorKind::NotFound
    }
}

/// An awaited operation was abandoned because its token was cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("operation cancelled: {reason}")]
pub struct Cancelled {
    /// Reason given to the token.
    pub reason: String,
}

impl Cancelled {
    /// Creates a new cancellation error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors raised by the event bus.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    /// Subscriptions spawn worker tasks and need a running Tokio runtime.
    #[error("no async runtime available to run subscription for '{topic}'")]
    NoRuntime {
        /// Topic being subscribed.
        topic: String,
    },

    /// The bus has been shut down.
    #[error("event bus is closed")]
    Closed,

    /// The transport refused the message.
    #[error("failed to publish on '{topic}': {message}")]
    Publish {
        /// Target topic.
        topic: String,
        /// Transport message.
        message: String,
    },
}

/// Errors raised by object storage and the state store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The key does not exist.
    #[error("object not found: {key}")]
    NotFound {
        /// Missing key.
        key: String,
    },

    /// The backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors raised by the remote file source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Could not connect or authenticate.
    #[error("failed to connect to {host}: {message}")]
    Connection {
        /// Remote host.
        host: String,
        /// Reason.
        message: String,
    },

    /// The remote path does not exist.
    #[error("remote path not found: {path}")]
    NotFound {
        /// Remote path.
        path: String,
    },

    /// A listing or transfer failed midway.
    #[error("remote transfer failed for {path}: {message}")]
    Transfer {
        /// Remote path.
        path: String,
        /// Reason.
        message: String,
    },
}

/// Per-message errors raised by step handlers.
#[derive(Debug, Error)]
pub enum StepError {
    /// The run context could not be resolved.
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    /// Object storage or state store failure.
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// Remote source failure.
    #[error("{0}")]
    Remote(#[from] RemoteError),

    /// Publishing the continuation message failed.
    #[error("{0}")]
    Bus(#[from] BusError),

    /// The work was cancelled at a suspension point.
    #[error("{0}")]
    Cancelled(#[from] Cancelled),

    /// A step parameter has an unusable value.
    #[error("invalid parameter '{name}' = '{value}': {message}")]
    InvalidParameter {
        /// Parameter key.
        name: String,
        /// Raw value.
        value: String,
        /// Reason.
        message: String,
    },

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The staged file is not readable CSV.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// An outbound HTTP call failed.
    #[error("http error: {0}")]
    Http(String),
}

/// Errors raised while publishing triggers.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// Manual triggering is switched off by the trigger mode.
    #[error("manual trigger disabled by trigger mode 'background'")]
    ManualDisabled,

    /// Target pipeline could not be resolved.
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    /// The trigger message could not be published.
    #[error("{0}")]
    Bus(#[from] BusError),
}

/// Errors raised while installing the tracing subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log filter directive is invalid.
    #[error("invalid log filter '{directive}': {message}")]
    Filter {
        /// Directive as configured.
        directive: String,
        /// Parser message.
        message: String,
    },

    /// A global subscriber was already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}
