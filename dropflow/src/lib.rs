//! # Dropflow
//!
//! An event-driven file ingestion runtime. Pipelines are declared as ordered
//! chains of named steps, each step publishing to its own topic; the next
//! step subscribes to the topic of the one before it.
//!
//! The built-in steps cover the common drop-folder flow:
//!
//! - **`ftpScan`**: detect stable, fresh files on a remote server, dedupe by
//!   content hash, and stage the raw bytes in object storage
//! - **`parseCsvToJsonArray`**: turn a staged CSV file into a JSON array of rows
//! - **`log`** / **`logMessage`** / **`postTo`**: terminal and side-effect sinks
//!
//! Runs start from a periodic scheduler or a manual trigger, and every
//! message carries the pipeline tag and iteration number of its run.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dropflow::prelude::*;
//!
//! let settings = PipelineSettings::from_json_file("dropflow.json")?;
//! let registry = PipelineDefinitionRegistry::from_settings(&settings)?;
//! let runtime = PipelineRuntime::new(settings, registry, collaborators);
//!
//! let cancel = Arc::new(CancellationToken::new());
//! runtime.worker().run(cancel).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod bus;
pub mod cancellation;
pub mod config;
pub mod core;
pub mod definition;
pub mod errors;
pub mod handlers;
pub mod observability;
pub mod orchestrator;
pub mod remote;
pub mod storage;
pub mod testing;
pub mod trigger;
pub mod utils;
pub mod worker;


/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bus::{EventBus, EventHandlerFn, InMemoryEventBus};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{PipelineSettings, TriggerMode};
    pub use crate::core::{FileId, MessageState, PipelineEvent, StepOutcome, Topic};
    pub use crate::definition::{
        DefinitionSource, JsonFileDefinitionSource, PipelineDefinition,
        PipelineDefinitionRegistry, PipelineStep,
    };
    pub use crate::errors::{
        ConfigError, DropflowError, ResolutionError, ResolutionErrorKind, StepError,
        TriggerError,
    };
    pub use crate::handlers::{StepContext, StepHandler};
    pub use crate::observability::init_tracing;
    pub use crate::orchestrator::PipelineOrchestrator;
    pub use crate::remote::{RemoteConnector, RemoteFileSource};
    pub use crate::storage::{DedupPolicy, ObjectStorage, StateStore};
    pub use crate::trigger::{ManualTrigger, PeriodicScheduler, TriggerService};
    pub use crate::worker::{Collaborators, PipelineRuntime, PipelineWorker};
}
