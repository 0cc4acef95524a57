//! Core domain model types for dropflow.
//!
//! This module contains the values that flow between steps:
//! - Topic and file identifiers
//! - The pipeline event and its payload keys
//! - Per-message lifecycle states and step outcomes

mod event;
mod file_id;
mod outcome;
mod status;
mod topic;

pub use event::{payload_keys, Payload, PipelineEvent};
pub use file_id::FileId;
pub use outcome::StepOutcome;
pub use status::MessageState;
pub use topic::Topic;
