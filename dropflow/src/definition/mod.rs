//! Pipeline definitions and the registry that resolves messages back to them.
//!
//! A definition is a flat, ordered list of steps. Each step publishes to its
//! own topic and implicitly consumes the topic of the step before it, so the
//! registry reconstructs the graph from topics alone.

mod document;
mod model;
mod registry;
mod source;

pub use document::{DefinitionDocument, StepDocument};
pub use model::{PipelineDefinition, PipelineStep, StepParameters};
pub use registry::{PipelineDefinitionRegistry, ResolvedStep};
pub use source::{DefinitionSource, JsonFileDefinitionSource, StaticDefinitionSource};
