//! Run triggers and per-pipeline iteration numbering.
//!
//! Two sources start runs: the [`PeriodicScheduler`] for pipelines whose
//! first step is `periodicallyTrigger`, and the [`ManualTrigger`] for
//! operator requests. Both go through [`TriggerService`], which stamps every
//! run with its pipeline tag, a fresh correlation id, and the next iteration
//! number from the shared [`IterationStore`].

mod iteration;
mod manual;
mod scheduler;
mod service;

pub use iteration::IterationStore;
pub use manual::{ManualTrigger, TriggerTarget, MANUAL_TRIGGER_LABEL};
pub use scheduler::{PeriodicScheduler, Schedule, PERIODIC_TRIGGER_LABEL};
pub use service::{TriggerReceipt, TriggerService};
