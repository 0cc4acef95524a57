//! Testing utilities for dropflow pipelines.
//!
//! This module provides:
//! - Definition and event fixtures
//! - A recording event bus and a stub step handler
//! - An in-memory collaborator harness
//! - A polling helper for asynchronous assertions

mod fixtures;
mod harness;
mod mocks;

pub use fixtures::{definition, event_on, orders_definition, orders_registry, topic};
pub use harness::InMemoryHarness;
pub use mocks::{RecordingEventBus, StubHandler};

use std::time::Duration;

/// Polls `condition` every few milliseconds until it holds or `timeout`
/// elapses. Returns the final result of the condition.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return condition();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
