//! Topic-addressed publish/subscribe.
//!
//! Handlers subscribe to topics; publishing fans a message out to every
//! subscriber of its topic. Each subscription processes its messages one at
//! a time, while different subscriptions run concurrently.

mod memory;

pub use memory::{InMemoryEventBus, DEFAULT_HISTORY_LIMIT};

use crate::cancellation::CancellationToken;
use crate::core::{PipelineEvent, Topic};
use crate::errors::BusError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Async callback invoked for every message on a subscribed topic.
///
/// The callback owns its error handling: by the time it returns the message
/// counts as acknowledged.
pub type EventHandlerFn =
    Arc<dyn Fn(PipelineEvent, Arc<CancellationToken>) -> BoxFuture<'static, ()> + Send + Sync>;

/// A message bus keyed by topic.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Registers `handler` for every future message on `topic`.
    fn subscribe(&self, topic: &Topic, handler: EventHandlerFn) -> Result<(), BusError>;

    /// Publishes `event` on its topic.
    async fn publish(&self, event: PipelineEvent) -> Result<(), BusError>;
}
