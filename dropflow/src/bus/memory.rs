//! In-process event bus.

use super::{EventBus, EventHandlerFn};
use crate::cancellation::CancellationToken;
use crate::core::{PipelineEvent, Topic};
use crate::errors::BusError;
use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Recent messages kept by [`InMemoryEventBus::new`].
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// Delivers messages within the process. Every subscription gets its own
/// queue and worker task; topics match case-insensitively.
///
/// The most recent published messages are kept for inspection; older ones
/// are evicted once the history limit is reached.
pub struct InMemoryEventBus {
    subscriptions: RwLock<HashMap<String, Vec<mpsc::UnboundedSender<PipelineEvent>>>>,
    history: Mutex<VecDeque<PipelineEvent>>,
    history_limit: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    cancel: Arc<CancellationToken>,
}

impl InMemoryEventBus {
    /// Creates a bus whose workers stop when `cancel` fires.
    #[must_use]
    pub fn new(cancel: Arc<CancellationToken>) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            history_limit: DEFAULT_HISTORY_LIMIT,
            workers: Mutex::new(Vec::new()),
            cancel,
        }
    }

    /// Keeps at most `limit` recent messages; 0 disables the history.
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Recently published messages, oldest first.
    #[must_use]
    pub fn published(&self) -> Vec<PipelineEvent> {
        self.history.lock().iter().cloned().collect()
    }

    /// Messages published on `topic`.
    #[must_use]
    pub fn published_on(&self, topic: &str) -> Vec<PipelineEvent> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.topic.matches(topic))
            .cloned()
            .collect()
    }

    fn record(&self, event: PipelineEvent) {
        if self.history_limit == 0 {
            return;
        }
        let mut history = self.history.lock();
        while history.len() >= self.history_limit {
            history.pop_front();
        }
        history.push_back(event);
    }

    /// Number of subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscriptions
            .read()
            .get(&topic.trim().to_ascii_lowercase())
            .map_or(0, Vec::len)
    }

    /// Stops accepting messages and waits for in-flight deliveries.
    pub async fn shutdown(&self) {
        self.subscriptions.write().clear();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "event bus worker ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for InMemoryEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventBus")
            .field("topics", &self.subscriptions.read().len())
            .field("history", &self.history.lock().len())
            .field("history_limit", &self.history_limit)
            .finish_non_exhaustive()
    }
}

async fn deliver(
    topic: String,
    mut queue: mpsc::UnboundedReceiver<PipelineEvent>,
    handler: EventHandlerFn,
    cancel: Arc<CancellationToken>,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = queue.recv() => match next {
                Some(event) => event,
                None => break,
            },
        };

        let correlation_id = event.correlation_id.clone();
        let delivery = handler(event, cancel.clone());
        if AssertUnwindSafe(delivery).catch_unwind().await.is_err() {
            error!(%topic, %correlation_id, "subscriber panicked; message dropped");
        }
    }
    debug!(%topic, "event bus worker stopped");
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    fn subscribe(&self, topic: &Topic, handler: EventHandlerFn) -> Result<(), BusError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BusError::NoRuntime {
            topic: topic.to_string(),
        })?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = runtime.spawn(deliver(
            topic.to_string(),
            receiver,
            handler,
            self.cancel.clone(),
        ));

        self.subscriptions
            .write()
            .entry(topic.key())
            .or_default()
            .push(sender);
        self.workers.lock().push(worker);
        debug!(%topic, "subscription added");
        Ok(())
    }

    async fn publish(&self, event: PipelineEvent) -> Result<(), BusError> {
        if self.cancel.is_cancelled() {
            return Err(BusError::Closed);
        }

        let senders = self
            .subscriptions
            .read()
            .get(&event.topic.key())
            .cloned()
            .unwrap_or_default();

        if senders.is_empty() {
            debug!(topic = %event.topic, "no subscribers; message dropped");
        }
        for sender in senders {
            sender.send(event.clone()).map_err(|_| BusError::Publish {
                topic: event.topic.to_string(),
                message: "subscriber queue closed".to_string(),
            })?;
        }

        self.record(event);
        Ok(())
    }
}
