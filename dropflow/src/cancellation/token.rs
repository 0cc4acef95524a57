//! Cancellation token shared by the worker, the scheduler and every handler.

use crate::errors::Cancelled;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// A token for cooperative cancellation.
///
/// Cancellation is idempotent - only the first cancellation reason is kept.
/// Async code waits on [`CancellationToken::cancelled`] or wraps suspension
/// points with [`CancellationToken::guard`].
#[derive(Default)]
pub struct CancellationToken {
    cancelled: AtomicBool,
    reason: RwLock<Option<String>>,
    notify: Notify,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation with a reason and wakes every waiter.
    pub fn cancel(&self, reason: impl Into<String>) {
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.reason.write() = Some(reason.into());
            self.notify.notify_waiters();
        }
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Returns an error describing the cancellation.
    #[must_use]
    pub fn error(&self) -> Cancelled {
        Cancelled::new(self.reason().unwrap_or_else(|| "cancelled".to_string()))
    }

    /// Fails fast when the token is already cancelled.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(self.error())
        } else {
            Ok(())
        }
    }

    /// Completes once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Runs `future` to completion unless the token is cancelled first.
    pub async fn guard<F>(&self, future: F) -> Result<F::Output, Cancelled>
    where
        F: Future,
    {
        self.check()?;
        tokio::select! {
            biased;
            () = self.cancelled() => Err(self.error()),
            output = future => Ok(output),
        }
    }

    /// Sleeps for `duration`, returning early with an error on cancellation.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        self.guard(tokio::time::sleep(duration)).await
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
