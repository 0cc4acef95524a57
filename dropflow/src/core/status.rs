//! Per-message lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of one message as it passes through a step handler.
///
/// `Received -> ContextResolved -> Processing -> {Published | Skipped | Failed}`.
/// A message may also be skipped or fail before processing starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    /// Delivered by the bus.
    Received,
    /// Pipeline, step and run metadata recovered.
    ContextResolved,
    /// Handler is doing its work.
    Processing,
    /// A continuation message was published.
    Published,
    /// A valid no-op; nothing published downstream.
    Skipped,
    /// An unexpected error; nothing published downstream.
    Failed,
}

impl Default for MessageState {
    fn default() -> Self {
        Self::Received
    }
}

impl MessageState {
    /// Returns whether this state ends the message's lifecycle.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Skipped | Self::Failed)
    }

    /// Returns whether moving to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Received => matches!(next, Self::ContextResolved | Self::Skipped | Self::Failed),
            Self::ContextResolved => {
                matches!(next, Self::Processing | Self::Skipped | Self::Failed)
            }
            Self::Processing => next.is_terminal(),
            Self::Published | Self::Skipped | Self::Failed => false,
        }
    }

    /// Moves to `next`, or stays put if the transition is illegal.
    #[must_use]
    pub fn advance(self, next: Self) -> Self {
        if self.can_transition_to(next) {
            next
        } else {
            self
        }
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => write!(f, "received"),
            Self::ContextResolved => write!(f, "context_resolved"),
            Self::Processing => write!(f, "processing"),
            Self::Published => write!(f, "published"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
