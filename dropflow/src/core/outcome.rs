use serde::{Deserialize, Serialize};

/// What a step handler did with a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Continuation message(s) published on the step's topic.
    Published {
        /// Number of messages published.
        count: usize,
    },
    /// Nothing to do; nothing published.
    Skipped {
        /// Why the message was a no-op.
        reason: String,
    },
}

impl StepOutcome {
    /// One message published.
    #[must_use]
    pub fn published() -> Self {
        Self::Published { count: 1 }
    }

    /// A clean no-op.
    #[must_use]
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// Returns whether anything was published.
    #[must_use]
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { count } if *count > 0)
    }
}
