//! Duplicate content policy.

use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// What to do with content whose hash is already marked processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupPolicy {
    /// Drop duplicates silently.
    #[default]
    Skip,
    /// Re-emit duplicates flagged `isDuplicate`, but only when a specific
    /// file was requested.
    Emit,
}

/// Per-file outcome of the dedup check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupDecision {
    /// New content: store, publish, then mark processed.
    Ingest,
    /// Known content re-emitted: store and publish, no new marker.
    Reemit,
    /// Known content dropped.
    Skip,
}

impl DedupPolicy {
    /// Decides how to treat one file. `targeted` is true when the trigger
    /// named this file explicitly.
    #[must_use]
    pub fn decide(self, already_processed: bool, targeted: bool) -> DedupDecision {
        match (already_processed, self) {
            (false, _) => DedupDecision::Ingest,
            (true, Self::Emit) if targeted => DedupDecision::Reemit,
            (true, _) => DedupDecision::Skip,
        }
    }
}

impl<'de> Deserialize<'de> for DedupPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "emit" => Ok(Self::Emit),
            _ => Err(de::Error::unknown_variant(&raw, &["skip", "emit"])),
        }
    }
}

impl fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Emit => write!(f, "emit"),
        }
    }
}
