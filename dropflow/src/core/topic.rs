//! Topic names.

use crate::errors::ValueError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-empty, trimmed topic name on the event bus.
///
/// Equality is exact; use [`Topic::matches`] for the case-insensitive
/// comparison used when wiring steps together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Creates a topic, rejecting blank names.
    pub fn new(name: impl AsRef<str>) -> Result<Self, ValueError> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValueError::EmptyTopic);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the topic name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against another topic name.
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }

    /// Lowercased form, used as a lookup key.
    #[must_use]
    pub fn key(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Topic {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Topic {
    type Error = ValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}
