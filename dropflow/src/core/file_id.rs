use crate::errors::ValueError;
use crate::utils::sha256_hex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content-derived identifier of an ingested file: the lowercase hex
/// SHA-256 of its bytes. Two files with the same bytes share an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileId(String);

impl FileId {
    /// Wraps an existing identifier.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ValueError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValueError::EmptyFileId);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Derives the identifier from file content.
    #[must_use]
    pub fn from_content(content: &[u8]) -> Self {
        Self(sha256_hex(content))
    }

    /// Returns the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for FileId {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FileId> for String {
    fn from(id: FileId) -> Self {
        id.0
    }
}
