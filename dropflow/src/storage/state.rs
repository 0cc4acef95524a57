//! Processed-file markers.

use super::ObjectStorage;
use crate::core::FileId;
use crate::errors::StorageError;
use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const PROCESSED_MARKER: &[u8] = b"processed";

/// Records which file contents have been ingested.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Whether `id` has been marked processed.
    async fn is_processed(&self, id: &FileId) -> Result<bool, StorageError>;

    /// Marks `id` as processed.
    async fn mark_processed(&self, id: &FileId) -> Result<(), StorageError>;
}

/// Process-local markers.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    processed: DashSet<String>,
    marks: AtomicUsize,
}

impl InMemoryStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total `mark_processed` calls.
    #[must_use]
    pub fn mark_count(&self) -> usize {
        self.marks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn is_processed(&self, id: &FileId) -> Result<bool, StorageError> {
        Ok(self.processed.contains(id.as_str()))
    }

    async fn mark_processed(&self, id: &FileId) -> Result<(), StorageError> {
        self.processed.insert(id.as_str().to_string());
        self.marks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Markers kept as small objects under `{prefix}/{fileId}`.
pub struct ObjectStorageStateStore {
    storage: Arc<dyn ObjectStorage>,
    prefix: String,
}

impl ObjectStorageStateStore {
    /// Creates a store; slashes around `prefix` are ignored.
    pub fn new(storage: Arc<dyn ObjectStorage>, prefix: impl AsRef<str>) -> Self {
        Self {
            storage,
            prefix: prefix.as_ref().trim_matches('/').to_string(),
        }
    }

    /// Object key of the marker for `id`.
    #[must_use]
    pub fn key_for(&self, id: &FileId) -> String {
        if self.prefix.is_empty() {
            id.as_str().to_string()
        } else {
            format!("{}/{}", self.prefix, id)
        }
    }
}

impl std::fmt::Debug for ObjectStorageStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorageStateStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StateStore for ObjectStorageStateStore {
    async fn is_processed(&self, id: &FileId) -> Result<bool, StorageError> {
        match self.storage.get(&self.key_for(id)).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn mark_processed(&self, id: &FileId) -> Result<(), StorageError> {
        self.storage
            .put(&self.key_for(id), PROCESSED_MARKER.to_vec())
            .await
    }
}
