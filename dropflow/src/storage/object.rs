//! Object storage abstraction.

use crate::errors::StorageError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A flat key/value blob store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Writes `content` under `key`, replacing any existing object.
    async fn put(&self, key: &str, content: Vec<u8>) -> Result<(), StorageError>;

    /// Reads the object under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Lists keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Deletes the object under `key`. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local object storage.
#[derive(Debug, Default)]
pub struct InMemoryObjectStorage {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl InMemoryObjectStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total successful `put` calls.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Keys starting with `prefix`, without going through the async API.
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.objects
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn put(&self, key: &str, content: Vec<u8>) -> Result<(), StorageError> {
        self.objects.write().insert(key.to_string(), content);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self.keys_with_prefix(prefix))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().remove(key);
        Ok(())
    }
}
