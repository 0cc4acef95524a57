//! In-process remote source for local runs and tests.

use super::{directory_path, FtpConnection, RemoteConnector, RemoteEntry, RemoteFileSource};
use crate::errors::RemoteError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct StoredFile {
    content: Vec<u8>,
    modified: DateTime<Utc>,
}

/// A remote file tree held in memory.
///
/// [`InMemoryRemoteSource::append_on_next_size_check`] simulates a file that
/// is still being uploaded.
#[derive(Debug, Default)]
pub struct InMemoryRemoteSource {
    files: RwLock<BTreeMap<String, StoredFile>>,
    pending_appends: Mutex<HashMap<String, Vec<u8>>>,
    downloads: AtomicUsize,
}

impl InMemoryRemoteSource {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file. `path` is relative, e.g. `incoming/a.csv`.
    pub fn put_file(&self, path: &str, content: impl Into<Vec<u8>>, modified: DateTime<Utc>) {
        self.files.write().insert(
            normalize(path),
            StoredFile {
                content: content.into(),
                modified,
            },
        );
    }

    /// Grows the file by `extra` bytes right before its next size query.
    pub fn append_on_next_size_check(&self, path: &str, extra: impl Into<Vec<u8>>) {
        self.pending_appends.lock().insert(normalize(path), extra.into());
    }

    /// Total downloads served.
    #[must_use]
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

fn normalize(path: &str) -> String {
    path.trim().trim_start_matches('/').to_string()
}

#[async_trait]
impl RemoteFileSource for InMemoryRemoteSource {
    async fn list(&self, directory: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let dir = directory_path(directory);
        let files = self.files.read();
        let mut entries = Vec::new();
        let mut subdirectories = Vec::new();

        for (path, file) in files.iter() {
            let Some(rest) = path.strip_prefix(dir.as_str()) else {
                continue;
            };
            match rest.split_once('/') {
                None => entries.push(RemoteEntry {
                    name: rest.to_string(),
                    size: file.content.len() as u64,
                    modified: file.modified,
                    is_file: true,
                }),
                Some((sub, _)) => {
                    if !subdirectories.iter().any(|s: &RemoteEntry| s.name == sub) {
                        subdirectories.push(RemoteEntry {
                            name: sub.to_string(),
                            size: 0,
                            modified: file.modified,
                            is_file: false,
                        });
                    }
                }
            }
        }

        if entries.is_empty() && subdirectories.is_empty() && !dir.is_empty() {
            return Err(RemoteError::NotFound {
                path: directory.to_string(),
            });
        }
        entries.extend(subdirectories);
        Ok(entries)
    }

    async fn size(&self, path: &str) -> Result<u64, RemoteError> {
        let key = normalize(path);
        let extra = self.pending_appends.lock().remove(&key);
        let mut files = self.files.write();
        let file = files.get_mut(&key).ok_or_else(|| RemoteError::NotFound {
            path: path.to_string(),
        })?;
        if let Some(extra) = extra {
            file.content.extend(extra);
        }
        Ok(file.content.len() as u64)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let key = normalize(path);
        let content = self
            .files
            .read()
            .get(&key)
            .map(|f| f.content.clone())
            .ok_or_else(|| RemoteError::NotFound {
                path: path.to_string(),
            })?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(content)
    }
}

/// Hands out one shared [`InMemoryRemoteSource`] and records every
/// connection it was asked to open.
#[derive(Debug, Default)]
pub struct InMemoryConnector {
    source: Arc<InMemoryRemoteSource>,
    connections: Mutex<Vec<FtpConnection>>,
}

impl InMemoryConnector {
    /// Wraps an existing source.
    #[must_use]
    pub fn new(source: Arc<InMemoryRemoteSource>) -> Self {
        Self {
            source,
            connections: Mutex::new(Vec::new()),
        }
    }

    /// The shared source.
    #[must_use]
    pub fn source(&self) -> Arc<InMemoryRemoteSource> {
        self.source.clone()
    }

    /// Connections opened so far.
    #[must_use]
    pub fn connections(&self) -> Vec<FtpConnection> {
        self.connections.lock().clone()
    }
}

#[async_trait]
impl RemoteConnector for InMemoryConnector {
    async fn connect(
        &self,
        connection: &FtpConnection,
    ) -> Result<Arc<dyn RemoteFileSource>, RemoteError> {
        self.connections.lock().push(connection.clone());
        Ok(self.source.clone())
    }
}
