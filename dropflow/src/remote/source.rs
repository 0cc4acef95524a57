//! Remote listing and transfer traits.

use super::FtpConnection;
use crate::errors::RemoteError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// One entry in a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// File name without directory.
    pub name: String,
    /// Size in bytes at listing time.
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
    /// False for directories and links.
    pub is_file: bool,
}

/// A connected remote file source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteFileSource: Send + Sync {
    /// Lists the entries of a directory.
    async fn list(&self, directory: &str) -> Result<Vec<RemoteEntry>, RemoteError>;

    /// Current size of a file.
    async fn size(&self, path: &str) -> Result<u64, RemoteError>;

    /// Downloads a file.
    async fn download(&self, path: &str) -> Result<Vec<u8>, RemoteError>;
}

/// Opens remote sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    /// Connects and authenticates.
    async fn connect(
        &self,
        connection: &FtpConnection,
    ) -> Result<Arc<dyn RemoteFileSource>, RemoteError>;
}

/// Normalises a search path into a relative directory with a trailing slash,
/// or an empty string for the root.
#[must_use]
pub fn directory_path(search_path: &str) -> String {
    let trimmed = search_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// Joins a directory from [`directory_path`] with a file name.
#[must_use]
pub fn join_path(directory: &str, name: &str) -> String {
    format!("{}{}", directory_path(directory), name.trim_start_matches('/'))
}
