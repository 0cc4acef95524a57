//! Remote file sources polled by the ingestion step.

mod connection;
mod memory;
mod source;

pub use connection::FtpConnection;
pub use memory::{InMemoryConnector, InMemoryRemoteSource};
pub use source::{directory_path, join_path, RemoteConnector, RemoteEntry, RemoteFileSource};

#[cfg(test)]
pub use source::{MockRemoteConnector, MockRemoteFileSource};
