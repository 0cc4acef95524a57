//! Object storage and the processed-file state store.
//!
//! Raw files and parsed documents live in object storage; the state store
//! records which content hashes have been fully ingested. Markers are only
//! written after the raw copy is safely stored.

mod dedup;
mod object;
mod state;

pub use dedup::{DedupDecision, DedupPolicy};
pub use object::{InMemoryObjectStorage, ObjectStorage};
pub use state::{InMemoryStateStore, ObjectStorageStateStore, StateStore};

#[cfg(test)]
pub use object::MockObjectStorage;
#[cfg(test)]
pub use state::MockStateStore;
