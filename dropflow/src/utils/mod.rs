//! Small helpers shared across steps: content hashing, filename masks and
//! correlation identifiers.

mod hashing;
mod ids;
mod mask;

pub use hashing::sha256_hex;
pub use ids::new_correlation_id;
pub use mask::wildcard_to_regex;
