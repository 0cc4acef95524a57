//! Cooperative cancellation for long-running workers and handlers.

mod token;

pub use token::CancellationToken;
