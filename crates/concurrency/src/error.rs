//! Narrow error type for `rmq-concurrency`, converted into
//! `rmq_core::Error` at the engine boundary (teacher convention: each
//! crate owns an error enum scoped to its own concern).

use thiserror::Error;

/// Errors raised by the id allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocatorError {
    /// The allocator's background task has shut down; no further ids
    /// will be granted (spec §4.B, §7 `AllocatorClosed`).
    #[error("id allocator is closed")]
    Closed,
}

impl From<AllocatorError> for rmq_core::Error {
    fn from(_: AllocatorError) -> Self {
        rmq_core::Error::AllocatorClosed
    }
}
