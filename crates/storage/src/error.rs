//! Storage-layer error type (spec §4.A: "fails with `StorageError` on
//! any backend error"). Converted into `rmq_core::Error::StorageError`
//! at the crate boundary the same way the teacher's `WalConfigError`
//! and `CheckpointError` stay scoped to their own crates.

use thiserror::Error;

/// Result alias used throughout `rmq-storage`.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors raised by the KV store adapter and its WAL.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying filesystem I/O failure.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// A WAL record failed its checksum on replay.
    #[error("wal record checksum mismatch at offset {offset}")]
    ChecksumMismatch {
        /// Byte offset of the corrupt record within the WAL file.
        offset: u64,
    },

    /// A WAL record was truncated (e.g. a crash mid-append). Recovery
    /// stops at the last intact record rather than erroring out.
    #[error("wal record truncated at offset {offset}")]
    Truncated {
        /// Byte offset where the truncated record begins.
        offset: u64,
    },

    /// `path` exists but is not a directory (spec §6 filesystem layout).
    #[error("path {0:?} exists but is not a directory")]
    NotADirectory(std::path::PathBuf),
}

impl From<StorageError> for rmq_core::Error {
    fn from(e: StorageError) -> Self {
        rmq_core::Error::StorageError(e.to_string())
    }
}
