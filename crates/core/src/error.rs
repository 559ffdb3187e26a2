//! Error taxonomy for the rocksmq core.
//!
//! Each public broker operation returns this `Error` type. Lower layers
//! (`rmq-storage`, `rmq-concurrency`) define their own narrower error
//! enums and convert into this one at the crate boundary.

use thiserror::Error;

/// Result alias used throughout the public broker API.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds surfaced by the broker engine (spec §7).
#[derive(Debug, Error)]
pub enum Error {
    /// Operation invoked while the broker is not in the `Healthy` state.
    #[error("rocksmq is not serving")]
    NotServing,

    /// Topic name contains the reserved `/` separator.
    #[error("invalid topic name {0:?}: must not contain '/'")]
    InvalidName(String),

    /// No topic-lock entry exists for this topic.
    #[error("topic not found: {0:?}")]
    TopicNotFound(String),

    /// No current-position entry exists for this (topic, group).
    #[error("consumer group not found: topic={topic:?} group={group:?}")]
    GroupNotFound {
        /// Topic name.
        topic: String,
        /// Consumer group name.
        group: String,
    },

    /// `CreateConsumerGroup` called for a group that already exists.
    #[error("consumer group already exists: topic={topic:?} group={group:?}")]
    GroupAlreadyExists {
        /// Topic name.
        topic: String,
        /// Consumer group name.
        group: String,
    },

    /// Underlying KV store failure, surfaced verbatim.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Properties JSON encode/decode failure.
    #[error("encoding error: {0}")]
    EncodingError(String),

    /// Id allocator returned a range whose size differs from requested.
    #[error("id allocator returned {actual} ids, requested {requested}")]
    IdCountMismatch {
        /// Number of ids requested.
        requested: u64,
        /// Number of ids actually granted.
        actual: u64,
    },

    /// Id allocator was shut down before serving the request.
    #[error("id allocator is closed")]
    AllocatorClosed,

    /// Attempt to move a consumer position backward through an internal
    /// (non-`Seek`) path. `Seek` itself is permitted to move a position
    /// backward per spec §4.F; this variant guards the monotonic-advance
    /// invariant inside `ConsumerRegistry::advance`.
    #[error("backward seek rejected: topic={topic:?} group={group:?} current={current} requested={requested}")]
    BackwardSeek {
        /// Topic name.
        topic: String,
        /// Consumer group name.
        group: String,
        /// Current position.
        current: i64,
        /// Requested (smaller) position.
        requested: i64,
    },
}
