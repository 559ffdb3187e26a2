//! Ordered KV store adapter and its on-disk durability (spec §4.A).
//!
//! The teacher keeps storage and durability as separate crates
//! (`strata-storage`, `strata-durability`); this core folds the WAL into
//! this one crate because there is exactly one storage engine and one
//! durability concern, not the teacher's pluggable-primitive/replayable-
//! engine split (see root `DESIGN.md`).

pub mod batch;
pub mod error;
pub mod kv;
pub mod wal;

pub use batch::{RangeDelete, WriteBatch};
pub use error::{Result, StorageError};
pub use kv::{KvStore, MemKvStore};

/// Lexicographically-next byte string strictly greater than `s` (spec
/// §4.A `AddOne`, GLOSSARY). Thin wrapper so callers inside this crate
/// don't need to depend on the exact key string being valid `rmq_core`
/// key-builder output.
pub fn add_one_bytes(s: &str) -> Vec<u8> {
    rmq_core::keys::add_one(s)
}
