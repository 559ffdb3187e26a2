//! Per-topic lock table (spec §4.C).
//!
//! Grounded directly on the teacher's `TransactionManager::commit_locks`
//! (`crates/concurrency/src/manager.rs`): a `DashMap<Key, Mutex<()>>`
//! that serializes commits on one entity while leaving every other
//! entity free to proceed concurrently. Here the entity is a topic
//! rather than a branch, and the lock spans a whole broker operation
//! (Produce/Consume/Seek/Destroy) instead of just the apply step of a
//! commit.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

/// Maps topic name to its serializing mutex. Created on first topic
/// creation (or recovery); dropped on `DestroyTopic`.
#[derive(Default)]
pub struct TopicLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TopicLocks {
    /// Empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the lock for `topic`, creating it if this is the first
    /// reference (spec: "returns the lock, creating on first use during
    /// CreateTopic or recovery").
    pub fn get_or_create(&self, topic: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(topic.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Return the lock for `topic` if it has been created.
    pub fn get(&self, topic: &str) -> Option<Arc<Mutex<()>>> {
        self.locks.get(topic).map(|e| Arc::clone(e.value()))
    }

    /// Remove the lock entry (called inside `DestroyTopic` after all
    /// owned work drains, per spec §4.C).
    pub fn remove(&self, topic: &str) {
        self.locks.remove(topic);
    }

    /// Whether a lock entry exists for `topic` (used as the topic's
    /// existence check by the broker — spec: "Topic not found: topic
    /// lock entry absent").
    pub fn contains(&self, topic: &str) -> bool {
        self.locks.contains_key(topic)
    }

    /// Number of topics currently registered.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no topics are currently registered.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
