//! Consumer registry: per-(topic, group) current position plus each
//! topic's live consumer notify handles (spec §4.D).
//!
//! Positions are the in-memory authoritative state the spec keeps
//! durable positions out of scope for (§3 "Consumer-group current
//! position is in memory only"; SPEC_FULL.md §G.3). Handles carry only
//! a coalescing, size-1 wakeup channel — never a back-reference to the
//! broker (DESIGN NOTES §9 "Cyclic references from consumer handles to
//! broker").

use dashmap::DashMap;
use rmq_core::{Error, Result, SENTINEL_POSITION};

use crossbeam_channel::{bounded, Receiver, Sender};

/// A live in-memory subscription: group name plus its 1-slot,
/// coalescing wakeup channel. `topic` is implicit in which bucket of
/// `ConsumerRegistry::handles` a handle lives in.
pub struct ConsumerHandle {
    group: String,
    notify_tx: Sender<()>,
}

impl ConsumerHandle {
    /// Create a handle and its paired receiver, which the caller polls
    /// or blocks on to learn when new messages may be available.
    pub fn new(group: impl Into<String>) -> (Self, Receiver<()>) {
        let (tx, rx) = bounded(1);
        (
            Self {
                group: group.into(),
                notify_tx: tx,
            },
            rx,
        )
    }

    /// The consumer group this handle belongs to.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Non-blocking, coalesced wakeup: a pending unconsumed notification
    /// means no second slot is taken (spec §4.D "drop the signal if
    /// already pending").
    fn notify(&self) {
        let _ = self.notify_tx.try_send(());
    }
}

/// Per-(topic, group) current position and per-topic live handles.
#[derive(Default)]
pub struct ConsumerRegistry {
    positions: DashMap<(String, String), i64>,
    handles: DashMap<String, Vec<ConsumerHandle>>,
}

impl ConsumerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// `CreateConsumerGroup`: insert position `-1` if absent, else
    /// `GroupAlreadyExists` (spec §4.D).
    pub fn create_group(&self, topic: &str, group: &str) -> Result<()> {
        let key = (topic.to_string(), group.to_string());
        if self.positions.contains_key(&key) {
            return Err(Error::GroupAlreadyExists {
                topic: topic.to_string(),
                group: group.to_string(),
            });
        }
        self.positions.insert(key, SENTINEL_POSITION);
        Ok(())
    }

    /// `DestroyConsumerGroup`: remove the position entry and any bound
    /// handle for this group on this topic.
    pub fn destroy_group(&self, topic: &str, group: &str) -> Result<()> {
        let key = (topic.to_string(), group.to_string());
        if self.positions.remove(&key).is_none() {
            return Err(Error::GroupNotFound {
                topic: topic.to_string(),
                group: group.to_string(),
            });
        }
        if let Some(mut handles) = self.handles.get_mut(topic) {
            handles.retain(|h| h.group() != group);
        }
        Ok(())
    }

    /// Current position for `(topic, group)`, or `GroupNotFound`.
    pub fn position(&self, topic: &str, group: &str) -> Result<i64> {
        self.positions
            .get(&(topic.to_string(), group.to_string()))
            .map(|p| *p)
            .ok_or_else(|| Error::GroupNotFound {
                topic: topic.to_string(),
                group: group.to_string(),
            })
    }

    /// Whether `(topic, group)` has been created.
    pub fn group_exists(&self, topic: &str, group: &str) -> bool {
        self.positions
            .contains_key(&(topic.to_string(), group.to_string()))
    }

    /// Unconditionally set the current position, used by `Seek` and
    /// `SeekToLatest`, which are explicitly permitted to move a group's
    /// position backward without error (spec §4.F, §5).
    pub fn set_position(&self, topic: &str, group: &str, position: i64) -> Result<()> {
        let key = (topic.to_string(), group.to_string());
        match self.positions.get_mut(&key) {
            Some(mut p) => {
                *p = position;
                Ok(())
            }
            None => Err(Error::GroupNotFound {
                topic: topic.to_string(),
                group: group.to_string(),
            }),
        }
    }

    /// Advance the position monotonically, as `Consume` does after
    /// delivering messages. This is a defensive invariant check, not a
    /// user-facing seek path: it rejects a smaller `new_position` with
    /// `BackwardSeek` rather than silently going backward, but the
    /// broker's `Consume` loop only ever computes `new_position` as
    /// `lastReturnedId + 1 > oldPosition`, so this branch should be
    /// unreachable in practice (SPEC_FULL.md §G.1).
    pub fn advance(&self, topic: &str, group: &str, new_position: i64) -> Result<()> {
        let key = (topic.to_string(), group.to_string());
        match self.positions.get_mut(&key) {
            Some(mut p) => {
                if new_position < *p {
                    return Err(Error::BackwardSeek {
                        topic: topic.to_string(),
                        group: group.to_string(),
                        current: *p,
                        requested: new_position,
                    });
                }
                *p = new_position;
                Ok(())
            }
            None => Err(Error::GroupNotFound {
                topic: topic.to_string(),
                group: group.to_string(),
            }),
        }
    }

    /// Every consumer group currently registered on `topic`, with its
    /// position. Used by the page accountant to decide whether a page
    /// is acked by every group (spec §4.E).
    pub fn positions_for_topic(&self, topic: &str) -> Vec<(String, i64)> {
        self.positions
            .iter()
            .filter(|e| e.key().0 == topic)
            .map(|e| (e.key().1.clone(), *e.value()))
            .collect()
    }

    /// `RegisterConsumer`: append `handle` to `topic`'s handle list,
    /// deduplicated by group (spec §4.F — "registering a duplicate
    /// handle is a no-op").
    pub fn register(&self, topic: &str, handle: ConsumerHandle) {
        let mut entry = self.handles.entry(topic.to_string()).or_default();
        if entry.iter().any(|h| h.group() == handle.group()) {
            return;
        }
        entry.push(handle);
    }

    /// Remove every handle registered for `topic` (called from
    /// `DestroyTopic`).
    pub fn remove_topic_handles(&self, topic: &str) {
        self.handles.remove(topic);
    }

    /// Remove every position entry and every handle for `topic` (spec
    /// §3: "Destroy is permitted even with live consumer groups and
    /// drops all associated state").
    pub fn remove_topic(&self, topic: &str) {
        self.positions.retain(|key, _| key.0 != topic);
        self.handles.remove(topic);
    }

    /// Every `(topic, group)` pair currently registered, for `Close`'s
    /// "destroy every registered consumer group" sweep.
    pub fn all_groups(&self) -> Vec<(String, String)> {
        self.positions.iter().map(|e| e.key().clone()).collect()
    }

    /// Drop every position and handle. Dropping each handle's sender
    /// closes its notify channel exactly once (spec §3: "the
    /// notify-channel is closed exactly once by the broker").
    pub fn clear(&self) {
        self.positions.clear();
        self.handles.clear();
    }

    /// Non-blocking, coalesced wakeup of every handle on `topic` (used
    /// after a successful `Produce`).
    pub fn notify_all(&self, topic: &str) {
        if let Some(handles) = self.handles.get(topic) {
            for h in handles.iter() {
                h.notify();
            }
        }
    }

    /// Non-blocking, coalesced wakeup of one group's handle, if any
    /// (spec `Notify(topic, group)`).
    pub fn notify_group(&self, topic: &str, group: &str) {
        if let Some(handles) = self.handles.get(topic) {
            if let Some(h) = handles.iter().find(|h| h.group() == group) {
                h.notify();
            }
        }
    }
}
