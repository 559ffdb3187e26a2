//! Broker engine: the public embedding API (spec §4.F).
//!
//! One `Broker` owns the KV store, the per-topic lock table, the
//! consumer registry, one lazily-spawned [`IdAllocator`] per topic, and
//! the retention worker thread. Health is tracked as an `AtomicU8`
//! rather than behind a lock (SPEC_FULL.md §F.4, mirroring the Go
//! source's `atomic.LoadInt64(&rmq.state)`): every operation already
//! pays for a topic-lock acquisition, so a second lock just to read
//! broker health would add contention with no corresponding safety
//! benefit.

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rmq_concurrency::{ConsumerHandle, ConsumerRegistry, IdAllocator, TopicLocks};
use rmq_core::{keys, Config, Error, Message, ProducerMessage, Result, SENTINEL_POSITION};
use rmq_storage::{KvStore, MemKvStore, WriteBatch};
use tracing::{debug, info, warn};

use crate::page_accountant::PageAccountant;
use crate::retention::RetentionWorker;

const STATE_STOPPED: u8 = 0;
const STATE_HEALTHY: u8 = 1;

/// Observable health of a [`Broker`] (spec §4.F state machine: `Stopped
/// → Healthy → Stopped`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    /// Not yet opened, or closed. No operation other than `open` is valid.
    Stopped,
    /// Serving all public operations.
    Healthy,
}

/// Embedded publish/subscribe broker (spec §1, §4.F).
///
/// Constructed once per on-disk directory via [`Broker::open`]. All
/// public operations are safe to call from multiple threads
/// concurrently; distinct topics proceed independently, a single topic
/// is serialized by its lock (spec §5).
pub struct Broker {
    config: Config,
    store: Arc<dyn KvStore>,
    topic_locks: Arc<TopicLocks>,
    consumers: Arc<ConsumerRegistry>,
    allocators: DashMap<String, IdAllocator>,
    last_ids: DashMap<String, i64>,
    retention_registry: Arc<DashMap<String, i64>>,
    retention: parking_lot::Mutex<Option<RetentionWorker>>,
    state: AtomicU8,
}

impl Broker {
    /// Open (or create) a broker rooted at `path` (spec §6 "Embedding
    /// API. One factory taking a filesystem path ... returns a
    /// broker."). Recovers topic existence, per-topic lock entries, the
    /// retention worker's last-checked timestamps, and each topic's
    /// cached tail id from the durable keyspace.
    ///
    /// This core's id allocator is wholly internal (§4.B is a complete,
    /// self-contained contract); unlike the Go source's
    /// `NewRocksMQ(path, idAllocator)`, there is no external allocator
    /// to inject, since cross-process id coordination is out of scope
    /// (spec §1 Non-goals: "cross-process replication").
    pub fn open(path: impl AsRef<Path>, mut config: Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::StorageError(e.to_string()))?;
        let store: Arc<dyn KvStore> = Arc::new(MemKvStore::open(path, &config)?);
        let broker = Self::from_store(store, config)?;
        Ok(broker)
    }

    /// An ephemeral broker with no backing directory, for tests.
    pub fn in_memory(config: Config) -> Result<Self> {
        let store: Arc<dyn KvStore> = Arc::new(MemKvStore::in_memory());
        Self::from_store(store, config)
    }

    fn from_store(store: Arc<dyn KvStore>, config: Config) -> Result<Self> {
        let topic_locks = Arc::new(TopicLocks::new());
        let consumers = Arc::new(ConsumerRegistry::new());
        let last_ids = DashMap::new();
        let retention_registry = Arc::new(DashMap::new());

        let now = now_unix();
        for (key, _) in store.load_with_prefix(keys::TOPIC_ID_PREFIX)? {
            let Some(topic) = key.strip_prefix(keys::TOPIC_ID_PREFIX) else {
                continue;
            };
            topic_locks.get_or_create(topic);
            retention_registry.insert(topic.to_string(), now);
            let latest = latest_msg_id(store.as_ref(), topic)?;
            last_ids.insert(topic.to_string(), latest);
            debug!(topic, latest, "recovered topic on broker open");
        }

        let retention = RetentionWorker::spawn(
            Arc::clone(&store),
            Arc::clone(&topic_locks),
            Arc::clone(&retention_registry),
            config.clone(),
        );

        info!(topics = topic_locks_len(&topic_locks), "broker opened");

        Ok(Self {
            config,
            store,
            topic_locks,
            consumers,
            allocators: DashMap::new(),
            last_ids,
            retention_registry,
            retention: parking_lot::Mutex::new(Some(retention)),
            state: AtomicU8::new(STATE_HEALTHY),
        })
    }

    fn check_healthy(&self) -> Result<()> {
        if self.state.load(Ordering::Acquire) != STATE_HEALTHY {
            return Err(Error::NotServing);
        }
        Ok(())
    }

    /// Current broker health.
    pub fn state(&self) -> BrokerState {
        match self.state.load(Ordering::Acquire) {
            STATE_HEALTHY => BrokerState::Healthy,
            _ => BrokerState::Stopped,
        }
    }

    // ---- CreateTopic / DestroyTopic -----------------------------------

    /// Create `topic` if it does not already exist; a no-op otherwise
    /// (spec §3, §4.F, §8 "CreateTopic is idempotent").
    pub fn create_topic(&self, topic: &str) -> Result<()> {
        self.check_healthy()?;
        rmq_core::validate_topic_name(topic)?;

        let topic_id_key = keys::topic_id_key(topic);
        if self.store.has(&topic_id_key)? {
            debug!(topic, "create_topic: already exists, no-op");
            return Ok(());
        }

        let now = now_unix();
        let mut batch = WriteBatch::new();
        batch.put(topic_id_key, now.to_string());
        batch.put(keys::message_size_key(topic), "0".to_string());
        batch.put(keys::last_id_key(topic), "0".to_string());
        self.store.apply(batch)?;

        self.topic_locks.get_or_create(topic);
        self.retention_registry.insert(topic.to_string(), now);
        self.last_ids.insert(topic.to_string(), SENTINEL_POSITION);
        info!(topic, "topic created");
        Ok(())
    }

    /// Destroy `topic` and every key under its keyspaces, even with live
    /// consumer groups (spec §3, §4.F, §8 invariant 5).
    pub fn destroy_topic(&self, topic: &str) -> Result<()> {
        self.check_healthy()?;
        let lock = self
            .topic_locks
            .get(topic)
            .ok_or_else(|| Error::TopicNotFound(topic.to_string()))?;
        let guard = lock.lock();

        self.consumers.remove_topic(topic);
        if let Some((_, mut allocator)) = self.allocators.remove(topic) {
            allocator.close();
        }
        self.last_ids.remove(topic);
        self.retention_registry.remove(topic);

        let mut batch = WriteBatch::new();
        batch.delete_range(keys::payload_prefix(topic), rmq_storage::add_one_bytes(&keys::payload_prefix(topic)));
        batch.delete_range(
            keys::properties_prefix(topic),
            rmq_storage::add_one_bytes(&keys::properties_prefix(topic)),
        );
        batch.delete_range(
            keys::page_message_size_prefix(topic),
            rmq_storage::add_one_bytes(&keys::page_message_size_prefix(topic)),
        );
        batch.delete_range(
            keys::page_ts_prefix(topic),
            rmq_storage::add_one_bytes(&keys::page_ts_prefix(topic)),
        );
        batch.delete_range(
            keys::acked_ts_prefix(topic),
            rmq_storage::add_one_bytes(&keys::acked_ts_prefix(topic)),
        );
        batch.delete(keys::topic_id_key(topic));
        batch.delete(keys::message_size_key(topic));
        batch.delete(keys::last_id_key(topic));
        self.store.apply(batch)?;

        drop(guard);
        self.topic_locks.remove(topic);
        info!(topic, "topic destroyed");
        Ok(())
    }

    // ---- Consumer groups ------------------------------------------------

    /// Create a consumer group at the sentinel position (spec §4.D).
    pub fn create_consumer_group(&self, topic: &str, group: &str) -> Result<()> {
        self.check_healthy()?;
        self.consumers.create_group(topic, group)
    }

    /// Destroy a consumer group, removing its position and closing any
    /// bound handle's notify channel (spec §4.F).
    pub fn destroy_consumer_group(&self, topic: &str, group: &str) -> Result<()> {
        self.check_healthy()?;
        self.consumers.destroy_group(topic, group)
    }

    /// Register a live consumer handle for `(topic, handle.group())`.
    /// A duplicate registration for an existing group is a no-op (spec
    /// §3 ConsumerHandle, §4.F `RegisterConsumer`).
    pub fn register_consumer(&self, topic: &str, handle: ConsumerHandle) -> Result<()> {
        self.check_healthy()?;
        self.consumers.register(topic, handle);
        Ok(())
    }

    // ---- Produce ---------------------------------------------------------

    /// Publish a batch of messages to `topic`, returning their assigned
    /// ids in order (spec §4.F `Produce`).
    pub fn produce(&self, topic: &str, messages: Vec<ProducerMessage>) -> Result<Vec<i64>> {
        self.check_healthy()?;
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        let lock = self
            .topic_locks
            .get(topic)
            .ok_or_else(|| Error::TopicNotFound(topic.to_string()))?;
        let _guard = lock.lock();

        let count = messages.len() as u64;
        let (start, end) = self.allocator_for(topic).gen(count)?;
        if (end - start) as u64 != count {
            return Err(Error::IdCountMismatch {
                requested: count,
                actual: (end - start) as u64,
            });
        }

        let mut batch = WriteBatch::new();
        let mut sizes = Vec::with_capacity(messages.len());
        for (i, msg) in messages.iter().enumerate() {
            let id = start + i as i64;
            batch.put(keys::payload_key(topic, id), msg.payload.clone());
            let props = rmq_core::encode_properties(&msg.properties)?;
            batch.put(keys::properties_key(topic, id), props);
            sizes.push(msg.payload.len());
        }
        self.store.apply(batch)?;

        let ids: Vec<i64> = (start..end).collect();
        let now = now_unix();
        PageAccountant::new(self.store.as_ref()).account_produce(
            topic,
            &ids,
            &sizes,
            self.config.page_size_bytes,
            now,
        )?;

        self.last_ids.insert(topic.to_string(), end - 1);
        self.consumers.notify_all(topic);
        debug!(topic, start, end, "produced batch");
        Ok(ids)
    }

    fn allocator_for(&self, topic: &str) -> dashmap::mapref::one::RefMut<'_, String, IdAllocator> {
        if !self.allocators.contains_key(topic) {
            let initial = self
                .store
                .load(&keys::last_id_key(topic))
                .ok()
                .flatten()
                .and_then(|b| std::str::from_utf8(&b).ok().and_then(|s| s.parse().ok()))
                .unwrap_or(0);
            let store = Arc::clone(&self.store);
            let topic_owned = topic.to_string();
            let allocator = IdAllocator::spawn(
                topic.to_string(),
                initial,
                self.config.producer_id_refill_quantum,
                move |new_counter| {
                    store
                        .save(&keys::last_id_key(&topic_owned), new_counter.to_string().into_bytes())
                        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
                },
            );
            self.allocators.insert(topic.to_string(), allocator);
        }
        self.allocators.get_mut(topic).expect("just inserted")
    }

    // ---- Consume / Seek ---------------------------------------------------

    /// Deliver up to `n` messages to `group` on `topic`, advancing its
    /// position past the last delivered id (spec §4.F `Consume`).
    pub fn consume(&self, topic: &str, group: &str, n: usize) -> Result<Vec<Message>> {
        self.check_healthy()?;
        let lock = self
            .topic_locks
            .get(topic)
            .ok_or_else(|| Error::TopicNotFound(topic.to_string()))?;
        let _guard = lock.lock();

        let position = self.consumers.position(topic, group)?;
        if n == 0 {
            return Ok(Vec::new());
        }
        let last_id = self
            .last_ids
            .get(topic)
            .map(|v| *v)
            .unwrap_or(SENTINEL_POSITION);
        if position > last_id {
            return Ok(Vec::new());
        }

        let start_key = if position == SENTINEL_POSITION {
            keys::payload_prefix(topic)
        } else {
            keys::payload_key(topic, position)
        };
        let upper = rmq_storage::add_one_bytes(&keys::payload_prefix(topic));
        let entries = self.store.iter_range_limited(&start_key, Some(&upper), n)?;

        let mut messages = Vec::with_capacity(entries.len());
        for (key, payload) in entries {
            let Some(id) = keys::parse_payload_id(&key) else {
                continue;
            };
            let props_bytes = self.store.load(&keys::properties_key(topic, id))?;
            let props = match props_bytes {
                Some(b) => rmq_core::decode_properties(&b)?,
                None => rmq_core::Properties::new(),
            };
            messages.push(Message {
                id,
                payload: if payload.is_empty() { None } else { Some(payload) },
                properties: if props.is_empty() { None } else { Some(props) },
            });
        }

        if messages.is_empty() {
            return Ok(messages);
        }

        let last_returned_id = messages.last().expect("non-empty").id;
        let new_pos = last_returned_id + 1;
        self.consumers.advance(topic, group, new_pos)?;
        let all_positions = self.consumers.positions_for_topic(topic);
        PageAccountant::new(self.store.as_ref()).update_acks(topic, &all_positions, position, new_pos)?;

        Ok(messages)
    }

    /// Set `group`'s position to `msg_id` if it exists in `topic`, else
    /// reset it to the sentinel (spec §4.F `Seek`, §8 boundary
    /// behaviors).
    pub fn seek(&self, topic: &str, group: &str, msg_id: i64) -> Result<()> {
        self.check_healthy()?;
        let lock = self
            .topic_locks
            .get(topic)
            .ok_or_else(|| Error::TopicNotFound(topic.to_string()))?;
        let _guard = lock.lock();

        // Existence check: `position` errors with `GroupNotFound` if
        // `(topic, group)` was never created.
        self.consumers.position(topic, group)?;

        if self.store.has(&keys::payload_key(topic, msg_id))? {
            self.consumers.set_position(topic, group, msg_id)?;
        } else {
            warn!(topic, group, msg_id, "seek target absent, resetting to sentinel");
            self.consumers.set_position(topic, group, SENTINEL_POSITION)?;
        }
        Ok(())
    }

    /// Set `group`'s position to one past the topic's tail (spec §4.F
    /// `SeekToLatest`, §8 Scenario 7).
    pub fn seek_to_latest(&self, topic: &str, group: &str) -> Result<()> {
        self.check_healthy()?;
        let lock = self
            .topic_locks
            .get(topic)
            .ok_or_else(|| Error::TopicNotFound(topic.to_string()))?;
        let _guard = lock.lock();

        self.consumers.position(topic, group)?;
        let latest = latest_msg_id(self.store.as_ref(), topic)?;
        self.consumers.set_position(topic, group, latest + 1)?;
        Ok(())
    }

    /// The greatest message id produced on `topic`, or the sentinel if
    /// empty (spec §4.F `GetLatestMsg`).
    pub fn get_latest_msg(&self, topic: &str) -> Result<i64> {
        self.check_healthy()?;
        if !self.topic_locks.contains(topic) {
            return Err(Error::TopicNotFound(topic.to_string()));
        }
        latest_msg_id(self.store.as_ref(), topic)
    }

    /// Whether `topic` exists and is currently empty (spec §4.F
    /// `CheckTopicValid`, used by callers to guarantee an empty topic).
    pub fn check_topic_valid(&self, topic: &str) -> Result<bool> {
        Ok(self.get_latest_msg(topic)? == SENTINEL_POSITION)
    }

    /// Non-blocking, coalesced wakeup of `group`'s handle on `topic`
    /// (spec §4.F `Notify`).
    pub fn notify(&self, topic: &str, group: &str) -> Result<()> {
        self.check_healthy()?;
        self.consumers.notify_group(topic, group);
        Ok(())
    }

    // ---- Close -------------------------------------------------------------

    /// Stop serving, stop the retention worker, destroy every consumer
    /// group, and flush the store. Idempotent (spec §4.F `Close`).
    pub fn close(&self) {
        if self
            .state
            .swap(STATE_STOPPED, Ordering::AcqRel)
            == STATE_STOPPED
        {
            return;
        }
        if let Some(mut worker) = self.retention.lock().take() {
            worker.stop();
        }
        self.consumers.clear();
        self.allocators.clear();
        if let Err(e) = self.store.flush() {
            warn!(%e, "failed to flush store on close");
        }
        info!("broker closed");
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.close();
    }
}

fn latest_msg_id(store: &dyn KvStore, topic: &str) -> Result<i64> {
    let upper = rmq_storage::add_one_bytes(&keys::payload_prefix(topic));
    match store.seek_for_prev(&upper)? {
        Some((key, _)) if key.starts_with(&keys::payload_prefix(topic)) => {
            Ok(keys::parse_payload_id(&key).unwrap_or(SENTINEL_POSITION))
        }
        _ => Ok(SENTINEL_POSITION),
    }
}

fn topic_locks_len(locks: &TopicLocks) -> usize {
    // Exposed only for the recovery log line; not a public API.
    locks.len()
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmq_core::Config;

    fn broker() -> Broker {
        Broker::in_memory(Config::for_testing()).unwrap()
    }

    #[test]
    fn scenario1_basic_publish_consume() {
        let b = broker();
        b.create_topic("t1").unwrap();
        b.create_consumer_group("t1", "g1").unwrap();
        let ids = b
            .produce(
                "t1",
                vec![
                    ProducerMessage::new(b"a".to_vec()),
                    ProducerMessage::with_properties(
                        b"b".to_vec(),
                        [("k".to_string(), "v".to_string())].into_iter().collect(),
                    ),
                ],
            )
            .unwrap();
        assert_eq!(ids, vec![0, 1]);

        let msgs = b.consume("t1", "g1", 10).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].id, 0);
        assert_eq!(msgs[0].payload, Some(b"a".to_vec()));
        assert_eq!(msgs[0].properties, None);
        assert_eq!(msgs[1].id, 1);
        assert_eq!(
            msgs[1].properties.as_ref().unwrap().get("k"),
            Some(&"v".to_string())
        );

        assert!(b.consume("t1", "g1", 10).unwrap().is_empty());
    }

    #[test]
    fn scenario2_seek_back_replays_messages() {
        let b = broker();
        b.create_topic("t1").unwrap();
        b.create_consumer_group("t1", "g1").unwrap();
        b.produce(
            "t1",
            vec![ProducerMessage::new(b"a".to_vec()), ProducerMessage::new(b"b".to_vec())],
        )
        .unwrap();
        b.consume("t1", "g1", 10).unwrap();

        b.seek("t1", "g1", 0).unwrap();
        let msgs = b.consume("t1", "g1", 10).unwrap();
        assert_eq!(msgs.iter().map(|m| m.id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn scenario3_page_seals_when_size_first_exceeds_threshold() {
        // PageSize=3: two 1-byte messages land at running=2 (no seal);
        // a third, 2-byte message pushes the sum to 4 (> 3), sealing.
        let b = Broker::in_memory(Config::for_testing().with_page_size_bytes(3)).unwrap();
        b.create_topic("t2").unwrap();
        let ids = b
            .produce(
                "t2",
                vec![ProducerMessage::new(b"a".to_vec()), ProducerMessage::new(b"b".to_vec())],
            )
            .unwrap();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(
            PageAccountant::new(b.store.as_ref()).running_size("t2").unwrap(),
            2
        );

        let ids2 = b.produce("t2", vec![ProducerMessage::new(b"cc".to_vec())]).unwrap();
        assert_eq!(ids2, vec![2]);
        let pages = PageAccountant::new(b.store.as_ref()).sealed_pages("t2").unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].end_id, 2);
        assert_eq!(pages[0].size_bytes, 4);
        assert_eq!(
            PageAccountant::new(b.store.as_ref()).running_size("t2").unwrap(),
            0
        );
    }

    #[test]
    fn scenario6_invalid_topic_name_rejected() {
        let b = broker();
        assert!(matches!(
            b.create_topic("bad/name"),
            Err(Error::InvalidName(_))
        ));
        assert!(!b.store.has(&keys::topic_id_key("bad/name")).unwrap());
    }

    #[test]
    fn create_topic_is_idempotent() {
        let b = broker();
        b.create_topic("t1").unwrap();
        b.create_topic("t1").unwrap();
    }

    #[test]
    fn destroy_topic_removes_every_prefixed_key() {
        let b = broker();
        b.create_topic("t1").unwrap();
        b.produce("t1", vec![ProducerMessage::new(b"a".to_vec())]).unwrap();
        b.destroy_topic("t1").unwrap();

        assert!(b.store.load_with_prefix("t1/").unwrap().is_empty());
        assert!(b.store.load_with_prefix(&keys::properties_prefix("t1")).unwrap().is_empty());
        assert!(!b.store.has(&keys::topic_id_key("t1")).unwrap());
        assert!(!b.store.has(&keys::message_size_key("t1")).unwrap());
        assert!(matches!(
            b.produce("t1", vec![ProducerMessage::new(b"x".to_vec())]),
            Err(Error::TopicNotFound(_))
        ));
    }

    #[test]
    fn seek_to_missing_id_resets_to_sentinel() {
        let b = broker();
        b.create_topic("t1").unwrap();
        b.create_consumer_group("t1", "g1").unwrap();
        b.produce("t1", vec![ProducerMessage::new(b"a".to_vec())]).unwrap();
        b.seek("t1", "g1", 99).unwrap();
        let msgs = b.consume("t1", "g1", 10).unwrap();
        // sentinel means "before any message" so the existing message 0
        // is still delivered.
        assert_eq!(msgs.iter().map(|m| m.id).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn seek_to_latest_then_consume_returns_empty() {
        let b = broker();
        b.create_topic("t1").unwrap();
        b.create_consumer_group("t1", "g1").unwrap();
        b.produce(
            "t1",
            vec![ProducerMessage::new(b"a".to_vec()), ProducerMessage::new(b"b".to_vec())],
        )
        .unwrap();
        b.seek_to_latest("t1", "g1").unwrap();
        assert!(b.consume("t1", "g1", 10).unwrap().is_empty());
    }

    #[test]
    fn consume_n_zero_returns_empty_and_leaves_position() {
        let b = broker();
        b.create_topic("t1").unwrap();
        b.create_consumer_group("t1", "g1").unwrap();
        b.produce("t1", vec![ProducerMessage::new(b"a".to_vec())]).unwrap();
        assert!(b.consume("t1", "g1", 0).unwrap().is_empty());
        let msgs = b.consume("t1", "g1", 10).unwrap();
        assert_eq!(msgs[0].id, 0);
    }

    #[test]
    fn empty_payload_roundtrips_as_none() {
        let b = broker();
        b.create_topic("t1").unwrap();
        b.create_consumer_group("t1", "g1").unwrap();
        b.produce("t1", vec![ProducerMessage::new(Vec::new())]).unwrap();
        let msgs = b.consume("t1", "g1", 10).unwrap();
        assert_eq!(msgs[0].payload, None);
        assert_eq!(msgs[0].properties, None);
    }

    #[test]
    fn scenario5_ack_requires_every_group_to_advance() {
        let b = Broker::in_memory(Config::for_testing().with_page_size_bytes(2)).unwrap();
        b.create_topic("t3").unwrap();
        b.create_consumer_group("t3", "g1").unwrap();
        b.create_consumer_group("t3", "g2").unwrap();
        b.produce(
            "t3",
            vec![
                ProducerMessage::new(vec![0u8; 2]),
                ProducerMessage::new(vec![0u8; 2]),
                ProducerMessage::new(vec![0u8; 2]),
                ProducerMessage::new(vec![0u8; 2]),
            ],
        )
        .unwrap();
        b.consume("t3", "g1", 10).unwrap();

        let pages = PageAccountant::new(b.store.as_ref()).sealed_pages("t3").unwrap();
        assert!(!pages.is_empty());
        assert!(pages[0].acked_ts.is_none(), "g2 has not advanced yet");
    }

    #[test]
    fn close_is_idempotent_and_rejects_further_operations() {
        let b = broker();
        b.create_topic("t1").unwrap();
        b.close();
        b.close();
        assert!(matches!(b.create_topic("t2"), Err(Error::NotServing)));
    }
}
