//! Page accountant: page sealing and ack bookkeeping (spec §4.E).
//!
//! Pages are never an in-memory structure of their own — they are
//! derived entirely from the four metadata keyspaces
//! (`message_size`, `page_message_size`, `page_ts`, `acked_ts`), the
//! same "derive the view from the store, keep no shadow index" stance
//! the teacher's `retention::policy` module takes toward run metadata
//! (`crates/storage/src/retention/policy.rs`): a policy module that
//! reads whatever the store already has, never a structure the store
//! has to be kept in sync with.

use rmq_core::keys;
use rmq_core::Result;
use rmq_storage::{KvStore, WriteBatch};

/// A sealed page as reconstructed from the metadata keyspaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealedPage {
    /// Message id that caused this page to seal.
    pub end_id: i64,
    /// Byte sum at seal time.
    pub size_bytes: u64,
    /// Unix-seconds seal timestamp.
    pub seal_ts: i64,
    /// Unix-seconds ack timestamp, if every consumer group has advanced
    /// past `end_id`.
    pub acked_ts: Option<i64>,
}

/// Stateless accessor over one topic's page metadata in `store`. Holds
/// no data of its own; every method reads/writes `store` directly so
/// the broker and retention worker always see the same ground truth.
pub struct PageAccountant<'a, K: KvStore + ?Sized> {
    store: &'a K,
}

impl<'a, K: KvStore + ?Sized> PageAccountant<'a, K> {
    /// Wrap a store reference.
    pub fn new(store: &'a K) -> Self {
        Self { store }
    }

    /// Current running open-page byte sum for `topic` (0 if absent).
    pub fn running_size(&self, topic: &str) -> Result<u64> {
        match self.store.load(&keys::message_size_key(topic))? {
            Some(bytes) => Ok(parse_u64(&bytes)),
            None => Ok(0),
        }
    }

    /// Account for a produced batch: walk `(id, size)` pairs in order,
    /// sealing a page at the first id whose inclusion makes the running
    /// sum exceed `page_size_bytes`, and persist the resulting state in
    /// one atomic batch (spec §4.E).
    pub fn account_produce(
        &self,
        topic: &str,
        ids: &[i64],
        sizes: &[usize],
        page_size_bytes: u64,
        now: i64,
    ) -> Result<()> {
        debug_assert_eq!(ids.len(), sizes.len());
        let mut running = self.running_size(topic)?;
        let mut batch = WriteBatch::new();
        for (&id, &size) in ids.iter().zip(sizes.iter()) {
            running += size as u64;
            if running > page_size_bytes {
                batch.put(keys::page_message_size_key(topic, id), running.to_string());
                batch.put(keys::page_ts_key(topic, id), now.to_string());
                running = 0;
            }
        }
        batch.put(keys::message_size_key(topic), running.to_string());
        self.store.apply(batch)?;
        Ok(())
    }

    /// Sealed pages with `end_id` in `[start_id_incl, end_id_incl]`, in
    /// ascending order, joined with their seal and ack timestamps.
    pub fn sealed_pages_in_range(
        &self,
        topic: &str,
        start_id_incl: i64,
        end_id_incl: i64,
    ) -> Result<Vec<SealedPage>> {
        let prefix = keys::page_message_size_prefix(topic);
        let start_key = keys::page_message_size_key(topic, start_id_incl);
        let upper = rmq_storage::add_one_bytes(&keys::page_message_size_key(topic, end_id_incl));
        let entries = self.store.iter_range(&start_key, Some(&upper))?;
        let mut pages = Vec::new();
        for (key, size_bytes) in entries {
            if !key.starts_with(&prefix) {
                continue;
            }
            let Some(end_id) = keys::parse_page_end_id(&key) else {
                continue;
            };
            pages.push(self.load_page(topic, end_id, parse_u64(&size_bytes))?);
        }
        Ok(pages)
    }

    /// Every sealed page for `topic`, in ascending `end_id` order.
    pub fn sealed_pages(&self, topic: &str) -> Result<Vec<SealedPage>> {
        self.sealed_pages_in_range(topic, 0, i64::MAX)
    }

    fn load_page(&self, topic: &str, end_id: i64, size_bytes: u64) -> Result<SealedPage> {
        let seal_ts = self
            .store
            .load(&keys::page_ts_key(topic, end_id))?
            .map(|b| parse_i64(&b))
            .unwrap_or(0);
        let acked_ts = self
            .store
            .load(&keys::acked_ts_key(topic, end_id))?
            .map(|b| parse_i64(&b));
        Ok(SealedPage {
            end_id,
            size_bytes,
            seal_ts,
            acked_ts,
        })
    }

    /// After a consumer group advances from `old_pos` to `new_pos`,
    /// mark every sealed page with `end_id` in `[old_pos, new_pos - 1]`
    /// acked if every group in `all_positions` (the full per-topic
    /// position snapshot, including the one that just advanced) now
    /// sits past that page's `end_id` (spec §4.E, §8 invariant 4/
    /// Scenario 5).
    pub fn update_acks(
        &self,
        topic: &str,
        all_positions: &[(String, i64)],
        old_pos: i64,
        new_pos: i64,
    ) -> Result<()> {
        if new_pos <= old_pos {
            return Ok(());
        }
        let pages = self.sealed_pages_in_range(topic, old_pos, new_pos - 1)?;
        if pages.is_empty() {
            return Ok(());
        }
        let now = now_unix();
        let mut batch = WriteBatch::new();
        for page in pages {
            if page.acked_ts.is_some() {
                continue;
            }
            let fully_acked = all_positions.iter().all(|(_, pos)| *pos > page.end_id);
            if fully_acked {
                batch.put(keys::acked_ts_key(topic, page.end_id), now.to_string());
            }
        }
        if !batch.is_empty() {
            self.store.apply(batch)?;
        }
        Ok(())
    }
}

fn parse_u64(bytes: &[u8]) -> u64 {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

fn parse_i64(bytes: &[u8]) -> i64 {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
