//! Retention worker: periodic page pruning by age and residual size
//! (spec §4.G).
//!
//! One dedicated thread, two timer channels (`retention_tick`,
//! `compaction_tick`) and one stop channel, multiplexed with
//! `crossbeam_channel::select!` (spec §5 "multiplexed via a cooperative
//! select"), the same dedicated-worker-thread shape as the teacher's
//! `BackgroundScheduler` (`crates/engine/src/background.rs`) and this
//! core's own [`crate::page_accountant`]-reads-the-store-directly
//! stance: the worker holds no page index of its own, only the
//! per-topic `lastRetentionTs` map spec §4.G names.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};
use dashmap::DashMap;
use rmq_concurrency::TopicLocks;
use rmq_core::{keys, Config, Result};
use rmq_storage::{KvStore, WriteBatch};
use tracing::{debug, error, warn};

use crate::page_accountant::{PageAccountant, SealedPage};

/// Owns the retention worker's background thread.
pub struct RetentionWorker {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl RetentionWorker {
    /// Spawn the worker thread. `registry` maps topic name to the Unix
    /// timestamp it was last checked (spec: `topicRetentionTime`);
    /// `Broker::open` seeds it from recovered `topic_id` keys and keeps
    /// it updated on `CreateTopic`/`DestroyTopic`.
    pub fn spawn(
        store: Arc<dyn KvStore>,
        topic_locks: Arc<TopicLocks>,
        registry: Arc<DashMap<String, i64>>,
        config: Config,
    ) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = std::thread::Builder::new()
            .name("rmq-retention".to_string())
            .spawn(move || run(store, topic_locks, registry, config, stop_rx))
            .expect("failed to spawn retention worker thread");

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the worker to stop and join its thread. Idempotent.
    pub fn stop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RetentionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    store: Arc<dyn KvStore>,
    topic_locks: Arc<TopicLocks>,
    registry: Arc<DashMap<String, i64>>,
    config: Config,
    stop_rx: crossbeam_channel::Receiver<()>,
) {
    let retention_tick = tick(Duration::from_secs(config.tick_interval_seconds.max(1)));
    let compaction_tick = tick(Duration::from_secs(config.compaction_interval_seconds.max(1)));

    loop {
        select! {
            recv(stop_rx) -> _ => {
                debug!("retention worker stopping");
                break;
            }
            recv(retention_tick) -> _ => {
                run_retention_pass(&store, &topic_locks, &registry, &config);
            }
            recv(compaction_tick) -> _ => {
                if let Err(e) = store.compact() {
                    error!(%e, "compaction request failed");
                }
            }
        }
    }
}

fn run_retention_pass(
    store: &Arc<dyn KvStore>,
    topic_locks: &Arc<TopicLocks>,
    registry: &Arc<DashMap<String, i64>>,
    config: &Config,
) {
    let now = now_unix();
    let due_topics: Vec<String> = registry
        .iter()
        .filter(|e| *e.value() + config.check_interval_seconds < now)
        .map(|e| e.key().clone())
        .collect();

    for topic in due_topics {
        match expired_clean_up(store.as_ref(), topic_locks, config, &topic) {
            Ok(()) => {}
            Err(e) => {
                error!(topic = %topic, %e, "retention cleanup failed, will retry next tick");
            }
        }
        // Re-stamp even on failure: spec §4.G "failures are logged and
        // the worker continues on the next tick", not retried sooner.
        if let Some(mut ts) = registry.get_mut(&topic) {
            *ts = now;
        }
    }
}

/// One topic's retention pass (spec §4.G `expiredCleanUp`).
fn expired_clean_up(
    store: &dyn KvStore,
    topic_locks: &Arc<TopicLocks>,
    config: &Config,
    topic: &str,
) -> Result<()> {
    let accountant = PageAccountant::new(store);
    let pages = accountant.sealed_pages(topic)?;

    // Step 1: totalAckedSize, stopping at the first page lacking an ack
    // (ack timestamps are monotone along page order by invariant).
    let mut total_acked_size: u64 = 0;
    for page in &pages {
        match page.acked_ts {
            Some(_) => total_acked_size += page.size_bytes,
            None => break,
        }
    }
    if total_acked_size == 0 {
        return Ok(());
    }

    // Step 3: time-based phase.
    let now = now_unix();
    let mut deleted_acked_size: u64 = 0;
    let mut selected: Option<i64> = None;
    let mut consumed = 0usize;
    for page in &pages {
        let Some(acked_ts) = page.acked_ts else { break };
        if now - acked_ts >= config.retention_seconds {
            deleted_acked_size += page.size_bytes;
            selected = Some(page.end_id);
            consumed += 1;
        } else {
            break;
        }
    }

    // Step 4: size-based phase, continuing where the time phase stopped.
    if config.retention_size_bytes > 0 {
        for page in &pages[consumed..] {
            if page.acked_ts.is_none() {
                break;
            }
            let residual_after =
                total_acked_size as i64 - (deleted_acked_size + page.size_bytes) as i64;
            if residual_after > config.retention_size_bytes {
                deleted_acked_size += page.size_bytes;
                selected = Some(page.end_id);
            } else {
                break;
            }
        }
    }

    let Some(page_end_id) = selected else {
        return Ok(());
    };
    clean_data(store, topic_locks, topic, page_end_id)
}

/// Atomically range-delete every sealed page's metadata and payload up
/// to and including `page_end_id` (spec §4.G `cleanData`).
fn clean_data(
    store: &dyn KvStore,
    topic_locks: &Arc<TopicLocks>,
    topic: &str,
    page_end_id: i64,
) -> Result<()> {
    // Topic may have been destroyed concurrently between the scan above
    // and this point; nothing to clean in that case.
    let Some(lock) = topic_locks.get(topic) else {
        warn!(topic, "retention: topic lock gone, skipping cleanup");
        return Ok(());
    };
    let _guard = lock.lock();

    let next = page_end_id + 1;
    let mut batch = WriteBatch::new();
    batch.delete_range(
        keys::page_message_size_prefix(topic),
        keys::page_message_size_key(topic, next).into_bytes(),
    );
    batch.delete_range(
        keys::page_ts_prefix(topic),
        keys::page_ts_key(topic, next).into_bytes(),
    );
    batch.delete_range(
        keys::acked_ts_prefix(topic),
        keys::acked_ts_key(topic, next).into_bytes(),
    );
    batch.delete_range(
        keys::payload_key(topic, 0),
        keys::payload_key(topic, next).into_bytes(),
    );
    store.apply(batch)?;
    debug!(topic, page_end_id, "retention: pruned pages up to end_id");
    Ok(())
}

#[allow(dead_code)]
fn page_age(page: &SealedPage, now: i64) -> i64 {
    now - page.seal_ts
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmq_storage::MemKvStore;

    fn setup() -> (MemKvStore, Arc<TopicLocks>) {
        let store = MemKvStore::in_memory();
        let locks = Arc::new(TopicLocks::new());
        locks.get_or_create("t");
        (store, locks)
    }

    #[test]
    fn no_cleanup_when_nothing_acked() {
        let (store, locks) = setup();
        let acct = PageAccountant::new(&store);
        acct.account_produce("t", &[0], &[10], 5, 100).unwrap();
        let config = Config::for_testing();
        expired_clean_up(&store, &locks, &config, "t").unwrap();
        assert_eq!(acct.sealed_pages("t").unwrap().len(), 1);
    }

    #[test]
    fn scenario4_retention_deletes_fully_acked_page() {
        let (store, locks) = setup();
        let acct = PageAccountant::new(&store);
        // page size 3: two 1-byte messages land at running=2 (no seal),
        // a third 2-byte message pushes the sum to 4 (> 3), sealing at id 2.
        acct.account_produce("t", &[0, 1, 2], &[1, 1, 2], 3, 0).unwrap();
        acct.update_acks("t", &[("g".into(), 3)], -1, 3).unwrap();
        assert!(acct.sealed_pages("t").unwrap()[0].acked_ts.is_some());

        let config = Config::for_testing(); // retention_seconds=0, retention_size_bytes=0
        expired_clean_up(&store, &locks, &config, "t").unwrap();

        assert!(store.load_with_prefix("t/").unwrap().is_empty());
        assert!(acct.sealed_pages("t").unwrap().is_empty());
    }

    #[test]
    fn does_not_delete_unacked_pages_even_if_old() {
        let (store, locks) = setup();
        let acct = PageAccountant::new(&store);
        acct.account_produce("t", &[0], &[10], 5, 0).unwrap();
        // no update_acks call: the page never gets an acked_ts.
        let config = Config::for_testing();
        expired_clean_up(&store, &locks, &config, "t").unwrap();
        assert_eq!(acct.sealed_pages("t").unwrap().len(), 1);
    }

    #[test]
    fn size_phase_stops_once_residual_budget_is_satisfied() {
        let (store, locks) = setup();
        let acct = PageAccountant::new(&store);
        // Four pages of size 10 each, all acked; retention_seconds huge so
        // the time phase selects nothing, leaving the size phase to decide.
        acct.account_produce("t", &[0, 1, 2, 3], &[10, 10, 10, 10], 9, 0)
            .unwrap();
        acct.update_acks("t", &[("g".into(), 4)], -1, 4).unwrap();

        let mut config = Config::for_testing();
        config.retention_seconds = 1_000_000;
        config.retention_size_bytes = 15; // residual budget: keep ~15 bytes

        expired_clean_up(&store, &locks, &config, "t").unwrap();
        let remaining = acct.sealed_pages("t").unwrap();
        // total=40, keep residual>15 after each delete: delete 0 (residual
        // 30>15), delete 1 (residual 20>15), delete 2 (residual 10, not >15,
        // stop) -> ids 0,1 deleted, 2,3 remain.
        assert_eq!(
            remaining.iter().map(|p| p.end_id).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }
}
