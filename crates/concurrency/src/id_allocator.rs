//! Batched monotonic id allocator (spec §4.B).
//!
//! One allocator instance serves one topic's id space. Construction
//! spawns a single dedicated thread that drains pending `Gen` requests
//! off a bounded channel and serves them from an in-memory cached range
//! `[cache_next, persisted_end)` that is already durable. Only when a
//! drain's demand exceeds what is cached does the thread advance the
//! persistent counter, by `max(shortfall, refill_quantum)`, before
//! replying. This way `refill_quantum` buys exactly what §4.B promises:
//! fewer counter writes, with the unused tail of a grant held for the
//! next caller instead of discarded. Replies are sent in FIFO order
//! with each requester's `[start, end)` sub-range. Grounded on
//! `examples/original_source/.../cached_generator.go`'s
//! select-loop-batching shape (spec §9 Open Question #2) and on the
//! teacher's dedicated-thread-plus-stop-channel convention
//! (`crates/engine/src/background.rs`).
//!
//! The idle timer and `ForceRefresh` requests both drive the same
//! opportunistic-refill path: when the cache is running low (less than
//! one `refill_quantum` remaining) they top it up ahead of demand, so a
//! subsequent `gen` finds cache already in place instead of paying a
//! synchronous persist (spec §4.B "timer channel triggers opportunistic
//! pre-allocation when idle").
//!
//! The counter is handed to a caller-supplied `persist` closure so this
//! crate stays storage-agnostic; `rmq-engine` wires it to a durable KV
//! key. A grant is never acknowledged before `persist` returns, so a
//! crash can only waste the unused tail of the last grant, never hand
//! out an id twice (spec §4.B "the counter is durable").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::{debug, error};

use crate::error::AllocatorError;

type AllocReply = Sender<std::result::Result<(i64, i64), AllocatorError>>;

enum Request {
    Gen { count: u64, reply: AllocReply },
    ForceRefresh,
}

/// Batched monotonic id allocator for one topic.
pub struct IdAllocator {
    req_tx: Sender<Request>,
    stop_tx: Sender<()>,
    closed: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl IdAllocator {
    /// Start the allocator's dedicated thread. `initial` is the next id
    /// that will be granted (recovered by the caller from durable
    /// state); `refill_quantum` is the minimum range size claimed from
    /// the counter on every drain (spec: `ProducerIdRefillQuantum`).
    /// `persist` is called with the new counter high-water mark after
    /// every advance, before any reply is sent, so a grant is never
    /// acknowledged before it is durable.
    pub fn spawn(
        topic: impl Into<String>,
        initial: i64,
        refill_quantum: u64,
        persist: impl Fn(i64) -> std::io::Result<()> + Send + 'static,
    ) -> Self {
        let topic = topic.into();
        let (req_tx, req_rx) = bounded::<Request>(1024);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let closed = Arc::new(AtomicBool::new(false));
        let closed_thread = Arc::clone(&closed);

        let handle = std::thread::Builder::new()
            .name(format!("rmq-idalloc-{}", topic))
            .spawn(move || {
                run(topic, initial, refill_quantum, persist, req_rx, stop_rx, closed_thread)
            })
            .expect("failed to spawn id allocator thread");

        Self {
            req_tx,
            stop_tx,
            closed,
            handle: Some(handle),
        }
    }

    /// Request a contiguous range of `count` ids: `(start, end)` with
    /// `end - start == count`. Blocks the calling thread until the
    /// allocator thread replies.
    pub fn gen(&self, count: u64) -> std::result::Result<(i64, i64), AllocatorError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AllocatorError::Closed);
        }
        let (reply_tx, reply_rx) = bounded(1);
        if self
            .req_tx
            .send(Request::Gen {
                count,
                reply: reply_tx,
            })
            .is_err()
        {
            return Err(AllocatorError::Closed);
        }
        reply_rx.recv().unwrap_or(Err(AllocatorError::Closed))
    }

    /// Sugar for `gen(1)`.
    pub fn gen_one(&self) -> std::result::Result<i64, AllocatorError> {
        self.gen(1).map(|(start, _)| start)
    }

    /// Nudge the allocator to opportunistically refresh its counter even
    /// with no pending `Gen` request (spec §4.B "timer channel triggers
    /// opportunistic pre-allocation when idle"). Best-effort: dropped
    /// silently if the allocator is closed or its queue is full.
    pub fn force_refresh(&self) {
        let _ = self.req_tx.try_send(Request::ForceRefresh);
    }

    /// Shut the allocator down: every outstanding and future request is
    /// answered with `AllocatorClosed` (spec §4.B, §5 "Cancellation").
    pub fn close(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for IdAllocator {
    fn drop(&mut self) {
        self.close();
    }
}

/// In-memory range `[cache_next, persisted_end)`: ids already covered by
/// a durable counter advance but not yet handed to a requester. Both
/// bounds start at `initial` (nothing cached yet, counter at its
/// recovered high-water mark).
struct Cache {
    cache_next: i64,
    persisted_end: i64,
}

impl Cache {
    fn available(&self) -> u64 {
        (self.persisted_end - self.cache_next) as u64
    }

    /// Ensure at least `needed` ids are cached, persisting a new counter
    /// high-water mark of `cache_next + max(needed, refill_quantum)` if
    /// the current cache falls short. No-op (no persist call) if the
    /// cache already covers `needed`.
    fn ensure(
        &mut self,
        needed: u64,
        refill_quantum: u64,
        persist: &impl Fn(i64) -> std::io::Result<()>,
    ) -> std::io::Result<()> {
        let available = self.available();
        if available >= needed {
            return Ok(());
        }
        let shortfall = needed - available;
        let grant = shortfall.max(refill_quantum);
        let new_end = self.persisted_end + grant as i64;
        persist(new_end)?;
        self.persisted_end = new_end;
        Ok(())
    }

    /// Hand out `count` ids from the cache. Caller must have called
    /// `ensure(count, ...)` first.
    fn take(&mut self, count: u64) -> (i64, i64) {
        let start = self.cache_next;
        let end = start + count as i64;
        self.cache_next = end;
        (start, end)
    }

    /// Top the cache up by one `refill_quantum` if it is running low
    /// (below one quantum remaining), ahead of any pending demand (spec
    /// §4.B "opportunistic pre-allocation when idle").
    fn opportunistic_refill(
        &mut self,
        refill_quantum: u64,
        persist: &impl Fn(i64) -> std::io::Result<()>,
    ) -> std::io::Result<bool> {
        if self.available() >= refill_quantum {
            return Ok(false);
        }
        let new_end = self.persisted_end + refill_quantum as i64;
        persist(new_end)?;
        self.persisted_end = new_end;
        Ok(true)
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    topic: String,
    initial: i64,
    refill_quantum: u64,
    persist: impl Fn(i64) -> std::io::Result<()>,
    req_rx: Receiver<Request>,
    stop_rx: Receiver<()>,
    closed: Arc<AtomicBool>,
) {
    let mut cache = Cache {
        cache_next: initial,
        persisted_end: initial,
    };
    let idle_timer = crossbeam_channel::tick(Duration::from_secs(30));

    'outer: loop {
        select! {
            recv(stop_rx) -> _ => break 'outer,
            recv(req_rx) -> msg => {
                let first = match msg {
                    Ok(r) => r,
                    Err(_) => break 'outer,
                };
                let mut batch = vec![first];
                while let Ok(r) = req_rx.try_recv() {
                    batch.push(r);
                }
                let total: u64 = batch
                    .iter()
                    .map(|r| match r {
                        Request::Gen { count, .. } => *count,
                        Request::ForceRefresh => 0,
                    })
                    .sum();
                if total == 0 {
                    // Only ForceRefresh requests in this drain: top the
                    // cache up ahead of demand rather than granting
                    // nothing.
                    if let Err(e) = cache.opportunistic_refill(refill_quantum, &persist) {
                        error!(topic = %topic, %e, "failed to persist id allocator counter; closing");
                        closed.store(true, Ordering::Release);
                        break 'outer;
                    }
                    continue;
                }
                if let Err(e) = cache.ensure(total, refill_quantum, &persist) {
                    error!(topic = %topic, %e, "failed to persist id allocator counter; closing");
                    closed.store(true, Ordering::Release);
                    reply_all_closed(batch);
                    break 'outer;
                }
                for req in batch {
                    if let Request::Gen { count, reply } = req {
                        let range = cache.take(count);
                        let _ = reply.send(Ok(range));
                    }
                }
            },
            recv(idle_timer) -> _ => {
                match cache.opportunistic_refill(refill_quantum, &persist) {
                    Ok(true) => debug!(topic = %topic, persisted_end = cache.persisted_end, "id allocator idle refill"),
                    Ok(false) => debug!(topic = %topic, persisted_end = cache.persisted_end, "id allocator idle tick, cache sufficient"),
                    Err(e) => {
                        error!(topic = %topic, %e, "failed to persist id allocator counter; closing");
                        closed.store(true, Ordering::Release);
                        break 'outer;
                    }
                }
            }
        }
    }
    closed.store(true, Ordering::Release);
    // Drain anything that arrived after the stop signal so no caller
    // blocks forever waiting on a reply.
    while let Ok(req) = req_rx.try_recv() {
        reply_all_closed(vec![req]);
    }
}

fn reply_all_closed(batch: Vec<Request>) {
    for req in batch {
        if let Request::Gen { reply, .. } = req {
            let _ = reply.send(Err(AllocatorError::Closed));
        }
    }
}
