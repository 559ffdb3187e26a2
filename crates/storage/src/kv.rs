//! Ordered KV store adapter (spec §4.A).
//!
//! `KvStore` is the trait the broker and page accountant program
//! against; `MemKvStore` is the one implementation this core ships — an
//! in-memory ordered `BTreeMap` behind a `parking_lot::RwLock`, replayed
//! from and durably appended to a WAL file, the same
//! BTreeMap+RwLock+atomic-counter shape as the teacher's
//! `UnifiedStore` (`crates/storage/src/unified.rs`), minus the
//! version/MVCC bookkeeping this core has no use for.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use rmq_core::Config;
use tracing::debug;

use crate::batch::WriteBatch;
use crate::error::{Result, StorageError};
use crate::wal::{self, WalWriter};

/// Point get/put, multi-get, multi-put, prefix scan, range-delete, and a
/// bounded iterator over an ordered string-keyed byte-value store (spec
/// §4.A).
pub trait KvStore: Send + Sync {
    /// Point read. `Ok(None)` if absent.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Batched point read, preserving input order; `None` per absent key.
    fn multi_load(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        keys.iter().map(|k| self.load(k)).collect()
    }

    /// All entries whose key starts with `prefix`, in key order.
    fn load_with_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Point write.
    fn save(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.apply(batch)
    }

    /// Batched point write, applied atomically.
    fn multi_save(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        let mut batch = WriteBatch::new();
        for (k, v) in entries {
            batch.put(k, v);
        }
        self.apply(batch)
    }

    /// Point delete. A no-op if the key is absent.
    fn remove(&self, key: &str) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.apply(batch)
    }

    /// Batched point delete, applied atomically.
    fn multi_remove(&self, keys: &[String]) -> Result<()> {
        let mut batch = WriteBatch::new();
        for k in keys {
            batch.delete(k.clone());
        }
        self.apply(batch)
    }

    /// Delete every key with the given prefix.
    fn remove_with_prefix(&self, prefix: &str) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete_range(prefix, crate::add_one_bytes(prefix));
        self.apply(batch)
    }

    /// Atomic range-delete `[start, end_exclusive)`.
    fn delete_range(&self, start: &str, end_exclusive: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete_range(start, end_exclusive.to_vec());
        self.apply(batch)
    }

    /// Existence check.
    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.load(key)?.is_some())
    }

    /// Whether any key has the given prefix.
    fn has_prefix(&self, prefix: &str) -> Result<bool>;

    /// Apply a batch of puts/deletes/range-deletes atomically. All other
    /// mutating methods are expressed in terms of this one so there is a
    /// single code path that takes the write lock and a single code
    /// path that appends to the WAL.
    fn apply(&self, batch: WriteBatch) -> Result<()>;

    /// Forward iteration starting at `start` (inclusive), stopping
    /// before `upper_bound_exclusive` if given, else at the end of the
    /// keyspace.
    fn iter_range(
        &self,
        start: &str,
        upper_bound_exclusive: Option<&[u8]>,
    ) -> Result<Vec<(String, Vec<u8>)>>;

    /// Forward iteration like [`iter_range`](Self::iter_range), but
    /// stopping after at most `limit` entries regardless of how much
    /// keyspace remains. `consume` uses this so a small `n` against a
    /// large backlog costs O(n), not O(backlog): callers that only need
    /// a handful of rows from the front of a range should never pay to
    /// materialize and clone the rest.
    ///
    /// Implementors should override this directly when they can stop an
    /// underlying iterator early; the default falls back to a full
    /// `iter_range` plus `truncate`, which is no better than calling
    /// `iter_range` yourself.
    fn iter_range_limited(
        &self,
        start: &str,
        upper_bound_exclusive: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(String, Vec<u8>)>> {
        let mut out = self.iter_range(start, upper_bound_exclusive)?;
        out.truncate(limit);
        Ok(out)
    }

    /// The greatest entry whose key is strictly less than
    /// `upper_bound_exclusive` (used to find a topic's tail message;
    /// spec §4.F `SeekToLatest`/`GetLatestMsg`, GLOSSARY "SeekForPrev").
    fn seek_for_prev(&self, upper_bound_exclusive: &[u8]) -> Result<Option<(String, Vec<u8>)>>;

    /// Request a full compaction of the underlying engine. Advisory;
    /// `MemKvStore` has no background compaction to trigger (spec
    /// §4.G compaction tick).
    fn compact(&self) -> Result<()> {
        Ok(())
    }

    /// Flush any buffered durability state (e.g. fsync the WAL) so a
    /// subsequent crash cannot lose acknowledged writes.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory ordered store backed by a `BTreeMap`, durable via a replayed
/// WAL file.
pub struct MemKvStore {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
    wal: Option<WalWriter>,
}

impl MemKvStore {
    /// Open (or create) the broker's data directory at `path` and replay
    /// its WAL, if the configured durability mode uses one (spec §6
    /// "creates the directory with default permissions if it does not
    /// exist; rejects a path that exists but is not a directory").
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        ensure_directory(path)?;

        let wal_path = wal_path(path);
        let data = if config.durability.requires_wal() {
            wal::replay(&wal_path)?
        } else {
            BTreeMap::new()
        };
        debug!(keys = data.len(), ?path, "storage opened");

        let wal = if config.durability.requires_wal() {
            Some(WalWriter::open(&wal_path, config.durability)?)
        } else {
            None
        };

        Ok(Self {
            data: RwLock::new(data),
            wal,
        })
    }

    /// An ephemeral store with no backing directory or WAL, for tests
    /// and `DurabilityMode::Cache` callers that never touch disk.
    pub fn in_memory() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            wal: None,
        }
    }
}

fn wal_path(dir: &Path) -> PathBuf {
    dir.join("rocksmq.wal")
}

fn ensure_directory(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(StorageError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            std::fs::create_dir_all(path)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

impl KvStore for MemKvStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn load_with_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let upper = crate::add_one_bytes(prefix);
        let data = self.data.read();
        Ok(data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.as_bytes() < upper.as_slice())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn has_prefix(&self, prefix: &str) -> Result<bool> {
        let upper = crate::add_one_bytes(prefix);
        let data = self.data.read();
        Ok(data
            .range(prefix.to_string()..)
            .next()
            .map(|(k, _)| k.as_bytes() < upper.as_slice())
            .unwrap_or(false))
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        if let Some(wal) = &self.wal {
            wal.append(&batch)?;
        }
        let mut data = self.data.write();
        for (k, v) in batch.puts {
            data.insert(k, v);
        }
        for k in batch.deletes {
            data.remove(&k);
        }
        for range in batch.delete_ranges {
            let keys: Vec<String> = data
                .range(range.start.clone()..)
                .take_while(|(k, _)| k.as_bytes() < range.end_exclusive.as_slice())
                .map(|(k, _)| k.clone())
                .collect();
            for k in keys {
                data.remove(&k);
            }
        }
        Ok(())
    }

    fn iter_range(
        &self,
        start: &str,
        upper_bound_exclusive: Option<&[u8]>,
    ) -> Result<Vec<(String, Vec<u8>)>> {
        let data = self.data.read();
        let iter = data.range(start.to_string()..);
        let out: Vec<(String, Vec<u8>)> = match upper_bound_exclusive {
            Some(upper) => iter
                .take_while(|(k, _)| k.as_bytes() < upper)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => iter.map(|(k, v)| (k.clone(), v.clone())).collect(),
        };
        Ok(out)
    }

    fn iter_range_limited(
        &self,
        start: &str,
        upper_bound_exclusive: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(String, Vec<u8>)>> {
        let data = self.data.read();
        let iter = data.range(start.to_string()..);
        let out: Vec<(String, Vec<u8>)> = match upper_bound_exclusive {
            Some(upper) => iter
                .take_while(|(k, _)| k.as_bytes() < upper)
                .take(limit)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => iter.take(limit).map(|(k, v)| (k.clone(), v.clone())).collect(),
        };
        Ok(out)
    }

    fn seek_for_prev(&self, upper_bound_exclusive: &[u8]) -> Result<Option<(String, Vec<u8>)>> {
        let data = self.data.read();
        Ok(data
            .range(..)
            .filter(|(k, _)| k.as_bytes() < upper_bound_exclusive)
            .next_back()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn flush(&self) -> Result<()> {
        if let Some(wal) = &self.wal {
            wal.flush()?;
        }
        Ok(())
    }
}
