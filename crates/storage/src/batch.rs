//! Atomic write-batch builder (spec §4.A: "atomic write-batches").
//!
//! Every multi-key mutation the broker and page accountant perform
//! (produce, page sealing, `DestroyTopic`, retention cleanup) is built as
//! one `WriteBatch` and applied in a single call, mirroring the teacher's
//! `apply_batch` convention (`crates/storage/src/unified.rs`) of taking
//! every lock once for the whole batch rather than once per key.

/// One pending range-delete: `[start, end_exclusive)` over the ordered
/// keyspace. `end_exclusive` is raw bytes so it can carry the extra byte
/// `AddOne` appends past the largest valid UTF-8 string.
#[derive(Debug, Clone)]
pub struct RangeDelete {
    /// Inclusive start key.
    pub start: String,
    /// Exclusive end bound, typically produced by `keys::add_one`.
    pub end_exclusive: Vec<u8>,
}

/// A batch of puts, point-deletes, and range-deletes applied atomically.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub(crate) puts: Vec<(String, Vec<u8>)>,
    pub(crate) deletes: Vec<String>,
    pub(crate) delete_ranges: Vec<RangeDelete>,
}

impl WriteBatch {
    /// Start an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a point write.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.puts.push((key.into(), value.into()));
        self
    }

    /// Queue a point delete.
    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.deletes.push(key.into());
        self
    }

    /// Queue a range delete `[start, end_exclusive)`.
    pub fn delete_range(&mut self, start: impl Into<String>, end_exclusive: Vec<u8>) -> &mut Self {
        self.delete_ranges.push(RangeDelete {
            start: start.into(),
            end_exclusive,
        });
        self
    }

    /// True if the batch has no pending operations.
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty() && self.delete_ranges.is_empty()
    }
}
