//! WAL writer: appends checksum-framed batches and fsyncs per the
//! configured `DurabilityMode`. Mirrors the teacher's
//! `wal::writer`/`wal::durability` split (`crates/durability/src/wal/
//! writer.rs`) but against one append-only file instead of rotated
//! segments — this core has no multi-GB retention horizon to rotate
//! against, since the retention worker itself deletes the bulk of the
//! data (see crate docs).

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rmq_core::DurabilityMode;

use crate::batch::WriteBatch;
use crate::error::Result;
use crate::wal::record::{ops_from_batch, write_frame};

struct WriterState {
    file: BufWriter<File>,
    bytes_since_sync: u64,
    writes_since_sync: usize,
    last_sync: std::time::Instant,
}

/// Appends WAL frames and fsyncs according to `DurabilityMode`.
pub struct WalWriter {
    path: PathBuf,
    mode: DurabilityMode,
    state: Mutex<WriterState>,
}

impl WalWriter {
    /// Open (creating if absent) the WAL file at `path` for appending.
    pub fn open(path: impl AsRef<Path>, mode: DurabilityMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            path,
            mode,
            state: Mutex::new(WriterState {
                file: BufWriter::new(file),
                bytes_since_sync: 0,
                writes_since_sync: 0,
                last_sync: std::time::Instant::now(),
            }),
        })
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one batch as a single frame, applying the configured
    /// fsync policy. A no-op (returns `Ok`, writes nothing) if the
    /// batch is empty or the mode is `Cache`.
    pub fn append(&self, batch: &WriteBatch) -> Result<()> {
        if batch.is_empty() || !self.mode.requires_wal() {
            return Ok(());
        }
        let ops = ops_from_batch(batch);
        let mut state = self.state.lock();
        let written = write_frame(&mut state.file, &ops)?;
        state.bytes_since_sync += written;
        state.writes_since_sync += 1;

        let should_sync = match self.mode {
            DurabilityMode::Cache => false,
            DurabilityMode::Always => true,
            DurabilityMode::Standard {
                interval_ms,
                batch_size,
            } => {
                state.writes_since_sync >= batch_size
                    || state.last_sync.elapsed().as_millis() as u64 >= interval_ms
            }
        };
        if should_sync {
            sync(&mut state)?;
        }
        Ok(())
    }

    /// Force an fsync regardless of the configured policy, e.g. on
    /// broker close.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        sync(&mut state)
    }
}

fn sync(state: &mut WriterState) -> Result<()> {
    state.file.flush()?;
    state.file.get_ref().sync_data()?;
    state.bytes_since_sync = 0;
    state.writes_since_sync = 0;
    state.last_sync = std::time::Instant::now();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_mode_skips_wal_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let writer = WalWriter::open(&path, DurabilityMode::Cache).unwrap();
        let mut batch = WriteBatch::new();
        batch.put("k", b"v".to_vec());
        writer.append(&batch).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn always_mode_syncs_every_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let writer = WalWriter::open(&path, DurabilityMode::Always).unwrap();
        let mut batch = WriteBatch::new();
        batch.put("k", b"v".to_vec());
        writer.append(&batch).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
