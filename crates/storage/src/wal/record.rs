//! WAL record framing: `[u32 len][u32 crc32][payload]`, one frame per
//! batch. Mirrors the teacher's `format/wal_record.rs` length+checksum
//! framing, simplified to a single growable log file rather than
//! rotated segments (see crate docs for why the split was dropped).

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::batch::{RangeDelete, WriteBatch};
use crate::error::{Result, StorageError};

const TAG_PUT: u8 = 1;
const TAG_DELETE: u8 = 2;
const TAG_DELETE_RANGE: u8 = 3;

/// One WAL-durable operation. A `WriteBatch` is serialized as a length
/// followed by this many encoded ops, all under one checksum frame so
/// replay either applies the whole batch or none of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalOp {
    /// Point write.
    Put(String, Vec<u8>),
    /// Point delete.
    Delete(String),
    /// Range delete `[start, end_exclusive)`.
    DeleteRange(String, Vec<u8>),
}

impl WalOp {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            WalOp::Put(k, v) => {
                out.push(TAG_PUT);
                write_bytes(out, k.as_bytes());
                write_bytes(out, v);
            }
            WalOp::Delete(k) => {
                out.push(TAG_DELETE);
                write_bytes(out, k.as_bytes());
            }
            WalOp::DeleteRange(start, end) => {
                out.push(TAG_DELETE_RANGE);
                write_bytes(out, start.as_bytes());
                write_bytes(out, end);
            }
        }
    }

    fn decode(cursor: &mut &[u8]) -> Option<WalOp> {
        let tag = *cursor.first()?;
        *cursor = &cursor[1..];
        match tag {
            TAG_PUT => {
                let k = read_bytes(cursor)?;
                let v = read_bytes(cursor)?;
                Some(WalOp::Put(String::from_utf8(k).ok()?, v))
            }
            TAG_DELETE => {
                let k = read_bytes(cursor)?;
                Some(WalOp::Delete(String::from_utf8(k).ok()?))
            }
            TAG_DELETE_RANGE => {
                let start = read_bytes(cursor)?;
                let end = read_bytes(cursor)?;
                Some(WalOp::DeleteRange(String::from_utf8(start).ok()?, end))
            }
            _ => None,
        }
    }
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.write_u32::<LittleEndian>(bytes.len() as u32).unwrap();
    out.extend_from_slice(bytes);
}

fn read_bytes(cursor: &mut &[u8]) -> Option<Vec<u8>> {
    if cursor.len() < 4 {
        return None;
    }
    let len = (&cursor[..4]).read_u32::<LittleEndian>().ok()? as usize;
    *cursor = &cursor[4..];
    if cursor.len() < len {
        return None;
    }
    let bytes = cursor[..len].to_vec();
    *cursor = &cursor[len..];
    Some(bytes)
}

/// Convert a `WriteBatch` into the op list a WAL frame carries.
pub fn ops_from_batch(batch: &WriteBatch) -> Vec<WalOp> {
    let mut ops = Vec::with_capacity(batch.puts.len() + batch.deletes.len() + batch.delete_ranges.len());
    for (k, v) in &batch.puts {
        ops.push(WalOp::Put(k.clone(), v.clone()));
    }
    for k in &batch.deletes {
        ops.push(WalOp::Delete(k.clone()));
    }
    for RangeDelete { start, end_exclusive } in &batch.delete_ranges {
        ops.push(WalOp::DeleteRange(start.clone(), end_exclusive.clone()));
    }
    ops
}

/// Serialize a batch of ops into one checksum-framed record.
pub fn encode_frame(ops: &[WalOp]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload
        .write_u32::<LittleEndian>(ops.len() as u32)
        .unwrap();
    for op in ops {
        op.encode(&mut payload);
    }
    let crc = crc32fast::hash(&payload);
    let mut frame = Vec::with_capacity(payload.len() + 8);
    frame
        .write_u32::<LittleEndian>(payload.len() as u32)
        .unwrap();
    frame.write_u32::<LittleEndian>(crc).unwrap();
    frame.extend_from_slice(&payload);
    frame
}

/// Write one frame to `w`, returning the number of bytes written.
pub fn write_frame<W: Write>(w: &mut W, ops: &[WalOp]) -> io::Result<u64> {
    let frame = encode_frame(ops);
    w.write_all(&frame)?;
    Ok(frame.len() as u64)
}

/// Read one frame's ops from a reader positioned at a frame boundary.
/// Returns `Ok(None)` at a clean end-of-file. A truncated length/crc
/// header or a short payload is reported via `StorageError::Truncated`
/// so the caller can stop replay without failing the whole open.
pub fn read_frame<R: Read>(r: &mut R, offset: u64) -> Result<Option<Vec<WalOp>>> {
    let mut header = [0u8; 8];
    match read_exact_or_eof(r, &mut header)? {
        0 => return Ok(None),
        n if n < 8 => return Err(StorageError::Truncated { offset }),
        _ => {}
    }
    let len = (&header[0..4]).read_u32::<LittleEndian>().unwrap() as usize;
    let expected_crc = (&header[4..8]).read_u32::<LittleEndian>().unwrap();
    let mut payload = vec![0u8; len];
    if read_exact_or_eof(r, &mut payload)? != len {
        return Err(StorageError::Truncated { offset });
    }
    let actual_crc = crc32fast::hash(&payload);
    if actual_crc != expected_crc {
        return Err(StorageError::ChecksumMismatch { offset });
    }
    let mut cursor: &[u8] = &payload;
    let count = cursor.read_u32::<LittleEndian>().map_err(StorageError::Io)? as usize;
    let mut ops = Vec::with_capacity(count);
    for _ in 0..count {
        match WalOp::decode(&mut cursor) {
            Some(op) => ops.push(op),
            None => return Err(StorageError::Truncated { offset }),
        }
    }
    Ok(Some(ops))
}

/// Like `Read::read_exact` but returns the number of bytes actually read
/// instead of erroring when the reader is at or near EOF.
fn read_exact_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}
