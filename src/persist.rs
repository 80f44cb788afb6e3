//! On-disk encode/decode: the 18-byte header plus the raw bucket blob.
//!
//! Grounded on `hashindex_read`/`hashindex_write` in the original core:
//! same magic, same field order, same little-endian widths. The teacher
//! crate's closest analogue is `storage/mod.rs`'s length-prefixed framing,
//! generalized here to a fixed header instead of a varint-length frame.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::bucket::{self, Layout};
use crate::error::HashIndexError;
use crate::table::RawIndex;

const MAGIC: &[u8; 8] = b"BORG_IDX";
const HEADER_LEN: u64 = 18;

fn io_err(path: &Path, source: std::io::Error) -> HashIndexError {
    HashIndexError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Reads a complete index from `path`. The header is self-describing —
/// `key_size`/`value_size` are read back from it and used to derive the
/// `Layout`, the same way `hashindex_read` in the original core takes only
/// a path and fills in `index->key_size`/`value_size` from what it reads.
pub(crate) fn read(path: &Path) -> Result<RawIndex, HashIndexError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut header = [0u8; HEADER_LEN as usize];
    file.read_exact(&mut header).map_err(|e| io_err(path, e))?;

    if &header[0..8] != MAGIC {
        return Err(HashIndexError::InvalidMagic {
            path: path.to_path_buf(),
        });
    }
    let num_entries = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
    let num_buckets = u32::from_le_bytes([header[12], header[13], header[14], header[15]]);
    let key_size = header[16] as usize;
    let value_size = header[17] as usize;
    let layout = Layout::validate(key_size, value_size)?;

    let bucket_size = layout.bucket_size();
    let expected_len = HEADER_LEN + (num_buckets as u64) * (bucket_size as u64);
    let actual_len = file.metadata().map_err(|e| io_err(path, e))?.len();
    if actual_len != expected_len {
        return Err(HashIndexError::LengthMismatch {
            path: path.to_path_buf(),
            expected: expected_len,
            actual: actual_len,
        });
    }

    let mut buckets = vec![0u8; (num_buckets as usize) * bucket_size];
    file.read_exact(&mut buckets).map_err(|e| io_err(path, e))?;

    rewrite_deleted_as_empty(&mut buckets, layout, path);

    Ok(RawIndex::from_raw_parts(num_entries, num_buckets, layout, buckets))
}

/// Files written by a different implementation may contain `DELETED`
/// sentinels from a tombstone-based delete. This crate's own delete path
/// never produces one, so any found on load are one-time artifacts;
/// rewrite them to `EMPTY` and warn once rather than carry a code path
/// that otherwise never exercises.
fn rewrite_deleted_as_empty(buckets: &mut [u8], layout: Layout, path: &Path) {
    let bucket_size = layout.bucket_size();
    let mut rewritten = 0u32;
    let mut i = 0;
    while i + bucket_size <= buckets.len() {
        let slot = &mut buckets[i..i + bucket_size];
        if bucket::is_deleted(slot, layout) {
            bucket::mark_empty(slot, layout);
            rewritten += 1;
        }
        i += bucket_size;
    }
    if rewritten > 0 {
        log::warn!(
            "hashindex: {}: rewrote {} stale DELETED bucket(s) to EMPTY on load",
            path.display(),
            rewritten
        );
    }
}

/// Writes the header and bucket blob to `path`, truncating/creating it.
pub(crate) fn write(path: &Path, index: &RawIndex) -> Result<(), HashIndexError> {
    let mut file = File::create(path).map_err(|e| io_err(path, e))?;
    let mut header = [0u8; HEADER_LEN as usize];
    header[0..8].copy_from_slice(MAGIC);
    header[8..12].copy_from_slice(&(index.len() as u32).to_le_bytes());
    header[12..16].copy_from_slice(&(index.num_buckets() as u32).to_le_bytes());
    header[16] = index.layout.key_size as u8;
    header[17] = index.layout.value_size as u8;

    file.write_all(&header).map_err(|e| io_err(path, e))?;
    file.write_all(&index.buckets).map_err(|e| io_err(path, e))?;
    file.sync_all().map_err(|e| io_err(path, e))?;
    Ok(())
}
