//! A persistent, on-disk hash index mapping fixed-width opaque byte keys to
//! fixed-width opaque byte values.
//!
//! The index is an open-addressed, Robin-Hood-style linear-probing hash
//! table with in-place backward-shift deletion, persisted as a single file
//! with a bit-exact little-endian layout. It is intended as a
//! chunk-metadata map for a content-addressed store: keys are typically
//! 32-byte content hashes, values a few bytes of reference-count and size
//! bookkeeping, but the index itself treats both as opaque fixed-width
//! byte strings.
//!
//! The index is not thread-safe; callers serialize mutation externally.

mod bucket;
mod error;
mod iter;
mod persist;
mod sizes;
mod table;

pub mod diagnostics;

use std::fmt;
use std::path::Path;

use bucket::Layout;
pub use error::HashIndexError;
pub use iter::Iter;
use table::RawIndex;

/// A hash index over fixed-width keys and values, backed by a single flat
/// byte buffer.
///
/// Mirrors `index/hash/mod.rs`'s `HashTable<K, V>` façade over the
/// teacher's `RawTable<T>`: `HashIndex` owns one `RawIndex` and exposes the
/// safe, validated surface applications call.
pub struct HashIndex {
    pub(crate) table: RawIndex,
}

impl HashIndex {
    /// Creates an empty index with at least `capacity` buckets (snapped
    /// upward to the size ladder) and the given fixed key/value widths.
    pub fn init(capacity: u32, key_size: usize, value_size: usize) -> Result<Self, HashIndexError> {
        let layout = Layout::validate(key_size, value_size)?;
        let table = RawIndex::with_capacity(capacity, layout)?;
        log::debug!(
            "hashindex: init capacity={} key_size={} value_size={} -> {} buckets",
            capacity,
            key_size,
            value_size,
            table.num_buckets()
        );
        Ok(Self { table })
    }

    /// Loads an index from `path`. The 18-byte header is self-describing,
    /// so `key_size`/`value_size` are derived from it rather than supplied
    /// by the caller — there is nothing to mismatch against. Callers that
    /// need to enforce an expected width can compare `key_size()`/
    /// `value_size()` on the result.
    pub fn read(path: &Path) -> Result<Self, HashIndexError> {
        let table = persist::read(path).map_err(|err| {
            diagnostics::report(&err);
            err
        })?;
        log::debug!(
            "hashindex: {}: loaded {} entries / {} buckets",
            path.display(),
            table.len(),
            table.num_buckets()
        );
        Ok(Self { table })
    }

    /// Writes the header and complete bucket blob to `path`, creating or
    /// truncating it.
    pub fn write(&self, path: &Path) -> Result<(), HashIndexError> {
        persist::write(path, &self.table).map_err(|err| {
            diagnostics::report(&err);
            err
        })
    }

    fn check_key(&self, key: &[u8]) -> Result<(), HashIndexError> {
        if key.len() != self.table.layout.key_size {
            return Err(HashIndexError::KeyWidthMismatch {
                expected: self.table.layout.key_size,
                actual: key.len(),
            });
        }
        Ok(())
    }

    fn check_value(&self, value: &[u8]) -> Result<(), HashIndexError> {
        if value.len() != self.table.layout.value_size {
            return Err(HashIndexError::ValueWidthMismatch {
                expected: self.table.layout.value_size,
                actual: value.len(),
            });
        }
        Ok(())
    }

    /// Looks up `key`. Absence is not an error.
    pub fn get(&self, key: &[u8]) -> Result<Option<&[u8]>, HashIndexError> {
        self.check_key(key)?;
        Ok(self.table.get(key))
    }

    /// Inserts or updates `key` with `value`. The only failure mode is a
    /// capacity overflow while growing the backing buffer.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), HashIndexError> {
        self.check_key(key)?;
        self.check_value(value)?;
        self.table.set(key, value)
    }

    /// Removes `key`. Returns `true` unconditionally (absence is a no-op,
    /// matching spec.md's idempotent-delete contract); the only way this
    /// can logically fail, a shrink-resize allocation failure, is logged
    /// and skipped rather than surfaced, since shrinking is an
    /// optimization and the entry is already removed by that point.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool, HashIndexError> {
        self.check_key(key)?;
        Ok(self.table.delete(key))
    }

    /// A forward, non-restartable iterator over occupied buckets. Borrows
    /// `self` immutably, so the borrow checker rejects any attempt to
    /// mutate the index while iterating.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    /// Number of occupied buckets.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Total on-disk size in bytes this index would occupy if written now.
    pub fn size(&self) -> u64 {
        self.table.on_disk_size()
    }

    pub fn key_size(&self) -> usize {
        self.table.layout.key_size
    }

    pub fn value_size(&self) -> usize {
        self.table.layout.value_size
    }

    pub fn num_buckets(&self) -> usize {
        self.table.num_buckets()
    }
}

impl fmt::Debug for HashIndex {
    /// Never prints bucket contents — keys are typically content hashes of
    /// potentially sensitive data.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashIndex")
            .field("key_size", &self.key_size())
            .field("value_size", &self.value_size())
            .field("num_buckets", &self.num_buckets())
            .field("len", &self.len())
            .finish()
    }
}
