//! Probe engine and mutation engine: the Robin-Hood linear-probing hash
//! table over a flat byte buffer.
//!
//! This plays the role of `index/hash/table.rs`'s `RawTable<T>` in the
//! teacher crate, generalized from a generic, SIMD-scanned, control-byte
//! table to the spec's plain byte-bucket table. Bucket addressing is
//! centralized in `crate::bucket` rather than scattered pointer
//! arithmetic, per the design note in spec.md §9.

use crate::bucket::{self, Layout};
use crate::error::HashIndexError;
use crate::sizes;

/// Outcome of a probe sequence.
pub(crate) enum Lookup {
    Hit(usize),
    Miss { skip_hint: usize },
}

/// The in-memory table: one flat byte buffer plus the bookkeeping spec.md
/// §3 calls for (`num_entries`, `lower_limit`, `upper_limit`). `tmp_entry`
/// from spec.md §3 is a transient local (a `Vec<u8>` scratch buffer) rather
/// than a persistent field, since Rust's borrow checker doesn't need it to
/// outlive the `set` call that creates it.
pub(crate) struct RawIndex {
    pub(crate) layout: Layout,
    pub(crate) num_buckets: u32,
    pub(crate) num_entries: u32,
    pub(crate) lower_limit: u32,
    pub(crate) upper_limit: u32,
    pub(crate) buckets: Vec<u8>,
}

fn hash_of(key: &[u8]) -> u32 {
    u32::from_le_bytes([key[0], key[1], key[2], key[3]])
}

impl RawIndex {
    /// Allocates a fresh, all-empty table with capacity `>= capacity`,
    /// snapped to the size ladder.
    pub(crate) fn with_capacity(capacity: u32, layout: Layout) -> Result<Self, HashIndexError> {
        let num_buckets = sizes::fit(capacity);
        let bucket_size = layout.bucket_size();
        let total = (num_buckets as usize)
            .checked_mul(bucket_size)
            .ok_or(HashIndexError::CapacityOverflow)?;
        let mut buckets = vec![0u8; total];
        for i in 0..num_buckets as usize {
            let start = i * bucket_size;
            bucket::mark_empty(&mut buckets[start..start + bucket_size], layout);
        }
        Ok(Self {
            layout,
            num_buckets,
            num_entries: 0,
            lower_limit: sizes::lower_limit(num_buckets),
            upper_limit: sizes::upper_limit(num_buckets),
            buckets,
        })
    }

    /// Reconstructs a table from a header + bucket blob already validated
    /// by `crate::persist`.
    pub(crate) fn from_raw_parts(num_entries: u32, num_buckets: u32, layout: Layout, buckets: Vec<u8>) -> Self {
        Self {
            layout,
            num_buckets,
            num_entries,
            lower_limit: sizes::lower_limit(num_buckets),
            upper_limit: sizes::upper_limit(num_buckets),
            buckets,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.num_entries as usize
    }

    pub(crate) fn num_buckets(&self) -> usize {
        self.num_buckets as usize
    }

    pub(crate) fn on_disk_size(&self) -> u64 {
        18 + (self.num_buckets as u64) * (self.layout.bucket_size() as u64)
    }

    fn bucket_range(&self, idx: usize) -> std::ops::Range<usize> {
        let bs = self.layout.bucket_size();
        idx * bs..(idx + 1) * bs
    }

    pub(crate) fn bucket(&self, idx: usize) -> &[u8] {
        let r = self.bucket_range(idx);
        &self.buckets[r]
    }

    fn bucket_mut(&mut self, idx: usize) -> &mut [u8] {
        let r = self.bucket_range(idx);
        &mut self.buckets[r]
    }

    fn home(&self, key: &[u8]) -> usize {
        (hash_of(key) % self.num_buckets) as usize
    }

    fn distance(&self, i: usize, h: usize) -> usize {
        if i < h {
            self.num_buckets as usize - h + i
        } else {
            i - h
        }
    }

    fn next_index(&self, idx: usize) -> usize {
        let n = self.num_buckets as usize;
        if idx + 1 >= n {
            0
        } else {
            idx + 1
        }
    }

    /// Forward linear probe from `home(key)`, matching spec.md §4.2
    /// exactly: hit on key match, miss on the first `EMPTY` bucket or full
    /// wrap-around, early miss every 64 probes once the current bucket's
    /// own displacement is smaller than the distance already travelled.
    pub(crate) fn lookup(&self, key: &[u8]) -> Lookup {
        let start = self.home(key);
        let mut idx = start;
        let mut offset = 0usize;
        let mut period = 0usize;
        loop {
            let b = self.bucket(idx);
            if bucket::is_empty(b, self.layout) {
                return Lookup::Miss {
                    skip_hint: offset.saturating_sub(64),
                };
            }
            if bucket::matches_key(b, self.layout, key) {
                return Lookup::Hit(idx);
            }
            period += 1;
            if period == 64 {
                period = 0;
                let stored_home = self.home(bucket::key(b, self.layout));
                if offset > self.distance(idx, stored_home) {
                    return Lookup::Miss {
                        skip_hint: offset.saturating_sub(64),
                    };
                }
            }
            idx = self.next_index(idx);
            offset += 1;
            if idx == start {
                return Lookup::Miss {
                    skip_hint: offset.saturating_sub(64),
                };
            }
        }
    }

    pub(crate) fn get(&self, key: &[u8]) -> Option<&[u8]> {
        match self.lookup(key) {
            Lookup::Hit(idx) => Some(bucket::value(self.bucket(idx), self.layout)),
            Lookup::Miss { .. } => None,
        }
    }

    /// Insert or update. Handles the grow-on-overfull check, Robin-Hood
    /// slot search, and both the normal and end-of-table shift branches of
    /// spec.md §4.4.
    pub(crate) fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), HashIndexError> {
        match self.lookup(key) {
            Lookup::Hit(idx) => {
                let layout = self.layout;
                bucket::write_value(self.bucket_mut(idx), layout, value);
                Ok(())
            }
            Lookup::Miss { mut skip_hint } => {
                if self.num_entries > self.upper_limit {
                    self.resize_to(sizes::grow(self.num_buckets))?;
                    skip_hint = 0;
                }
                self.insert_into_slot(key, value, skip_hint);
                Ok(())
            }
        }
    }

    fn insert_into_slot(&mut self, key: &[u8], value: &[u8], skip_hint: usize) {
        let home = self.home(key);
        let n = self.num_buckets as usize;
        let mut idx = (home + skip_hint) % n;
        let mut offset = skip_hint;

        loop {
            let b = self.bucket(idx);
            if !bucket::is_occupied(b, self.layout) {
                break;
            }
            let stored_home = self.home(bucket::key(b, self.layout));
            if offset > self.distance(idx, stored_home) {
                break;
            }
            idx = self.next_index(idx);
            offset += 1;
        }

        let layout = self.layout;
        if bucket::is_empty(self.bucket(idx), layout) {
            bucket::write_entry(self.bucket_mut(idx), layout, key, value);
        } else {
            self.shift_insert(idx, key, value);
        }
        self.num_entries += 1;
    }

    /// First `EMPTY` bucket at or after `from`, scanning only up to the
    /// table end (no wrap). `None` means the run reaches the table end
    /// still fully occupied — the end-of-table case.
    fn first_empty_from(&self, from: usize) -> Option<usize> {
        let n = self.num_buckets as usize;
        let mut i = from;
        while i < n {
            if bucket::is_empty(self.bucket(i), self.layout) {
                return Some(i);
            }
            i += 1;
        }
        None
    }

    fn shift_insert(&mut self, idx: usize, key: &[u8], value: &[u8]) {
        let layout = self.layout;
        let bs = layout.bucket_size();
        let n = self.num_buckets as usize;

        match self.first_empty_from(idx) {
            Some(empty_at) => {
                let start = idx * bs;
                let end = empty_at * bs;
                self.buckets.copy_within(start..end, start + bs);
                bucket::write_entry(&mut self.buckets[start..start + bs], layout, key, value);
            }
            None => {
                // End-of-table wrap: rescue the last bucket, shift the
                // tail right to make room at `idx`, write the new entry,
                // then rotate the rescued bucket into slot 0.
                let last = n - 1;
                let mut tmp = vec![0u8; bs];
                tmp.copy_from_slice(&self.buckets[last * bs..last * bs + bs]);

                if idx < last {
                    let start = idx * bs;
                    let end = last * bs;
                    self.buckets.copy_within(start..end, start + bs);
                }
                bucket::write_entry(&mut self.buckets[idx * bs..idx * bs + bs], layout, key, value);

                if let Some(empty_at0) = self.first_empty_from(0) {
                    if empty_at0 > 0 {
                        let end0 = empty_at0 * bs;
                        self.buckets.copy_within(0..end0, bs);
                    }
                }
                self.buckets[0..bs].copy_from_slice(&tmp);
            }
        }
    }

    /// Idempotent delete. Returns `true` unless the backing allocation
    /// failed during a post-delete shrink (the entry is still removed in
    /// that case; only the shrink is skipped).
    pub(crate) fn delete(&mut self, key: &[u8]) -> bool {
        let idx = match self.lookup(key) {
            Lookup::Hit(idx) => idx,
            Lookup::Miss { .. } => return true,
        };
        self.remove_at(idx);
        self.num_entries -= 1;
        if self.num_entries < self.lower_limit {
            let target = sizes::shrink(self.num_buckets);
            if target != self.num_buckets {
                if let Err(err) = self.resize_to(target) {
                    log::warn!("hashindex: shrink resize skipped: {}", err);
                }
            }
        }
        true
    }

    /// Scans forward from `from` for the first bucket that terminates a
    /// backward-shift run: `EMPTY`, or a bucket already sitting at its
    /// home (displacement 0). Only scans up to the table end.
    fn first_shift_stop_from(&self, from: usize) -> Option<usize> {
        let n = self.num_buckets as usize;
        let mut i = from;
        while i < n {
            let b = self.bucket(i);
            if bucket::is_empty(b, self.layout) {
                return Some(i);
            }
            let stored_home = self.home(bucket::key(b, self.layout));
            if self.distance(i, stored_home) == 0 {
                return Some(i);
            }
            i += 1;
        }
        None
    }

    /// Attempts the normal (non-wrapping) backward shift vacating `idx`:
    /// pulls displaced entries starting at `idx + 1` back by one slot.
    /// Returns `false` if the run reaches the table end first, meaning the
    /// caller must fall back to the wrap-around case.
    fn backward_shift(&mut self, idx: usize) -> bool {
        let n = self.num_buckets as usize;
        let scan_start = idx + 1;
        if scan_start >= n {
            return false;
        }
        match self.first_shift_stop_from(scan_start) {
            Some(stop) => {
                let layout = self.layout;
                let bs = layout.bucket_size();
                if stop > scan_start {
                    let s = scan_start * bs;
                    let e = stop * bs;
                    self.buckets.copy_within(s..e, idx * bs);
                }
                let empty_idx = stop - 1;
                bucket::mark_empty(self.bucket_mut(empty_idx), layout);
                true
            }
            None => false,
        }
    }

    fn remove_at(&mut self, idx: usize) {
        if self.backward_shift(idx) {
            return;
        }
        self.remove_wrap(idx);
    }

    fn remove_wrap(&mut self, idx: usize) {
        let layout = self.layout;
        let bs = layout.bucket_size();
        let n = self.num_buckets as usize;

        let s = (idx + 1) * bs;
        let e = n * bs;
        self.buckets.copy_within(s..e, idx * bs);

        if bucket::is_empty(self.bucket(0), layout) {
            bucket::mark_empty(self.bucket_mut(n - 1), layout);
        } else {
            let mut first = vec![0u8; bs];
            first.copy_from_slice(&self.buckets[0..bs]);
            self.buckets[(n - 1) * bs..n * bs].copy_from_slice(&first);
            if !self.backward_shift(0) {
                log::warn!(
                    "hashindex: delete wrap-around found no terminating bucket (table over capacity)"
                );
            }
        }
    }

    /// Allocates a table at `sizes::fit(target)` and reinserts every
    /// occupied bucket, then replaces `self`'s buffer and limits. Mirrors
    /// `hashindex_resize` in the original C core.
    fn resize_to(&mut self, target: u32) -> Result<(), HashIndexError> {
        let mut fresh = RawIndex::with_capacity(target, self.layout)?;
        let n = self.num_buckets as usize;
        for idx in 0..n {
            let b = self.bucket(idx);
            if bucket::is_occupied(b, self.layout) {
                let k = bucket::key(b, self.layout).to_vec();
                let v = bucket::value(b, self.layout).to_vec();
                fresh.set(&k, &v)?;
            }
        }
        log::debug!(
            "hashindex: resized {} -> {} buckets ({} entries)",
            self.num_buckets,
            fresh.num_buckets,
            self.num_entries
        );
        self.buckets = fresh.buckets;
        self.num_buckets = fresh.num_buckets;
        self.lower_limit = fresh.lower_limit;
        self.upper_limit = fresh.upper_limit;
        Ok(())
    }

    /// First occupied bucket at or after `from`, for the iterator in
    /// `crate::iter`.
    pub(crate) fn next_occupied(&self, from: usize) -> Option<usize> {
        let n = self.num_buckets as usize;
        let mut i = from;
        while i < n {
            if bucket::is_occupied(self.bucket(i), self.layout) {
                return Some(i);
            }
            i += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        Layout::validate(32, 12).unwrap()
    }

    fn key(seed: u8) -> [u8; 32] {
        let mut k = [0u8; 32];
        k[0] = seed;
        k
    }

    #[test]
    fn insert_then_get_then_delete() {
        let l = layout();
        let mut idx = RawIndex::with_capacity(0, l).unwrap();
        assert_eq!(idx.num_buckets(), 1031);
        let k = key(1);
        let v = [1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0];
        idx.set(&k, &v).unwrap();
        assert_eq!(idx.get(&k), Some(&v[..]));
        assert!(idx.delete(&k));
        assert_eq!(idx.get(&k), None);
        assert!(idx.delete(&k)); // idempotent
    }

    #[test]
    fn update_does_not_change_len() {
        let l = layout();
        let mut idx = RawIndex::with_capacity(0, l).unwrap();
        let k = key(9);
        idx.set(&k, &[1; 12]).unwrap();
        let len_before = idx.len();
        idx.set(&k, &[2; 12]).unwrap();
        assert_eq!(idx.len(), len_before);
        assert_eq!(idx.get(&k), Some(&[2u8; 12][..]));
    }

    #[test]
    fn grows_past_upper_limit() {
        // upper_limit(1031) == 1020; the grow check compares num_entries
        // *before* the current insert, so growth actually fires while
        // inserting the 1022nd distinct key (once 1021 entries are already
        // present), not the 1021st.
        let l = layout();
        let mut idx = RawIndex::with_capacity(0, l).unwrap();
        for i in 0..1021u32 {
            let mut k = [0u8; 32];
            k[..4].copy_from_slice(&i.to_le_bytes());
            idx.set(&k, &[0; 12]).unwrap();
        }
        assert_eq!(idx.len(), 1021);
        assert_eq!(idx.num_buckets(), 1031);

        let mut k = [0u8; 32];
        k[..4].copy_from_slice(&1021u32.to_le_bytes());
        idx.set(&k, &[0; 12]).unwrap();
        assert_eq!(idx.len(), 1022);
        assert_eq!(idx.num_buckets(), 2053);
    }

    #[test]
    fn end_of_table_collisions_all_retrievable() {
        // Force every key's hash to land on the last bucket so every
        // insert after the first takes the end-of-table wrap branch.
        let l = Layout::validate(32, 12).unwrap();
        let mut idx = RawIndex::with_capacity(1031, l).unwrap();
        let target = idx.num_buckets - 1;
        let mut keys = Vec::new();
        for i in 0..50u32 {
            let mut k = [0u8; 32];
            k[..4].copy_from_slice(&target.to_le_bytes());
            k[4..8].copy_from_slice(&i.to_le_bytes());
            keys.push(k);
        }
        for (i, k) in keys.iter().enumerate() {
            idx.set(k, &(i as u32).to_le_bytes().repeat(3)[..12]).unwrap();
        }
        for (i, k) in keys.iter().enumerate() {
            let expected = (i as u32).to_le_bytes().repeat(3);
            assert_eq!(idx.get(k), Some(&expected[..]));
        }
        assert_eq!(idx.len(), 50);
    }

    #[test]
    fn shrinks_after_mass_delete() {
        let l = layout();
        let mut idx = RawIndex::with_capacity(0, l).unwrap();
        let mut keys = Vec::new();
        for i in 0..10_000u32 {
            let mut k = [0u8; 32];
            k[..4].copy_from_slice(&i.to_le_bytes());
            keys.push(k);
            idx.set(&k, &[0; 12]).unwrap();
        }
        let grown_buckets = idx.num_buckets();
        for k in keys.iter().take(9_000) {
            idx.delete(k);
        }
        assert!(idx.num_buckets() < grown_buckets);
        for k in keys.iter().skip(9_000) {
            assert!(idx.get(k).is_some());
        }
    }
}
