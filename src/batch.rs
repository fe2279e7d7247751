//! Data-parallel drivers over a shared [`DigestMap`].
//!
//! Each record or entry becomes one rayon task issuing a single map
//! operation, so a batch exercises the map the way a large fan-out of
//! independent workers would.

use crate::digest::Digest;
use crate::digest_map::{DigestMap, InsertResult};
use crate::murmur3;
use rayon::prelude::*;

/// Tally of insert outcomes for one batch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub existing: usize,
    pub failed: usize,
}

impl BatchOutcome {
    #[inline]
    fn record(mut self, r: InsertResult) -> Self {
        match r {
            InsertResult::Inserted(_) => self.inserted += 1,
            InsertResult::Existing(_) => self.existing += 1,
            InsertResult::Failed => self.failed += 1,
        }
        self
    }

    pub fn merge(self, other: Self) -> Self {
        BatchOutcome {
            inserted: self.inserted + other.inserted,
            existing: self.existing + other.existing,
            failed: self.failed + other.failed,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.existing + self.failed
    }
}

/// Digest of every `record_len`-byte record in `data`, in order.
///
/// A short trailing record is hashed as-is. `record_len == 0` yields no
/// digests.
pub fn digest_records(data: &[u8], record_len: usize) -> Vec<Digest> {
    if record_len == 0 {
        return Vec::new();
    }
    data.par_chunks(record_len).map(murmur3::hash).collect()
}

pub fn insert_batch<V>(map: &DigestMap<V>, entries: &[(Digest, V)]) -> BatchOutcome
where
    V: Copy + Send + Sync,
{
    entries
        .par_iter()
        .map(|&(d, v)| map.insert(d, v))
        .fold(BatchOutcome::default, BatchOutcome::record)
        .reduce(BatchOutcome::default, BatchOutcome::merge)
}

/// Hashes each record and inserts it with `value_of(record_index)`.
pub fn insert_records<V, F>(
    map: &DigestMap<V>,
    data: &[u8],
    record_len: usize,
    value_of: F,
) -> BatchOutcome
where
    V: Copy + Send + Sync,
    F: Fn(usize) -> V + Sync + Send,
{
    if record_len == 0 {
        return BatchOutcome::default();
    }
    data.par_chunks(record_len)
        .enumerate()
        .map(|(i, rec)| map.insert(murmur3::hash(rec), value_of(i)))
        .fold(BatchOutcome::default, BatchOutcome::record)
        .reduce(BatchOutcome::default, BatchOutcome::merge)
}

pub fn find_batch<V>(map: &DigestMap<V>, digests: &[Digest]) -> Vec<Option<V>>
where
    V: Copy + Send + Sync,
{
    digests.par_iter().map(|d| map.get(d)).collect()
}

pub fn count_present<V>(map: &DigestMap<V>, digests: &[Digest]) -> usize
where
    V: Copy + Send + Sync,
{
    digests.par_iter().filter(|d| map.exists(d)).count()
}
