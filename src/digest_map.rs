//! DigestMap: concurrent open-addressing table keyed by 128-bit digests.
//!
//! Slots move `Empty -> Busy -> Occupied -> Deleted` and only go back to
//! `Empty` through `clear`/`rehash`, which take `&mut self`. Every other
//! operation takes `&self` and may run from any number of threads.

use crate::digest::{Digest, DigestBuildHasher, HostDigestMap};
use crate::murmur3::fmix32;
use core::cell::UnsafeCell;
use core::fmt;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// Smallest non-zero physical slot count.
pub const MIN_SLOTS: usize = 8;
/// Largest accepted capacity request.
pub const MAX_SLOTS: usize = 1 << 31;

const EMPTY: u8 = 0;
const BUSY: u8 = 1;
const OCCUPIED: u8 = 2;
const DELETED: u8 = 3;

struct Slot<V> {
    state: AtomicU8,
    // Written only by the thread that moved `state` from EMPTY to BUSY,
    // read only after observing OCCUPIED with Acquire.
    digest: UnsafeCell<Digest>,
    value: UnsafeCell<MaybeUninit<V>>,
}

impl<V: Copy> Slot<V> {
    fn empty() -> Self {
        Slot {
            state: AtomicU8::new(EMPTY),
            digest: UnsafeCell::new(Digest::default()),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Spins while another thread is filling the slot.
    #[inline]
    fn settled_state(&self) -> u8 {
        loop {
            let s = self.state.load(Ordering::Acquire);
            if s != BUSY {
                return s;
            }
            core::hint::spin_loop();
        }
    }

    /// Caller must have observed OCCUPIED (or DELETED) with Acquire.
    #[inline]
    unsafe fn digest(&self) -> Digest {
        *self.digest.get()
    }

    /// Caller must have observed OCCUPIED (or DELETED) with Acquire.
    #[inline]
    unsafe fn value(&self) -> V {
        (*self.value.get()).assume_init()
    }

    #[inline]
    fn entry(&self) -> Option<(Digest, V)> {
        if self.state.load(Ordering::Acquire) == OCCUPIED {
            // SAFETY: OCCUPIED was just observed with Acquire, which pairs
            // with the Release store that published digest and value.
            unsafe { Some((self.digest(), self.value())) }
        } else {
            None
        }
    }
}

/// Outcome of [`DigestMap::insert`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InsertResult {
    /// The digest was added at this slot index.
    Inserted(usize),
    /// The digest was already present at this slot index; its value is untouched.
    Existing(usize),
    /// No free slot was left on the probe sequence.
    Failed,
}

impl InsertResult {
    #[inline]
    pub fn success(&self) -> bool {
        matches!(self, InsertResult::Inserted(_))
    }

    #[inline]
    pub fn existing(&self) -> bool {
        matches!(self, InsertResult::Existing(_))
    }

    #[inline]
    pub fn failed(&self) -> bool {
        matches!(self, InsertResult::Failed)
    }

    #[inline]
    pub fn index(&self) -> Option<usize> {
        match *self {
            InsertResult::Inserted(i) | InsertResult::Existing(i) => Some(i),
            InsertResult::Failed => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapacityError {
    #[error("requested capacity {requested} exceeds the maximum of {max} slots")]
    TooLarge { requested: usize, max: usize },
}

/// Fixed-capacity concurrent map from [`Digest`] to a `Copy` value.
///
/// Inserts never overwrite: the first writer of a digest wins and later
/// inserts report [`InsertResult::Existing`]. A full table reports
/// [`InsertResult::Failed`]; grow it with [`DigestMap::rehash`] once all
/// outstanding operations are done.
pub struct DigestMap<V> {
    slots: Box<[Slot<V>]>,
    mask: usize,
    requested: usize,
    len: AtomicUsize,
    tombstones: AtomicUsize,
    failed_insert: AtomicBool,
}

// SAFETY: slot payloads are written once, by the thread that won the
// EMPTY->BUSY claim, and published with Release before any other thread
// reads them through an Acquire load of OCCUPIED.
unsafe impl<V: Send + Sync> Sync for DigestMap<V> {}

impl<V: Copy> Default for DigestMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Copy> DigestMap<V> {
    /// Empty map with capacity 0. Every insert fails until `rehash`.
    pub fn new() -> Self {
        Self {
            slots: Box::new([]),
            mask: 0,
            requested: 0,
            len: AtomicUsize::new(0),
            tombstones: AtomicUsize::new(0),
            failed_insert: AtomicBool::new(false),
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, CapacityError> {
        let mut m = Self::new();
        m.rehash(capacity)?;
        Ok(m)
    }

    fn slots_for(requested: usize) -> Result<usize, CapacityError> {
        if requested == 0 {
            return Ok(0);
        }
        if requested > MAX_SLOTS {
            return Err(CapacityError::TooLarge {
                requested,
                max: MAX_SLOTS,
            });
        }
        Ok(requested.next_power_of_two().max(MIN_SLOTS))
    }

    #[inline]
    fn bucket_of(&self, digest: &Digest) -> usize {
        (fmix32(digest.bucket_hint()) as usize) & self.mask
    }

    /// Discards all entries and resizes to hold at least `capacity` entries.
    pub fn rehash(&mut self, capacity: usize) -> Result<(), CapacityError> {
        let slots = Self::slots_for(capacity)?;
        if slots == self.slots.len() {
            self.clear_slots();
        } else {
            self.slots = (0..slots).map(|_| Slot::empty()).collect();
            self.mask = slots.saturating_sub(1);
        }
        self.requested = capacity;
        self.reset_counters();
        tracing::info!(requested = capacity, slots, "digest map rehashed");
        Ok(())
    }

    /// Marks every slot empty. Capacity is kept.
    pub fn clear(&mut self) {
        let dropped = self.len();
        self.clear_slots();
        self.reset_counters();
        tracing::debug!(capacity = self.capacity(), dropped, "digest map cleared");
    }

    /// Clears and releases storage; capacity drops to 0.
    pub fn reset(&mut self) {
        self.slots = Box::new([]);
        self.mask = 0;
        self.requested = 0;
        self.reset_counters();
        tracing::debug!("digest map reset");
    }

    fn clear_slots(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot.state.get_mut() = EMPTY;
        }
    }

    fn reset_counters(&mut self) {
        *self.len.get_mut() = 0;
        *self.tombstones.get_mut() = 0;
        *self.failed_insert.get_mut() = false;
    }

    /// Inserts `digest -> value` unless the digest is already present.
    ///
    /// Threads racing on the same digest agree on a single winner: one gets
    /// `Inserted`, the rest `Existing` with the same index.
    pub fn insert(&self, digest: Digest, value: V) -> InsertResult {
        let cap = self.slots.len();
        let start = self.bucket_of(&digest);
        for step in 0..cap {
            let idx = (start + step) & self.mask;
            let slot = &self.slots[idx];
            loop {
                match slot.settled_state() {
                    EMPTY => {
                        if slot
                            .state
                            .compare_exchange(EMPTY, BUSY, Ordering::Acquire, Ordering::Relaxed)
                            .is_err()
                        {
                            // Lost the claim; look at what the winner wrote.
                            continue;
                        }
                        // SAFETY: the EMPTY->BUSY claim makes this thread the
                        // only writer, and no reader touches the payload
                        // until OCCUPIED is published below.
                        unsafe {
                            *slot.digest.get() = digest;
                            (*slot.value.get()).write(value);
                        }
                        // Counted before publishing so a racing erase can
                        // never observe the slot ahead of the increment.
                        self.len.fetch_add(1, Ordering::Relaxed);
                        slot.state.store(OCCUPIED, Ordering::Release);
                        return InsertResult::Inserted(idx);
                    }
                    OCCUPIED => {
                        // SAFETY: OCCUPIED observed with Acquire.
                        if unsafe { slot.digest() } == digest {
                            return InsertResult::Existing(idx);
                        }
                        break;
                    }
                    // Tombstones are never reused; keep probing.
                    _ => break,
                }
            }
        }
        self.note_failed_insert();
        InsertResult::Failed
    }

    fn note_failed_insert(&self) {
        if !self.failed_insert.load(Ordering::Relaxed)
            && !self.failed_insert.swap(true, Ordering::Relaxed)
        {
            tracing::warn!(
                capacity = self.capacity(),
                len = self.len(),
                tombstones = self.tombstones(),
                "digest map full; insert failed"
            );
        }
    }

    /// Slot index of `digest`, if present.
    ///
    /// Does not wait on slots that are still being filled: an insert that
    /// has not returned yet may or may not be seen.
    pub fn find(&self, digest: &Digest) -> Option<usize> {
        let cap = self.slots.len();
        let start = self.bucket_of(digest);
        for step in 0..cap {
            let idx = (start + step) & self.mask;
            let slot = &self.slots[idx];
            match slot.state.load(Ordering::Acquire) {
                EMPTY => return None,
                OCCUPIED => {
                    // SAFETY: OCCUPIED observed with Acquire.
                    if unsafe { slot.digest() } == *digest {
                        return Some(idx);
                    }
                }
                _ => {}
            }
        }
        None
    }

    pub fn get(&self, digest: &Digest) -> Option<V> {
        self.find(digest).and_then(|i| self.value_at(i))
    }

    #[inline]
    pub fn exists(&self, digest: &Digest) -> bool {
        self.find(digest).is_some()
    }

    /// Turns the digest's slot into a tombstone. Tombstones keep counting
    /// toward the load factor until the next `clear` or `rehash`.
    pub fn erase(&self, digest: &Digest) -> bool {
        let Some(idx) = self.find(digest) else {
            return false;
        };
        let erased = self.slots[idx]
            .state
            .compare_exchange(OCCUPIED, DELETED, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok();
        if erased {
            self.len.fetch_sub(1, Ordering::Relaxed);
            self.tombstones.fetch_add(1, Ordering::Relaxed);
        }
        erased
    }

    pub fn valid_at(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .map_or(false, |s| s.state.load(Ordering::Acquire) == OCCUPIED)
    }

    pub fn key_at(&self, index: usize) -> Option<Digest> {
        self.slots.get(index)?.entry().map(|(d, _)| d)
    }

    pub fn value_at(&self, index: usize) -> Option<V> {
        self.slots.get(index)?.entry().map(|(_, v)| v)
    }

    /// Number of occupied slots. Exact once mutation has quiesced.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Physical slot count.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The capacity passed to the last `rehash`.
    #[inline]
    pub fn requested_capacity(&self) -> usize {
        self.requested
    }

    #[inline]
    pub fn tombstones(&self) -> usize {
        self.tombstones.load(Ordering::Relaxed)
    }

    /// `(occupied + tombstones) / capacity`; 0.0 for an unsized map.
    pub fn load_factor(&self) -> f64 {
        if self.capacity() == 0 {
            0.0
        } else {
            (self.len() + self.tombstones()) as f64 / self.capacity() as f64
        }
    }

    /// Whether any insert failed for lack of space since the last
    /// `clear`/`rehash`.
    #[inline]
    pub fn failed_insert(&self) -> bool {
        self.failed_insert.load(Ordering::Relaxed)
    }

    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            slots: self.slots.iter(),
        }
    }

    /// Copies the occupied entries into a single-threaded `hashbrown` map.
    pub fn to_host_map(&self) -> HostDigestMap<V> {
        let mut host = HostDigestMap::with_capacity_and_hasher(self.len(), DigestBuildHasher);
        host.extend(self.iter());
        host
    }
}

impl<V: Copy> fmt::Debug for DigestMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestMap")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("tombstones", &self.tombstones())
            .field("failed_insert", &self.failed_insert())
            .finish()
    }
}

/// Iterator over occupied `(digest, value)` pairs in slot order.
pub struct Iter<'a, V> {
    slots: core::slice::Iter<'a, Slot<V>>,
}

impl<'a, V: Copy> Iterator for Iter<'a, V> {
    type Item = (Digest, V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.slots.by_ref().find_map(Slot::entry)
    }
}

impl<'a, V: Copy> IntoIterator for &'a DigestMap<V> {
    type Item = (Digest, V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
