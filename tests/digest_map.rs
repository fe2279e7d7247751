// DigestMap integration suite.
//
// Each test documents what behavior is being verified and which
// invariants are assumed or asserted. The core invariants exercised:
// - Uniqueness: a digest occupies at most one slot, even under races.
// - First writer wins: values are never overwritten by later inserts.
// - Round-trip: a successful insert is visible to every later find.
// - Ceiling: a full table fails inserts without disturbing entries.
// - Structural ops (clear/rehash) only run on a quiesced table; here the
//   borrow checker enforces that by requiring `&mut`.
use digest_table::batch::{digest_records, find_batch, insert_batch, insert_records};
use digest_table::{hash, Digest, DigestMap, InsertResult, NodeId};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Barrier;

fn record(i: u64) -> Digest {
    hash(&i.to_le_bytes())
}

// Test: the reference workload.
// Verifies: 129 distinct 8-byte records all land; record 5 is findable.
#[test]
fn rehash_then_insert_129_records() {
    let mut m: DigestMap<NodeId> = DigestMap::new();
    m.rehash(10_000).expect("rehash");
    for i in 0..=128u64 {
        assert!(m.insert(record(i), NodeId::new(i as u32, 0)).success());
    }
    assert_eq!(m.size(), 129);
    assert!(m.exists(&record(5)));
    assert_eq!(m.get(&record(5)), Some(NodeId::new(5, 0)));
    assert!(m.capacity() >= 10_000);
}

// Test: massive fan-out of duplicate inserts through rayon.
// Assumes: every record appears 8 times in the batch.
// Verifies: exactly one entry per unique digest; each surviving value
// belongs to one of the competing inserts for that record.
#[test]
fn parallel_duplicate_records_deduplicate() {
    const UNIQUE: u64 = 20_000;
    let m = DigestMap::with_capacity(UNIQUE as usize).expect("capacity");
    let entries: Vec<(Digest, NodeId)> = (0..UNIQUE * 8)
        .map(|i| (record(i % UNIQUE), NodeId::new((i % UNIQUE) as u32, (i / UNIQUE) as u32)))
        .collect();
    let out = insert_batch(&m, &entries);
    assert_eq!(out.inserted, UNIQUE as usize);
    assert_eq!(out.existing, (UNIQUE * 7) as usize);
    assert_eq!(out.failed, 0);
    assert_eq!(m.len(), UNIQUE as usize);

    (0..UNIQUE).into_par_iter().for_each(|i| {
        let v = m.get(&record(i)).expect("present");
        assert_eq!(v.node, i as u32);
        assert!(v.tree < 8);
        // Repeated finds agree.
        assert_eq!(m.get(&record(i)), Some(v));
    });
}

// Test: threads released together race on the same small key set.
// Verifies: per digest, exactly one thread saw Inserted; all others saw
// Existing at the same index.
#[test]
fn barrier_released_threads_agree_on_winners() {
    const THREADS: usize = 12;
    const KEYS: u64 = 256;
    let m = DigestMap::with_capacity(1024).expect("capacity");
    let barrier = Barrier::new(THREADS);
    let per_thread: Vec<Vec<InsertResult>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let (m, barrier) = (&m, &barrier);
                s.spawn(move || {
                    barrier.wait();
                    (0..KEYS).map(|k| m.insert(record(k), t as u32)).collect()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("join")).collect()
    });

    for k in 0..KEYS as usize {
        let results: Vec<InsertResult> = per_thread.iter().map(|r| r[k]).collect();
        let winners: Vec<usize> = (0..THREADS).filter(|&t| results[t].success()).collect();
        assert_eq!(winners.len(), 1, "key {k}: {results:?}");
        let idx = results[winners[0]].index();
        assert!(results.iter().all(|r| r.index() == idx));
        assert_eq!(m.get(&record(k as u64)), Some(winners[0] as u32));
    }
    assert_eq!(m.len(), KEYS as usize);
}

// Test: readers running alongside writers.
// Assumes: writers insert disjoint ranges; readers poll all keys.
// Verifies: a reader never sees a wrong value, and once a writer's insert
// returned, a find started afterwards observes it.
#[test]
fn finds_concurrent_with_inserts_never_see_torn_values() {
    const KEYS: u64 = 4096;
    let m = DigestMap::with_capacity(KEYS as usize).expect("capacity");
    std::thread::scope(|s| {
        for w in 0..4u64 {
            let m = &m;
            s.spawn(move || {
                for k in (w..KEYS).step_by(4) {
                    assert!(m.insert(record(k), k).success());
                    assert_eq!(m.get(&record(k)), Some(k));
                }
            });
        }
        for _ in 0..4 {
            let m = &m;
            s.spawn(move || {
                for _ in 0..4 {
                    for k in 0..KEYS {
                        if let Some(v) = m.get(&record(k)) {
                            assert_eq!(v, k);
                        }
                    }
                }
            });
        }
    });
    assert_eq!(m.len(), KEYS as usize);
}

// Test: capacity exhaustion under parallel load.
// Verifies: size never exceeds capacity; failures are reported, not
// raised; every acknowledged insert is findable afterwards.
#[test]
fn parallel_overfill_reports_failures() {
    let m = DigestMap::with_capacity(1000).expect("capacity");
    let cap = m.capacity();
    let digests = digest_records(
        &(0..(cap as u64 * 2)).flat_map(|i| i.to_le_bytes()).collect::<Vec<u8>>(),
        8,
    );
    let results: Vec<InsertResult> = digests
        .par_iter()
        .enumerate()
        .map(|(i, &d)| m.insert(d, i as u32))
        .collect();
    let ok = results.iter().filter(|r| r.success()).count();
    let failed = results.iter().filter(|r| r.failed()).count();
    assert_eq!(ok, cap);
    assert_eq!(failed, cap);
    assert_eq!(m.len(), m.capacity());
    assert!(m.failed_insert());
    for (i, r) in results.iter().enumerate() {
        if r.success() {
            assert_eq!(m.get(&digests[i]), Some(i as u32));
        }
    }
}

// Test: clear after a parallel batch.
// Verifies: size 0, nothing findable, capacity unchanged, table reusable.
#[test]
fn clear_after_parallel_batch() {
    let mut m = DigestMap::with_capacity(2048).expect("capacity");
    let data: Vec<u8> = (0..1500u64).flat_map(|i| i.to_le_bytes()).collect();
    let out = insert_records(&m, &data, 8, |i| i as u64);
    assert_eq!(out.inserted, 1500);
    let cap = m.capacity();

    m.clear();
    assert_eq!(m.size(), 0);
    assert_eq!(m.capacity(), cap);
    let digests = digest_records(&data, 8);
    assert!(find_batch(&m, &digests).iter().all(Option::is_none));

    let again = insert_records(&m, &data, 8, |i| i as u64 + 1);
    assert_eq!(again.inserted, 1500);
    assert_eq!(m.get(&digests[0]), Some(1));
}

// Test: iteration yields each live entry exactly once.
#[test]
fn iteration_yields_unique_entries() {
    let m = DigestMap::with_capacity(512).expect("capacity");
    (0..300u64).into_par_iter().for_each(|i| {
        m.insert(record(i), i);
    });
    let seen: HashSet<Digest> = m.iter().map(|(d, _)| d).collect();
    assert_eq!(seen.len(), 300);
    for (d, v) in &m {
        assert_eq!(d, record(v));
    }
}
