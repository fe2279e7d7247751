#![cfg(test)]

// Property tests for DigestMap kept inside the crate so they can reach
// the slot-level accessors without widening the public surface.

use crate::digest::Digest;
use crate::digest_map::{DigestMap, InsertResult};
use crate::murmur3;
use hashbrown::HashMap;
use proptest::prelude::*;

// Pool-indexed operations: indices shrink toward earlier keys and op lists
// shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, u32),
    Find(usize),
    Erase(usize),
    Clear,
    Rehash(usize),
}

// `collide` puts every key in the same bucket to stress probing.
fn key(i: usize, collide: bool) -> Digest {
    if collide {
        Digest::from_halves(0xFEED_0000, i as u64)
    } else {
        murmur3::hash(&(i as u64).to_le_bytes())
    }
}

fn arb_scenario() -> impl Strategy<Value = (usize, bool, Vec<Op>)> {
    (1usize..=24, any::<bool>()).prop_flat_map(|(pool, collide)| {
        let idx = 0..pool;
        let op = prop_oneof![
            6 => (idx.clone(), any::<u32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            4 => idx.clone().prop_map(Op::Find),
            2 => idx.prop_map(Op::Erase),
            1 => Just(Op::Clear),
            1 => prop_oneof![Just(0usize), Just(8), Just(16), Just(64)].prop_map(Op::Rehash),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool, collide, ops))
    })
}

// Property: state-machine equivalence against hashbrown::HashMap.
// - insert succeeds iff the key is absent and a never-used slot remains
//   (tombstones are not reused), reports Existing iff present, and never
//   overwrites the stored value.
// - find/get/exists parity with the model after each op.
// - len == model.len(), tombstones tracked, len <= capacity.
// - clear/rehash empty the map and reclaim tombstones.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, collide, ops) in arb_scenario()) {
        let mut sut: DigestMap<u32> = DigestMap::with_capacity(16).unwrap();
        let mut model: HashMap<Digest, u32> = HashMap::new();
        let mut tombstones = 0usize;

        for op in ops {
            match op {
                Op::Insert(i, v) => {
                    let k = key(i, collide);
                    let used = model.len() + tombstones;
                    match sut.insert(k, v) {
                        InsertResult::Inserted(idx) => {
                            prop_assert!(!model.contains_key(&k));
                            prop_assert!(used < sut.capacity());
                            prop_assert_eq!(sut.key_at(idx), Some(k));
                            model.insert(k, v);
                        }
                        InsertResult::Existing(idx) => {
                            let stored = model.get(&k).copied();
                            prop_assert!(stored.is_some(), "existing only when present");
                            prop_assert_eq!(sut.value_at(idx), stored);
                        }
                        InsertResult::Failed => {
                            prop_assert!(!model.contains_key(&k));
                            prop_assert_eq!(used, sut.capacity());
                            prop_assert!(sut.failed_insert());
                        }
                    }
                }
                Op::Find(i) => {
                    let k = key(i, collide);
                    let expect = model.get(&k).copied();
                    prop_assert_eq!(sut.get(&k), expect);
                    prop_assert_eq!(sut.exists(&k), expect.is_some());
                    if let Some(idx) = sut.find(&k) {
                        prop_assert!(sut.valid_at(idx));
                    }
                }
                Op::Erase(i) => {
                    let k = key(i, collide);
                    let was = model.remove(&k).is_some();
                    prop_assert_eq!(sut.erase(&k), was);
                    if was {
                        tombstones += 1;
                    }
                }
                Op::Clear => {
                    sut.clear();
                    model.clear();
                    tombstones = 0;
                }
                Op::Rehash(n) => {
                    sut.rehash(n).unwrap();
                    model.clear();
                    tombstones = 0;
                }
            }

            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.tombstones(), tombstones);
            prop_assert!(sut.len() <= sut.capacity());
        }

        let snapshot = sut.to_host_map();
        prop_assert_eq!(snapshot.len(), model.len());
        for (k, v) in &model {
            prop_assert_eq!(snapshot.get(k), Some(v));
        }
    }
}

// Property: whatever order the same keys arrive in, the surviving key set
// is the same and each key keeps the value of its first insert.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_first_insert_wins(keys in proptest::collection::vec(0usize..32, 1..100)) {
        let m: DigestMap<u32> = DigestMap::with_capacity(64).unwrap();
        let mut first: HashMap<usize, u32> = HashMap::new();
        for (pos, &k) in keys.iter().enumerate() {
            first.entry(k).or_insert(pos as u32);
            m.insert(key(k, false), pos as u32);
        }
        prop_assert_eq!(m.len(), first.len());
        for (k, pos) in first {
            prop_assert_eq!(m.get(&key(k, false)), Some(pos));
        }
    }
}
