//! Registry model checks: sequential runs against `HashSet`, concurrent runs against the
//! set of items each thread owns.

use proptest::prelude::*;
use std::collections::HashSet;
use std::convert::Infallible;

use switchboard_core::registry::{ConcurrentMap, ConcurrentSet, RegistryConfig};

#[derive(Debug, Clone)]
enum Op {
    Add(u16),
    Remove(u16),
    Contains(u16),
    Clear,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0u16..512).prop_map(Op::Add),
        3 => (0u16..512).prop_map(Op::Remove),
        2 => (0u16..512).prop_map(Op::Contains),
        1 => Just(Op::Clear),
    ]
}

fn small_registry() -> RegistryConfig {
    // few buckets and stripes so the runs resize often
    RegistryConfig::default()
        .with_concurrency_level(2)
        .with_capacity(3)
}

proptest! {
    #[test]
    fn set_matches_hashset(ops in prop::collection::vec(op(), 1..400)) {
        let set = ConcurrentSet::with_config(&small_registry()).unwrap();
        let mut model = HashSet::new();

        for op in ops {
            match op {
                Op::Add(x) => prop_assert_eq!(set.add(x), model.insert(x)),
                Op::Remove(x) => prop_assert_eq!(set.remove(&x), model.remove(&x)),
                Op::Contains(x) => prop_assert_eq!(set.contains(&x), model.contains(&x)),
                Op::Clear => {
                    set.clear();
                    model.clear();
                }
            }
            prop_assert_eq!(set.len(), model.len());
        }

        let snapshot: HashSet<u16> = set.snapshot().into_iter().collect();
        prop_assert_eq!(snapshot, model);
    }

    #[test]
    fn map_insert_if_absent_keeps_first_value(pairs in prop::collection::vec((0u8..64, any::<u32>()), 1..200)) {
        let map = ConcurrentMap::with_config(&small_registry()).unwrap();
        let mut model = std::collections::HashMap::new();

        for (key, value) in pairs {
            let inserted = map.insert_if_absent(key, value);
            let expected = !model.contains_key(&key);
            model.entry(key).or_insert(value);
            prop_assert_eq!(inserted, expected);
        }

        for (key, value) in &model {
            prop_assert_eq!(map.get(key), Some(*value));
        }
        prop_assert_eq!(map.len(), model.len());
    }
}

/// One stripe and a single bucket, so every run resizes and grows the lock array.
fn tiny_registry() -> RegistryConfig {
    RegistryConfig::default()
        .with_concurrency_level(1)
        .with_capacity(1)
}

const KEYS_PER_THREAD: u32 = 1_000;

fn thread_ops() -> impl Strategy<Value = Vec<(bool, u32)>> {
    prop::collection::vec((any::<bool>(), 0u32..256), 1..200)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn concurrent_runs_match_replayed_model(threads in prop::collection::vec(thread_ops(), 4..=8)) {
        let set = ConcurrentSet::with_config(&tiny_registry()).unwrap();

        // threads own disjoint key ranges, so each range replays independently
        std::thread::scope(|scope| {
            for (t, ops) in threads.iter().enumerate() {
                let set = &set;
                scope.spawn(move || {
                    let base = t as u32 * KEYS_PER_THREAD;
                    for &(add, key) in ops {
                        if add {
                            set.add(base + key);
                        } else {
                            set.remove(&(base + key));
                        }
                    }
                });
            }
        });

        let mut model = HashSet::new();
        for (t, ops) in threads.iter().enumerate() {
            let base = t as u32 * KEYS_PER_THREAD;
            for &(add, key) in ops {
                if add {
                    model.insert(base + key);
                } else {
                    model.remove(&(base + key));
                }
            }
        }

        let snapshot = set.snapshot();
        let distinct: HashSet<u32> = snapshot.iter().copied().collect();
        prop_assert_eq!(distinct.len(), snapshot.len());
        prop_assert_eq!(distinct, model.clone());
        prop_assert_eq!(set.len(), model.len());
    }
}

#[test]
fn contended_add_or_update_counts_every_increment() {
    const THREADS: u32 = 8;
    const KEYS: u32 = 5_000;

    let map = ConcurrentMap::with_config(&tiny_registry()).unwrap();
    std::thread::scope(|scope| {
        for _ in 0..THREADS {
            let map = &map;
            scope.spawn(move || {
                for key in 0..KEYS {
                    map.add_or_update(key, || Ok::<u32, Infallible>(1), |_, count| Ok(count + 1))
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(map.len(), KEYS as usize);
    for key in 0..KEYS {
        assert_eq!(map.get(&key), Some(THREADS));
    }
}

#[test]
fn concurrent_add_remove_never_loses_live_items() {
    const THREADS: u32 = 8;
    const PER_THREAD: u32 = 2_000;

    let set = ConcurrentSet::with_config(&small_registry()).unwrap();
    std::thread::scope(|scope| {
        for t in 0..THREADS {
            let set = &set;
            scope.spawn(move || {
                let base = t * PER_THREAD;
                for i in base..base + PER_THREAD {
                    assert!(set.add(i));
                }
                // drop the odd ones again while the other threads keep growing the table
                for i in (base..base + PER_THREAD).filter(|i| i % 2 == 1) {
                    assert!(set.remove(&i));
                }
            });
        }
    });

    let expected: HashSet<u32> = (0..THREADS * PER_THREAD).filter(|i| i % 2 == 0).collect();
    let actual: HashSet<u32> = set.snapshot().into_iter().collect();
    assert_eq!(set.len(), expected.len());
    assert_eq!(actual, expected);
    for i in 0..THREADS * PER_THREAD {
        assert_eq!(set.contains(&i), i % 2 == 0);
    }
}

#[test]
fn concurrent_readers_see_stable_items_during_growth() {
    let set = ConcurrentSet::with_config(&small_registry()).unwrap();
    for i in 0..64u32 {
        set.add(i);
    }

    std::thread::scope(|scope| {
        let set = &set;
        scope.spawn(move || {
            for i in 64..20_000u32 {
                set.add(i);
            }
        });
        for _ in 0..4 {
            scope.spawn(move || {
                for _ in 0..200 {
                    for i in 0..64u32 {
                        assert!(set.contains(&i));
                    }
                }
            });
        }
    });

    assert_eq!(set.len(), 20_000);
}
