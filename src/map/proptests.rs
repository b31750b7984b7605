//! Property-based tests for the concurrent map using proptest
//!
//! Random operation sequences are applied to both a `ConcurrentMap` and a
//! plain `HashMap`; the two must agree after every step.

use crate::map::ConcurrentMap;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone)]
enum Op {
    Insert(u8, i32),
    Delete(u8),
    Exists(u8),
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (any::<u8>(), any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        3 => any::<u8>().prop_map(Op::Delete),
        3 => any::<u8>().prop_map(Op::Exists),
        1 => Just(Op::Clear),
    ]
}

mod model_properties {
    use super::*;

    proptest! {
        #[test]
        fn test_matches_hashmap_model(
            ops in prop::collection::vec(op_strategy(), 1..200)
        ) {
            let map = ConcurrentMap::new();
            let mut model = HashMap::new();

            for op in ops {
                match op {
                    Op::Insert(k, v) => {
                        map.insert(k, v);
                        model.insert(k, v);
                    }
                    Op::Delete(k) => {
                        map.delete(&k);
                        model.remove(&k);
                    }
                    Op::Exists(k) => {
                        prop_assert_eq!(map.exists(&k), model.contains_key(&k));
                    }
                    Op::Clear => {
                        map.clear();
                        model.clear();
                    }
                }
                prop_assert_eq!(map.len(), model.len());
            }

            for (k, v) in &model {
                prop_assert_eq!(map.get(k), *v);
            }

            let mut keys = map.keys();
            keys.sort_unstable();
            let mut expected_keys: Vec<_> = model.keys().copied().collect();
            expected_keys.sort_unstable();
            prop_assert_eq!(keys, expected_keys);

            let mut values = map.values();
            values.sort_unstable();
            let mut expected_values: Vec<_> = model.values().copied().collect();
            expected_values.sort_unstable();
            prop_assert_eq!(values, expected_values);
        }

        #[test]
        fn test_last_write_wins(
            key in any::<u16>(),
            writes in prop::collection::vec(any::<i64>(), 1..20)
        ) {
            let map = ConcurrentMap::new();
            for &value in &writes {
                map.insert(key, value);
            }

            prop_assert_eq!(map.len(), 1);
            prop_assert_eq!(map.get(&key), *writes.last().unwrap());
        }

        #[test]
        fn test_range_stops_after_limit(
            entries in prop::collection::hash_map(any::<u32>(), any::<u32>(), 0..64),
            limit in 1usize..16
        ) {
            let map: ConcurrentMap<u32, u32> = entries.clone().into_iter().collect();

            let mut visited = 0;
            map.range(|k, v| {
                assert_eq!(entries.get(k), Some(v));
                visited += 1;
                visited < limit
            });

            prop_assert_eq!(visited, limit.min(entries.len()));
        }

        #[test]
        fn test_json_matches_serde_json_object(
            entries in prop::collection::btree_map(any::<i32>(), ".{0,8}", 0..32)
        ) {
            let map: ConcurrentMap<i32, String> = entries.clone().into_iter().collect();

            let encoded: BTreeMap<String, String> =
                serde_json::from_slice(&map.to_json().unwrap()).unwrap();
            let expected: BTreeMap<String, String> = entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();

            prop_assert_eq!(encoded, expected);
        }
    }
}

mod concurrent_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_disjoint_writers_lose_nothing(
            num_threads in 1usize..6,
            items_per_thread in 1usize..200
        ) {
            let map = Arc::new(ConcurrentMap::new());

            let handles: Vec<_> = (0..num_threads)
                .map(|thread_id| {
                    let map = Arc::clone(&map);
                    thread::spawn(move || {
                        for i in 0..items_per_thread {
                            let key = thread_id * items_per_thread + i;
                            map.insert(key, (thread_id, i));
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            prop_assert_eq!(map.len(), num_threads * items_per_thread);
            for thread_id in 0..num_threads {
                for i in 0..items_per_thread {
                    let key = thread_id * items_per_thread + i;
                    prop_assert_eq!(map.get(&key), (thread_id, i));
                }
            }
        }
    }
}
