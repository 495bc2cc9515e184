//! Test random operation sequences on a real file against a `BTreeMap`.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::e2e_tests::helpers::TestIndex;
use crate::storage::IndexError;

fn run_sequence(seed: u64, operations: usize, key_space: i64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut test = TestIndex::new();
    let mut model = BTreeMap::new();

    for step in 0..operations {
        let key = rng.random_range(0..key_space);
        if rng.random::<f64>() < 0.6 {
            let value = rng.random::<i64>();
            let previous = test.index().insert(key, value).expect("insert");
            assert_eq!(previous, model.insert(key, value), "seed {seed} step {step}");
        } else {
            match (test.index().remove(key), model.remove(&key)) {
                (Ok(value), Some(expected)) => assert_eq!(value, expected),
                (Err(IndexError::KeyNotFound(k)), None) => assert_eq!(k, key),
                (result, expected) => panic!(
                    "seed {seed} step {step}: remove({key}) gave {result:?}, expected {expected:?}"
                ),
            }
        }
    }

    let expected: Vec<(i64, i64)> = model.into_iter().collect();
    assert_eq!(test.index().entries().expect("entries"), expected);
    test.assert_healthy();

    test.reopen();
    assert_eq!(test.index().entries().expect("entries"), expected);
    test.assert_healthy();
}

#[test]
fn test_random_sequences_match_model() {
    for seed in 0..5 {
        run_sequence(seed, 300, 40);
    }
}

#[test]
fn test_ascending_inserts_then_drain() {
    // Sorted input degenerates the tree into a list.
    let mut test = TestIndex::new();
    for key in 0..100 {
        test.index().insert(key, -key).expect("insert");
    }
    assert_eq!(test.keys(), (0..100).collect::<Vec<_>>());

    for key in (0..100).step_by(2) {
        assert_eq!(test.index().remove(key).expect("remove"), -key);
    }
    assert_eq!(test.keys(), (1..100).step_by(2).collect::<Vec<_>>());
    test.assert_healthy();
}
