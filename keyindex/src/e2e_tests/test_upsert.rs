//! Test that inserting an existing key overwrites its value in place.

use crate::e2e_tests::helpers::TestIndex;

#[test]
fn test_upsert_overwrites_value() {
    let mut test = TestIndex::with_entries(&[(10, 1), (5, 2), (15, 3)]);
    let location = test.location_of(15);
    let total_slots = test.total_slots();

    assert_eq!(test.index().insert(15, 33).expect("upsert"), Some(3));

    assert_eq!(test.index().lookup(15).expect("lookup"), Some(33));
    assert_eq!(test.location_of(15), location);
    assert_eq!(test.total_slots(), total_slots);
    assert_eq!(test.index().len().expect("len"), 3);
}

#[test]
fn test_upsert_root_key() {
    let mut test = TestIndex::with_entries(&[(10, 1)]);

    assert_eq!(test.index().insert(10, 2).expect("upsert"), Some(1));
    assert_eq!(test.index().insert(10, 3).expect("upsert"), Some(2));

    assert_eq!(test.index().entries().expect("entries"), vec![(10, 3)]);
    assert_eq!(test.total_slots(), 2);
}

#[test]
fn test_extreme_keys() {
    let mut test = TestIndex::with_entries(&[(0, 0), (i64::MIN, -1), (i64::MAX, 1), (-1, i64::MIN)]);

    assert_eq!(test.keys(), vec![i64::MIN, -1, 0, i64::MAX]);
    assert_eq!(test.index().lookup(-1).expect("lookup"), Some(i64::MIN));
    assert_eq!(test.index().lookup(i64::MAX).expect("lookup"), Some(1));
    test.assert_healthy();
}
