//! Test the canonical insert/delete/reinsert sequence and its slot layout.

use crate::e2e_tests::helpers::TestIndex;
use crate::storage::TREE_ROOT;

#[test]
fn test_insert_delete_reinsert() {
    let mut test = TestIndex::with_entries(&[(3, 1), (1, 2), (6, 7), (8, 9), (12, 14)]);

    // One slot per key, filled in insertion order after the two reserved ones.
    assert_eq!(test.location_of(3), TREE_ROOT);
    assert_eq!(test.location_of(1), 2);
    assert_eq!(test.location_of(6), 3);
    assert_eq!(test.location_of(8), 4);
    assert_eq!(test.location_of(12), 5);
    assert_eq!(test.total_slots(), 6);
    assert_eq!(test.keys(), vec![1, 3, 6, 8, 12]);

    // 8 has only a right child: 12 moves into 8's slot and 12's slot is freed.
    assert_eq!(test.index().remove(8).expect("remove 8"), 9);
    assert_eq!(test.keys(), vec![1, 3, 6, 12]);
    assert_eq!(test.location_of(12), 4);
    assert_eq!(test.free_locations(), vec![5]);
    test.assert_healthy();

    // Same again one level up.
    assert_eq!(test.index().remove(6).expect("remove 6"), 7);
    assert_eq!(test.keys(), vec![1, 3, 12]);
    assert_eq!(test.location_of(12), 3);
    assert_eq!(test.free_locations(), vec![4, 5]);
    test.assert_healthy();

    // The most recently freed slot is reused; the file does not grow.
    test.index().insert(75, 12).expect("insert 75");
    assert_eq!(test.location_of(75), 4);
    assert_eq!(test.free_locations(), vec![5]);
    assert_eq!(test.total_slots(), 6);
    assert_eq!(test.keys(), vec![1, 3, 12, 75]);
    assert_eq!(test.index().lookup(75).expect("lookup"), Some(12));
    test.assert_healthy();
}

#[test]
fn test_lookups_after_scenario() {
    let mut test = TestIndex::with_entries(&[(3, 1), (1, 2), (6, 7), (8, 9), (12, 14)]);
    test.index().remove(8).expect("remove 8");
    test.index().remove(6).expect("remove 6");

    let index = test.index();
    assert_eq!(index.lookup(3).expect("lookup"), Some(1));
    assert_eq!(index.lookup(1).expect("lookup"), Some(2));
    assert_eq!(index.lookup(12).expect("lookup"), Some(14));
    assert_eq!(index.lookup(8).expect("lookup"), None);
    assert_eq!(index.lookup(6).expect("lookup"), None);
    assert_eq!(index.len().expect("len"), 3);
}
