//! Test that emptying the index keeps the root slot in place.

use crate::e2e_tests::helpers::TestIndex;
use crate::storage::{IndexError, TREE_ROOT};

#[test]
fn test_removing_last_key_invalidates_root() {
    let mut test = TestIndex::with_entries(&[(42, 420)]);
    let total_slots = test.total_slots();

    assert_eq!(test.index().remove(42).expect("remove"), 420);

    let root = test.node(TREE_ROOT);
    assert!(root.is_root);
    assert!(!root.is_valid());
    assert_eq!(test.total_slots(), total_slots);
    assert!(test.free_locations().is_empty());
    assert!(test.index().is_empty().expect("is_empty"));
    assert_eq!(test.index().lookup(42).expect("lookup"), None);
    test.assert_healthy();
}

#[test]
fn test_empty_index_rejects_remove() {
    let mut test = TestIndex::new();

    assert!(matches!(
        test.index().remove(1),
        Err(IndexError::KeyNotFound(1))
    ));
    assert!(test.index().entries().expect("entries").is_empty());
}

#[test]
fn test_emptied_root_takes_next_insert() {
    let mut test = TestIndex::with_entries(&[(5, 50), (2, 20)]);
    test.index().remove(2).expect("remove 2");
    test.index().remove(5).expect("remove 5");
    assert!(test.index().is_empty().expect("is_empty"));

    test.index().insert(9, 90).expect("insert");

    assert_eq!(test.location_of(9), TREE_ROOT);
    // The freed slot is still waiting for the next child.
    assert_eq!(test.free_locations(), vec![2]);
    test.index().insert(1, 10).expect("insert");
    assert_eq!(test.location_of(1), 2);
    test.assert_healthy();
}

#[test]
fn test_emptied_index_survives_reopen() {
    let mut test = TestIndex::with_entries(&[(7, 70)]);
    test.index().remove(7).expect("remove");

    test.reopen();

    assert!(test.index().is_empty().expect("is_empty"));
    test.index().insert(8, 80).expect("insert");
    assert_eq!(test.location_of(8), TREE_ROOT);
}
