//! Test that the index file carries its full state across reopen.

use std::fs;

use crate::e2e_tests::helpers::TestIndex;
use crate::storage::{Index, IndexError, SLOT_SIZE_U64};

#[test]
fn test_contents_and_free_list_survive_reopen() {
    let mut test = TestIndex::with_entries(&[(40, 4), (20, 2), (60, 6), (10, 1), (30, 3)]);
    test.index().remove(20).expect("remove 20");
    test.index().remove(60).expect("remove 60");
    let free = test.free_locations();
    let keys = test.keys();

    test.reopen();

    assert_eq!(test.keys(), keys);
    assert_eq!(test.free_locations(), free);
    assert_eq!(test.index().lookup(30).expect("lookup"), Some(3));
    test.assert_healthy();

    test.index().insert(25, 5).expect("insert");
    assert_eq!(test.location_of(25), free[0]);
}

#[test]
fn test_file_size_is_whole_slots() {
    let mut test = TestIndex::with_entries(&[(1, 1), (2, 2), (3, 3)]);
    let total_slots = test.total_slots();
    test.close();

    let len = fs::metadata(test.path()).expect("metadata").len();
    assert_eq!(len, total_slots * SLOT_SIZE_U64);
}

#[test]
fn test_truncated_file_is_corrupt() {
    let mut test = TestIndex::with_entries(&[(1, 1)]);
    test.close();

    fs::write(test.path(), [0u8; 10]).expect("truncate");
    // Less than one slot: treated as a fresh file.
    let mut index = Index::open(test.path()).expect("open");
    assert!(index.is_empty().expect("is_empty"));
    index.close().expect("close");

    fs::write(test.path(), [0u8; 60]).expect("overwrite");
    assert!(matches!(Index::open(test.path()), Err(IndexError::Corrupt(_))));
}
