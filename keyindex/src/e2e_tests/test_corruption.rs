//! Test that damaged slots are detected instead of silently misread.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::e2e_tests::helpers::TestIndex;
use crate::storage::{IndexError, SLOT_SIZE_U64, StorageError, Violation};

/// Flip one bit inside the slot at `location`.
fn flip_bit(test: &TestIndex, location: u64, offset: u64) {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(test.path())
        .expect("open raw file");
    let position = location * SLOT_SIZE_U64 + offset;
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::Start(position)).expect("seek");
    file.read_exact(&mut byte).expect("read byte");
    byte[0] ^= 0x10;
    file.seek(SeekFrom::Start(position)).expect("seek");
    file.write_all(&byte).expect("write byte");
}

#[test]
fn test_flipped_bit_fails_lookup_through_slot() {
    let mut test = TestIndex::with_entries(&[(50, 5), (20, 2), (80, 8)]);
    let twenty = test.location_of(20);
    test.close();

    // Inside the key field.
    flip_bit(&test, twenty, 20);
    test.reopen();

    assert!(matches!(
        test.index().lookup(20),
        Err(IndexError::Storage(StorageError::Record { location, .. })) if location == twenty
    ));
    // Paths that avoid the slot still work.
    assert_eq!(test.index().lookup(80).expect("lookup"), Some(8));
    assert_eq!(test.index().lookup(50).expect("lookup"), Some(5));
}

#[test]
fn test_verify_reports_damaged_slot() {
    let mut test = TestIndex::with_entries(&[(50, 5), (20, 2), (80, 8)]);
    let eighty = test.location_of(80);
    test.close();

    flip_bit(&test, eighty, 40);
    test.reopen();

    let report = test.index().verify().expect("verify");
    assert!(!report.is_ok());
    assert!(report.violations.iter().any(|violation| matches!(
        violation,
        Violation::Unreadable { location, .. } if *location == eighty
    )));
}

#[test]
fn test_damaged_head_is_corrupt_on_open() {
    let mut test = TestIndex::with_entries(&[(1, 1)]);
    test.close();

    flip_bit(&test, 0, 16);

    assert!(matches!(
        crate::storage::Index::open(test.path()),
        Err(IndexError::Corrupt(_))
    ));
}
