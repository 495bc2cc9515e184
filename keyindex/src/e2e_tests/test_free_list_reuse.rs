//! Test that freed slots are reused before the file grows.

use crate::e2e_tests::helpers::TestIndex;

#[test]
fn test_freed_leaves_reused_last_in_first_out() {
    let mut test = TestIndex::with_entries(&[(50, 0), (20, 0), (80, 0), (10, 0), (90, 0)]);
    let ten = test.location_of(10);
    let ninety = test.location_of(90);
    let total_slots = test.total_slots();

    test.index().remove(10).expect("remove 10");
    test.index().remove(90).expect("remove 90");
    assert_eq!(test.free_locations(), vec![ninety, ten]);

    test.index().insert(30, 0).expect("insert 30");
    assert_eq!(test.location_of(30), ninety);
    test.index().insert(60, 0).expect("insert 60");
    assert_eq!(test.location_of(60), ten);
    assert_eq!(test.total_slots(), total_slots);

    // Free list exhausted: the next insert grows the file by one slot.
    test.index().insert(70, 0).expect("insert 70");
    assert_eq!(test.location_of(70), total_slots);
    assert_eq!(test.total_slots(), total_slots + 1);
    test.assert_healthy();
}

#[test]
fn test_stats_track_slot_usage() {
    let mut test = TestIndex::with_entries(&[(1, 0), (2, 0), (3, 0), (4, 0)]);

    for key in [4, 3] {
        test.index().remove(key).expect("remove");
    }

    let stats = test.index().stats().expect("stats");
    assert_eq!(stats.total_slots, 5);
    assert_eq!(stats.live_nodes, 2);
    assert_eq!(stats.free_slots, 2);
}
