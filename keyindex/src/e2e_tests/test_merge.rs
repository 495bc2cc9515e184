//! Test deletes that restructure the tree.

use crate::e2e_tests::helpers::TestIndex;
use crate::storage::TREE_ROOT;

#[test]
fn test_delete_pulls_up_only_child() {
    let mut test = TestIndex::with_entries(&[(20, 200), (10, 100), (30, 300), (40, 400)]);
    let right = test.node(TREE_ROOT).right.expect("root has a right child");
    let forty = test.location_of(40);

    test.index().remove(30).expect("remove 30");

    // The root's right link is untouched; the slot it names now holds 40.
    assert_eq!(test.node(TREE_ROOT).right, Some(right));
    let moved = test.node(right);
    assert_eq!((moved.key, moved.value), (40, 400));
    assert!(moved.is_leaf());

    assert_eq!(test.free_locations(), vec![forty]);
    assert_eq!(test.keys(), vec![10, 20, 40]);
    test.assert_healthy();
}

#[test]
fn test_delete_interior_node_with_two_children() {
    let mut test = TestIndex::with_entries(&[
        (50, 0),
        (30, 0),
        (70, 0),
        (20, 0),
        (40, 0),
        (35, 0),
        (45, 0),
        (10, 0),
    ]);
    let thirty = test.location_of(30);
    let twenty = test.location_of(20);

    test.index().remove(30).expect("remove 30");

    // The left subtree root (20) takes over 30's slot; the right subtree
    // (40 with 35 and 45) hangs off the largest key on the left.
    let node = test.node(thirty);
    assert_eq!(node.key, 20);
    assert_eq!(test.free_locations(), vec![twenty]);
    assert_eq!(test.keys(), vec![10, 20, 35, 40, 45, 50, 70]);
    assert_eq!(test.node(TREE_ROOT).left, Some(thirty));
    assert_eq!(node.right, Some(test.location_of(40)));
    test.assert_healthy();
}

#[test]
fn test_delete_root_with_two_children_keeps_root_slot() {
    let mut test = TestIndex::with_entries(&[(8, 80), (4, 40), (12, 120), (2, 20), (6, 60)]);

    assert_eq!(test.index().remove(8).expect("remove 8"), 80);

    let root = test.node(TREE_ROOT);
    assert!(root.is_root);
    assert_eq!((root.key, root.value), (4, 40));
    assert_eq!(test.keys(), vec![2, 4, 6, 12]);
    for (key, value) in [(2, 20), (6, 60), (12, 120)] {
        assert_eq!(test.index().lookup(key).expect("lookup"), Some(value));
    }
    test.assert_healthy();
}

#[test]
fn test_repeated_root_deletes_drain_the_tree() {
    let entries: Vec<(i64, i64)> = [15, 7, 23, 3, 11, 19, 27, 1, 5, 9, 13]
        .iter()
        .map(|&k| (k, k * 100))
        .collect();
    let mut test = TestIndex::with_entries(&entries);
    let total_slots = test.total_slots();

    let mut remaining: Vec<i64> = entries.iter().map(|&(k, _)| k).collect();
    remaining.sort_unstable();

    while !test.index().is_empty().expect("is_empty") {
        let root_key = test.node(TREE_ROOT).key;
        assert_eq!(test.index().remove(root_key).expect("remove root"), root_key * 100);
        remaining.retain(|&k| k != root_key);
        assert_eq!(test.keys(), remaining);
        test.assert_healthy();
    }

    assert!(remaining.is_empty());
    assert!(!test.node(TREE_ROOT).is_valid());
    assert_eq!(test.total_slots(), total_slots);
    assert_eq!(test.free_locations().len() as u64, total_slots - 2);
}
