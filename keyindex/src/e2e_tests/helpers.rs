//! Common helpers for end-to-end tests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::storage::{Index, Key, Location, TreeNode, Value};

/// An index on a scratch file. The file is removed on drop.
pub struct TestIndex {
    index: Option<Index>,
    path: PathBuf,
    // Held for its drop.
    _dir: TempDir,
}

impl TestIndex {
    /// Create a fresh index in a new temp directory.
    #[must_use]
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("IntIndex.idx");
        let index = Index::open(&path).expect("create test index");

        Self {
            index: Some(index),
            path,
            _dir: dir,
        }
    }

    /// Create an index holding `entries`, inserted in order.
    #[must_use]
    pub fn with_entries(entries: &[(Key, Value)]) -> Self {
        let mut test = Self::new();
        for &(key, value) in entries {
            test.index().insert(key, value).expect("insert");
        }
        test
    }

    pub fn index(&mut self) -> &mut Index {
        self.index.as_mut().expect("index is open")
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the index file.
    pub fn close(&mut self) {
        if let Some(index) = self.index.take() {
            index.close().expect("close index");
        }
    }

    /// Close and open the file again.
    pub fn reopen(&mut self) {
        self.close();
        self.index = Some(Index::open(&self.path).expect("reopen index"));
    }

    /// Keys in in-order traversal.
    pub fn keys(&mut self) -> Vec<Key> {
        self.index()
            .entries()
            .expect("entries")
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    }

    /// Location of `key`, which must be present.
    pub fn location_of(&mut self, key: Key) -> Location {
        self.index()
            .find_location(key)
            .expect("find location")
            .unwrap_or_else(|| panic!("key {key} should be present"))
    }

    /// Read the tree node at `location`.
    pub fn node(&mut self, location: Location) -> TreeNode {
        TreeNode::load(self.index().storage_mut(), location).expect("load node")
    }

    pub fn free_locations(&mut self) -> Vec<Location> {
        self.index().free_locations().expect("free locations")
    }

    pub fn total_slots(&mut self) -> u64 {
        self.index().stats().expect("stats").total_slots
    }

    /// Assert the file passes full verification.
    pub fn assert_healthy(&mut self) {
        let report = self.index().verify().expect("verify");
        assert!(report.is_ok(), "index is unhealthy: {:?}", report.violations);
    }
}
