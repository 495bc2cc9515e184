//! High-level index interface.
//!
//! Provides a clean API for opening an index file, mapping keys to values,
//! and inspecting the file's health.

use std::path::Path;

use crate::config::IndexConfig;
use crate::storage::bst::{BinaryTree, TreeError};
use crate::storage::file::IndexFile;
use crate::storage::freelist::{FreeList, FreeListError};
use crate::storage::io::{Storage, StorageError};
use crate::storage::record::{Key, Location, TREE_ROOT, Value};
use crate::storage::verify::{VerifyReport, verify};

/// An index instance.
///
/// This is the main entry point for working with the storage engine. It owns
/// the backing storage and hands it to the tree for the duration of each
/// operation.
pub struct Index<S: Storage = IndexFile> {
    storage: S,
    free_list: FreeList,
}

/// Slot usage of an index file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Slots in the file, the two reserved ones included.
    pub total_slots: u64,
    /// Keys stored in the tree.
    pub live_nodes: usize,
    /// Slots waiting on the free list.
    pub free_slots: usize,
}

impl Index<IndexFile> {
    /// Open the index at `path` with default settings, creating it if it
    /// does not exist.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        Self::open_with_config(&IndexConfig::with_path(path))
    }

    /// Open the index described by `config`, creating it if it does not exist.
    pub fn open_with_config(config: &IndexConfig) -> Result<Self, IndexError> {
        let file = IndexFile::open(&config.path, config.sync_writes)?;
        Self::with_storage(file)
    }

    /// Path of the index file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    /// Flush and close the index file.
    pub fn close(mut self) -> Result<(), IndexError> {
        self.storage.close()?;
        Ok(())
    }
}

impl<S: Storage> Index<S> {
    /// Use `storage` as an index.
    ///
    /// Empty storage is formatted with a free-list head and an empty root.
    /// Storage holding only an empty free-list head gets its root written.
    /// Anything else must already hold both; otherwise the result is
    /// `IndexError::Corrupt`.
    pub fn with_storage(mut storage: S) -> Result<Self, IndexError> {
        let total_slots = storage.size_in_records()?;

        let free_list = if total_slots == 0 {
            let free_list = FreeList::init(&mut storage)?;
            BinaryTree::create(&mut storage, free_list)?;
            tracing::info!("formatted empty index");
            free_list
        } else {
            let free_list =
                FreeList::attach(&mut storage).map_err(|e| as_corruption(e.into()))?;
            let head_only = total_slots == TREE_ROOT
                && free_list
                    .is_empty(&mut storage)
                    .map_err(|e| as_corruption(e.into()))?;

            if head_only {
                // Formatting stopped after the free-list head was written.
                BinaryTree::create(&mut storage, free_list)?;
                tracing::warn!("index had no root record, formatted an empty root");
            } else {
                BinaryTree::open(&mut storage, free_list).map_err(|e| as_corruption(e.into()))?;
                tracing::debug!("attached to index with {total_slots} slots");
            }
            free_list
        };

        Ok(Self { storage, free_list })
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Get mutable access to the underlying storage.
    #[allow(clippy::missing_const_for_fn)] // mutable references can't be const
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    fn tree(&mut self) -> BinaryTree<'_, S> {
        BinaryTree::attached(&mut self.storage, self.free_list)
    }

    /// Insert `key`, or overwrite its value if already present.
    ///
    /// Returns the previous value for an existing key.
    pub fn insert(&mut self, key: Key, value: Value) -> Result<Option<Value>, IndexError> {
        Ok(self.tree().add(key, value)?)
    }

    pub fn lookup(&mut self, key: Key) -> Result<Option<Value>, IndexError> {
        Ok(self.tree().get(key)?)
    }

    pub fn contains_key(&mut self, key: Key) -> Result<bool, IndexError> {
        Ok(self.lookup(key)?.is_some())
    }

    /// Slot location of the node holding `key`.
    pub fn find_location(&mut self, key: Key) -> Result<Option<Location>, IndexError> {
        Ok(self.tree().find_by_key(key)?)
    }

    /// Remove `key`, returning the value it mapped to.
    ///
    /// Fails with `IndexError::KeyNotFound` if the key is absent.
    pub fn remove(&mut self, key: Key) -> Result<Value, IndexError> {
        Ok(self.tree().del(key)?)
    }

    /// All entries in ascending key order.
    pub fn entries(&mut self) -> Result<Vec<(Key, Value)>, IndexError> {
        let nodes = self.tree().in_order()?;
        Ok(nodes.into_iter().map(|node| (node.key, node.value)).collect())
    }

    pub fn len(&mut self) -> Result<usize, IndexError> {
        Ok(self.tree().in_order()?.len())
    }

    pub fn is_empty(&mut self) -> Result<bool, IndexError> {
        Ok(!self.tree().root()?.is_valid())
    }

    /// Free locations in the order they will be reused.
    pub fn free_locations(&mut self) -> Result<Vec<Location>, IndexError> {
        Ok(self.free_list.locations(&mut self.storage)?)
    }

    pub fn stats(&mut self) -> Result<IndexStats, IndexError> {
        Ok(IndexStats {
            total_slots: self.storage.size_in_records()?,
            live_nodes: self.len()?,
            free_slots: self.free_list.len(&mut self.storage)?,
        })
    }

    /// Check the structure of the whole file.
    ///
    /// Problems are logged and returned in the report; only I/O failures
    /// are errors.
    pub fn verify(&mut self) -> Result<VerifyReport, IndexError> {
        let report = verify(&mut self.storage)?;
        for violation in &report.violations {
            tracing::warn!("index verification: {violation}");
        }
        Ok(report)
    }

    /// Flush all written records to durable storage.
    pub fn sync(&mut self) -> Result<(), IndexError> {
        self.storage.sync()?;
        Ok(())
    }
}

/// Treat anything but an I/O failure while attaching as a damaged file.
fn as_corruption(e: IndexError) -> IndexError {
    match e {
        IndexError::Storage(
            StorageError::Io(_) | StorageError::FileNotOpen | StorageError::InjectedFault(_),
        ) => e,
        other => IndexError::Corrupt(other.to_string()),
    }
}

/// Errors that can occur during index operations.
#[derive(Debug)]
pub enum IndexError {
    /// Storage error.
    Storage(StorageError),
    /// Free-list error.
    FreeList(FreeListError),
    /// Tree error.
    Tree(TreeError),
    /// The key is not in the index.
    KeyNotFound(Key),
    /// The file does not hold a valid index.
    Corrupt(String),
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::FreeList(e) => write!(f, "free list error: {e}"),
            Self::Tree(e) => write!(f, "tree error: {e}"),
            Self::KeyNotFound(key) => write!(f, "key {key} not found"),
            Self::Corrupt(reason) => write!(f, "index file is corrupt: {reason}"),
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::FreeList(e) => Some(e),
            Self::Tree(e) => Some(e),
            Self::KeyNotFound(_) | Self::Corrupt(_) => None,
        }
    }
}

impl From<StorageError> for IndexError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<FreeListError> for IndexError {
    fn from(e: FreeListError) -> Self {
        match e {
            FreeListError::Storage(e) => Self::Storage(e),
            other => Self::FreeList(other),
        }
    }
}

impl From<TreeError> for IndexError {
    fn from(e: TreeError) -> Self {
        match e {
            TreeError::Storage(e) => Self::Storage(e),
            TreeError::FreeList(e) => e.into(),
            TreeError::KeyNotFound(key) => Self::KeyNotFound(key),
            other => Self::Tree(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::SimulatedStorage;
    use crate::storage::freelist::FreeListNode;
    use crate::storage::record::{FREE_LIST_HEAD, Record, SLOT_SIZE, SLOT_SIZE_U64};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_index_create_and_reopen() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.idx");

        {
            let mut index = Index::open(&path).expect("create index");
            assert!(index.is_empty().expect("is_empty"));
            index.insert(10, 100).expect("insert");
            index.insert(5, 50).expect("insert");
            index.insert(15, 150).expect("insert");
            index.remove(5).expect("remove");
            index.close().expect("close");
        }

        {
            let mut index = Index::open(&path).expect("reopen index");
            assert_eq!(index.lookup(10).expect("lookup"), Some(100));
            assert_eq!(index.lookup(15).expect("lookup"), Some(150));
            assert_eq!(index.lookup(5).expect("lookup"), None);
            assert_eq!(index.free_locations().expect("free"), vec![2]);

            // The freed slot survives the reopen and is reused first.
            index.insert(7, 70).expect("insert");
            assert_eq!(index.find_location(7).expect("find"), Some(2));
        }
    }

    #[test]
    fn test_new_file_is_formatted() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.idx");

        let mut index = Index::open(&path).expect("create index");
        assert_eq!(
            index.stats().expect("stats"),
            IndexStats {
                total_slots: 2,
                live_nodes: 0,
                free_slots: 0,
            }
        );
        assert_eq!(
            fs::metadata(&path).expect("metadata").len(),
            2 * SLOT_SIZE_U64
        );
    }

    #[test]
    fn test_insert_returns_previous_value() {
        let dir = tempdir().expect("create temp dir");
        let mut index = Index::open(&dir.path().join("test.idx")).expect("create index");

        assert_eq!(index.insert(1, 10).expect("insert"), None);
        assert_eq!(index.insert(1, 11).expect("insert"), Some(10));
        assert_eq!(index.entries().expect("entries"), vec![(1, 11)]);
        assert_eq!(index.len().expect("len"), 1);
    }

    #[test]
    fn test_remove_missing_key() {
        let dir = tempdir().expect("create temp dir");
        let mut index = Index::open(&dir.path().join("test.idx")).expect("create index");
        index.insert(4, 40).expect("insert");

        assert!(matches!(index.remove(9), Err(IndexError::KeyNotFound(9))));
        assert_eq!(index.remove(4).expect("remove"), 40);
        assert!(matches!(index.remove(4), Err(IndexError::KeyNotFound(4))));
        assert!(index.is_empty().expect("is_empty"));
    }

    #[test]
    fn test_stats_and_verify() {
        let dir = tempdir().expect("create temp dir");
        let mut index = Index::open(&dir.path().join("test.idx")).expect("create index");
        for key in [50, 25, 75, 10, 30, 60, 90] {
            index.insert(key, key).expect("insert");
        }
        index.remove(25).expect("remove");
        index.remove(90).expect("remove");

        let stats = index.stats().expect("stats");
        assert_eq!(stats.total_slots, 8);
        assert_eq!(stats.live_nodes, 5);
        assert_eq!(stats.free_slots, 2);

        let report = index.verify().expect("verify");
        assert!(report.is_ok(), "{:?}", report.violations);
        assert_eq!(report.tree_nodes, stats.live_nodes);
        assert_eq!(report.free_slots, stats.free_slots);
    }

    #[test]
    fn test_open_with_config() {
        let dir = tempdir().expect("create temp dir");
        let config = IndexConfig {
            path: dir.path().join("nosync.idx"),
            sync_writes: false,
        };

        let mut index = Index::open_with_config(&config).expect("create index");
        index.insert(3, 33).expect("insert");
        index.sync().expect("sync");
        assert_eq!(index.path(), config.path.as_path());
        index.close().expect("close");

        let mut index = Index::open_with_config(&config).expect("reopen index");
        assert_eq!(index.lookup(3).expect("lookup"), Some(33));
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("garbage.idx");
        fs::write(&path, [0xFFu8; SLOT_SIZE * 2]).expect("write garbage");

        assert!(matches!(Index::open(&path), Err(IndexError::Corrupt(_))));
    }

    #[test]
    fn test_head_only_file_gets_a_root() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.idx");
        Index::open(&path)
            .expect("create index")
            .close()
            .expect("close");

        // Cut the file back to just the free-list head.
        let file = fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .expect("open raw");
        file.set_len(SLOT_SIZE_U64).expect("truncate");
        drop(file);

        let mut index = Index::open(&path).expect("reopen index");
        assert!(index.is_empty().expect("is_empty"));
        assert_eq!(index.stats().expect("stats").total_slots, 2);
        index.insert(8, 80).expect("insert");
        assert_eq!(index.find_location(8).expect("find"), Some(TREE_ROOT));
        assert!(index.verify().expect("verify").is_ok());
    }

    #[test]
    fn test_missing_root_with_free_slots_is_corrupt() {
        let mut storage = SimulatedStorage::new(3);
        let head = FreeListNode {
            location: FREE_LIST_HEAD,
            next: Some(5),
        };
        storage
            .write_record(FREE_LIST_HEAD, &Record::Free(head))
            .expect("write head");

        let err = Index::with_storage(storage).err().expect("attach should fail");
        assert!(matches!(err, IndexError::Corrupt(_)));
        assert!(err.to_string().contains(&TREE_ROOT.to_string()));
    }

    #[test]
    fn test_error_conversion() {
        let err: IndexError = TreeError::KeyNotFound(7).into();
        assert!(matches!(err, IndexError::KeyNotFound(7)));

        let err: IndexError = TreeError::FreeList(FreeListError::Storage(
            StorageError::FileNotOpen,
        ))
        .into();
        assert!(matches!(err, IndexError::Storage(StorageError::FileNotOpen)));

        let err: IndexError = FreeListError::CannotFreeReservedLocation(1).into();
        assert_eq!(
            err.to_string(),
            "free list error: cannot free reserved location 1"
        );
    }
}
