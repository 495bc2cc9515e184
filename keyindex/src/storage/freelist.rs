//! Free-list allocator for record slots.
//!
//! Reclaimed slots form a LIFO singly-linked list threaded through the index
//! file itself. The head record lives at location 0 and holds the location of
//! the most recently freed slot. Each free slot holds the location of the
//! next one. Nothing is cached in memory: every operation reads the head.

use crate::storage::io::{Storage, StorageError};
use crate::storage::record::{FREE_LIST_HEAD, Location, Record, RecordKind, TREE_ROOT};

/// A free-list record: the head at location 0, or a reclaimed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeListNode {
    /// Location this record is stored at.
    pub location: Location,
    /// Next free location, `None` at the end of the list.
    pub next: Option<Location>,
}

/// Handle to the free list of an initialized index file.
///
/// Holds no state of its own; the list lives entirely in storage.
#[derive(Debug, Clone, Copy)]
pub struct FreeList {
    _initialized: (),
}

impl FreeList {
    /// Write an empty head record at location 0.
    ///
    /// Fails if storage already has a slot at location 0.
    pub fn init<S: Storage>(storage: &mut S) -> Result<Self, FreeListError> {
        if storage.size_in_records()? > FREE_LIST_HEAD {
            return Err(FreeListError::AlreadyInitialized);
        }

        let head = FreeListNode {
            location: FREE_LIST_HEAD,
            next: None,
        };
        storage.write_record(FREE_LIST_HEAD, &Record::Free(head))?;
        tracing::debug!("initialized free list head");

        Ok(Self { _initialized: () })
    }

    /// Attach to the free list of an existing file, validating the head.
    pub fn attach<S: Storage>(storage: &mut S) -> Result<Self, FreeListError> {
        Self::read_head(storage)?;
        Ok(Self { _initialized: () })
    }

    fn read_head<S: Storage>(storage: &mut S) -> Result<FreeListNode, FreeListError> {
        if storage.size_in_records()? <= FREE_LIST_HEAD {
            return Err(FreeListError::NotInitialized);
        }
        match storage.read_record(FREE_LIST_HEAD)? {
            Record::Free(head) if head.location == FREE_LIST_HEAD => Ok(head),
            other => Err(FreeListError::Corrupt {
                location: FREE_LIST_HEAD,
                found: other.kind(),
            }),
        }
    }

    fn read_free_node<S: Storage>(
        storage: &mut S,
        location: Location,
    ) -> Result<FreeListNode, FreeListError> {
        match storage.read_record(location)? {
            Record::Free(node) if node.location == location => Ok(node),
            other => Err(FreeListError::Corrupt {
                location,
                found: other.kind(),
            }),
        }
    }

    /// Whether no reclaimed slots are available.
    pub fn is_empty<S: Storage>(self, storage: &mut S) -> Result<bool, FreeListError> {
        Ok(Self::read_head(storage)?.next.is_none())
    }

    /// Hand out a location for a new record.
    ///
    /// With an empty list this returns `size_in_records()`, the slot just past
    /// the end of the file, and changes nothing. Otherwise it pops the most
    /// recently freed location and persists the new head. Either way the
    /// caller must write a record at the returned location before asking for
    /// another one: two calls on an empty list return the same location, and
    /// a popped location that is never written is leaked.
    pub fn next_free_location<S: Storage>(self, storage: &mut S) -> Result<Location, FreeListError> {
        let mut head = Self::read_head(storage)?;

        let Some(location) = head.next else {
            let location = storage.size_in_records()?;
            tracing::trace!("free list empty, growing to location {location}");
            return Ok(location);
        };

        let popped = Self::read_free_node(storage, location)?;
        head.next = popped.next;
        storage.write_record(FREE_LIST_HEAD, &Record::Free(head))?;
        tracing::debug!("reusing free location {location}");

        Ok(location)
    }

    /// Push `location` onto the front of the list.
    ///
    /// The slot is overwritten with a free record; whatever it held is gone.
    pub fn free_location<S: Storage>(
        self,
        storage: &mut S,
        location: Location,
    ) -> Result<(), FreeListError> {
        if location == FREE_LIST_HEAD || location == TREE_ROOT {
            return Err(FreeListError::CannotFreeReservedLocation(location));
        }

        let mut head = Self::read_head(storage)?;
        let node = FreeListNode {
            location,
            next: head.next,
        };
        storage.write_record(location, &Record::Free(node))?;

        head.next = Some(location);
        storage.write_record(FREE_LIST_HEAD, &Record::Free(head))?;
        tracing::debug!("freed location {location}");

        Ok(())
    }

    /// Free locations in the order they would be handed out.
    pub fn locations<S: Storage>(self, storage: &mut S) -> Result<Vec<Location>, FreeListError> {
        let total_slots = storage.size_in_records()?;
        let mut result = Vec::new();
        let mut next = Self::read_head(storage)?.next;

        while let Some(location) = next {
            // A chain longer than the file has a cycle.
            if result.len() as u64 >= total_slots {
                return Err(FreeListError::Cycle { location });
            }
            result.push(location);
            next = Self::read_free_node(storage, location)?.next;
        }

        Ok(result)
    }

    /// Number of reclaimed slots on the list.
    pub fn len<S: Storage>(self, storage: &mut S) -> Result<usize, FreeListError> {
        Ok(self.locations(storage)?.len())
    }
}

/// Errors that can occur during free-list operations.
#[derive(Debug)]
pub enum FreeListError {
    /// Storage error.
    Storage(StorageError),
    /// Location 0 already holds a record.
    AlreadyInitialized,
    /// Storage has no head record.
    NotInitialized,
    /// Locations 0 and 1 are never reclaimed.
    CannotFreeReservedLocation(Location),
    /// A record on the chain is not a free-list node.
    Corrupt { location: Location, found: RecordKind },
    /// The chain loops back on itself.
    Cycle { location: Location },
}

impl std::fmt::Display for FreeListError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::AlreadyInitialized => write!(f, "free list already initialized"),
            Self::NotInitialized => write!(f, "free list not initialized"),
            Self::CannotFreeReservedLocation(location) => {
                write!(f, "cannot free reserved location {location}")
            }
            Self::Corrupt { location, found } => write!(
                f,
                "free list corrupt: expected free record at {location}, found {found:?}"
            ),
            Self::Cycle { location } => {
                write!(f, "free list corrupt: cycle through location {location}")
            }
        }
    }
}

impl std::error::Error for FreeListError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for FreeListError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::bst::TreeNode;
    use crate::storage::file::IndexFile;
    use tempfile::{TempDir, tempdir};

    fn setup() -> (TempDir, IndexFile, FreeList) {
        let dir = tempdir().expect("create temp dir");
        let mut file = IndexFile::open(&dir.path().join("test.idx"), false).expect("open");
        let free_list = FreeList::init(&mut file).expect("init");
        // Reserve the root slot the way an index does.
        file.write_record(TREE_ROOT, &Record::Tree(TreeNode::empty(TREE_ROOT, true)))
            .expect("write root");
        (dir, file, free_list)
    }

    fn claim(file: &mut IndexFile, location: Location) {
        file.write_record(
            location,
            &Record::Tree(TreeNode::occupied(location, 0, 0, None, None)),
        )
        .expect("claim");
    }

    #[test]
    fn test_init_writes_empty_head() {
        let (_dir, mut file, free_list) = setup();

        assert!(free_list.is_empty(&mut file).expect("is_empty"));
        assert_eq!(
            file.read_record(FREE_LIST_HEAD).expect("read"),
            Record::Free(FreeListNode {
                location: FREE_LIST_HEAD,
                next: None
            })
        );
    }

    #[test]
    fn test_init_twice_fails() {
        let (_dir, mut file, _free_list) = setup();
        assert!(matches!(
            FreeList::init(&mut file),
            Err(FreeListError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_attach_requires_head() {
        let dir = tempdir().expect("create temp dir");
        let mut file = IndexFile::open(&dir.path().join("test.idx"), false).expect("open");
        assert!(matches!(
            FreeList::attach(&mut file),
            Err(FreeListError::NotInitialized)
        ));

        claim(&mut file, 0);
        assert!(matches!(
            FreeList::attach(&mut file),
            Err(FreeListError::Corrupt { location: 0, .. })
        ));
    }

    #[test]
    fn test_growth_on_empty_list() {
        let (_dir, mut file, free_list) = setup();

        let size = file.size_in_records().expect("size");
        let location = free_list.next_free_location(&mut file).expect("next");
        assert_eq!(location, size);

        // Not claimed yet: asking again hands out the same slot.
        assert_eq!(free_list.next_free_location(&mut file).expect("next"), size);

        claim(&mut file, location);
        assert_eq!(
            free_list.next_free_location(&mut file).expect("next"),
            size + 1
        );
    }

    #[test]
    fn test_lifo_order() {
        let (_dir, mut file, free_list) = setup();
        for location in 2..=4 {
            claim(&mut file, location);
        }

        for location in [2, 3, 4] {
            free_list.free_location(&mut file, location).expect("free");
        }
        assert_eq!(free_list.locations(&mut file).expect("locations"), vec![4, 3, 2]);
        assert_eq!(free_list.len(&mut file).expect("len"), 3);

        let popped: Vec<Location> = (0..3)
            .map(|_| {
                let location = free_list.next_free_location(&mut file).expect("pop");
                claim(&mut file, location);
                location
            })
            .collect();
        assert_eq!(popped, vec![4, 3, 2]);
        assert!(free_list.is_empty(&mut file).expect("is_empty"));
    }

    #[test]
    fn test_freed_slot_is_reused_before_growth() {
        let (_dir, mut file, free_list) = setup();
        claim(&mut file, 2);
        claim(&mut file, 3);

        free_list.free_location(&mut file, 2).expect("free");
        let size = file.size_in_records().expect("size");

        assert_eq!(free_list.next_free_location(&mut file).expect("next"), 2);
        claim(&mut file, 2);
        assert_eq!(file.size_in_records().expect("size"), size);
        assert_eq!(free_list.next_free_location(&mut file).expect("next"), size);
    }

    #[test]
    fn test_reserved_locations_cannot_be_freed() {
        let (_dir, mut file, free_list) = setup();

        for location in [FREE_LIST_HEAD, TREE_ROOT] {
            assert!(matches!(
                free_list.free_location(&mut file, location),
                Err(FreeListError::CannotFreeReservedLocation(l)) if l == location
            ));
        }
        assert!(free_list.is_empty(&mut file).expect("is_empty"));
    }

    #[test]
    fn test_popping_a_non_free_record_is_corruption() {
        let (_dir, mut file, free_list) = setup();
        claim(&mut file, 2);
        free_list.free_location(&mut file, 2).expect("free");

        // Overwrite the free slot behind the allocator's back.
        claim(&mut file, 2);

        assert!(matches!(
            free_list.next_free_location(&mut file),
            Err(FreeListError::Corrupt {
                location: 2,
                found: RecordKind::Occupied
            })
        ));
    }

    #[test]
    fn test_cycle_is_detected() {
        let (_dir, mut file, free_list) = setup();
        claim(&mut file, 2);
        free_list.free_location(&mut file, 2).expect("free");
        file.write_record(
            2,
            &Record::Free(FreeListNode {
                location: 2,
                next: Some(2),
            }),
        )
        .expect("write loop");

        assert!(matches!(
            free_list.locations(&mut file),
            Err(FreeListError::Cycle { .. })
        ));
    }
}
