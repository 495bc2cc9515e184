//! Primary-key index storage engine.
//!
//! A single-file index mapping integer keys to record locations in an
//! external data file.
//!
//! # File Format
//!
//! The index is stored in one file of 48-byte record slots:
//!
//! - Slot 0: free-list head (location of the most recently freed slot)
//! - Slot 1: tree root (an `Invalid` root means the index is empty)
//! - Remaining slots: tree nodes or reclaimed slots on the free list
//!
//! # Usage
//!
//! ```no_run
//! use keyindex::storage::Index;
//!
//! let mut index = Index::open("IntIndex.idx".as_ref())?;
//!
//! index.insert(3, 1)?;
//! assert_eq!(index.lookup(3)?, Some(1));
//!
//! index.remove(3)?;
//! index.close()?;
//! # Ok::<(), keyindex::storage::IndexError>(())
//! ```

mod bst;
mod file;
mod freelist;
mod index;
mod io;
mod record;
mod verify;

pub use bst::{BinaryTree, NodeState, Side, TreeError, TreeNode};
pub use file::IndexFile;
pub use freelist::{FreeList, FreeListError, FreeListNode};
pub use index::{Index, IndexError, IndexStats};
pub use io::{Storage, StorageError};
pub use record::{
    FREE_LIST_HEAD, Key, Location, Record, RecordError, RecordHeader, RecordKind, SLOT_SIZE,
    SLOT_SIZE_U64, TREE_ROOT, Value,
};
pub use verify::{VerifyReport, Violation, verify};
