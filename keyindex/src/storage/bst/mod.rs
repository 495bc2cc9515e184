//! Binary search tree index stored in record slots.
//!
//! # Structure
//!
//! Each node holds one `(key, value)` entry and the locations of its left
//! and right children. The root always lives at `TREE_ROOT`; an emptied
//! root stays in place as an `Invalid` node. Nodes below the root get their
//! slots from the free list and return them on delete.
//!
//! # Usage
//!
//! ```
//! use keyindex::simulation::SimulatedStorage;
//! use keyindex::storage::{BinaryTree, FreeList, TREE_ROOT};
//!
//! let mut storage = SimulatedStorage::new(0);
//! let free_list = FreeList::init(&mut storage).unwrap();
//! let mut tree = BinaryTree::create(&mut storage, free_list).unwrap();
//!
//! tree.add(3, 30).unwrap();
//! tree.add(1, 10).unwrap();
//!
//! assert_eq!(tree.find_by_key(3).unwrap(), Some(TREE_ROOT));
//! assert_eq!(tree.get(1).unwrap(), Some(10));
//! ```

mod node;
mod tree;

pub use node::{NodeState, Side, TreeNode};
pub use tree::{BinaryTree, TreeError};
