//! Tree node records.
//!
//! A tree node maps a key to a value and links to its children by location.
//! Nodes are read and written whole; nothing is held between operations.

use crate::storage::bst::tree::TreeError;
use crate::storage::io::Storage;
use crate::storage::record::{FREE_LIST_HEAD, Key, Location, Record, TREE_ROOT, Value};

/// Key and value written into an emptied node.
const EMPTY_FIELD: i64 = -1;

/// Whether a tree record holds a live entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Live entry.
    Occupied,
    /// Emptied root; key, value and links are meaningless.
    Invalid,
}

/// Which child link of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// A binary tree node as stored in one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeNode {
    pub state: NodeState,
    /// Location this node is stored at.
    pub location: Location,
    /// Set only for the node at `TREE_ROOT`.
    pub is_root: bool,
    pub key: Key,
    pub value: Value,
    /// Subtree with smaller keys.
    pub left: Option<Location>,
    /// Subtree with larger keys.
    pub right: Option<Location>,
}

impl TreeNode {
    /// An `Invalid` node with no children.
    #[must_use]
    pub const fn empty(location: Location, is_root: bool) -> Self {
        Self {
            state: NodeState::Invalid,
            location,
            is_root,
            key: EMPTY_FIELD,
            value: EMPTY_FIELD,
            left: None,
            right: None,
        }
    }

    /// An `Occupied` node.
    #[must_use]
    pub const fn occupied(
        location: Location,
        key: Key,
        value: Value,
        left: Option<Location>,
        right: Option<Location>,
    ) -> Self {
        Self {
            state: NodeState::Occupied,
            location,
            is_root: location == TREE_ROOT,
            key,
            value,
            left,
            right,
        }
    }

    /// Format an empty node at `location` and persist it.
    ///
    /// Only `TREE_ROOT` may be formatted as a root, and it may only be
    /// formatted as one.
    pub fn init_empty<S: Storage>(
        storage: &mut S,
        location: Location,
        as_root: bool,
    ) -> Result<Self, TreeError> {
        if location == FREE_LIST_HEAD || as_root != (location == TREE_ROOT) {
            return Err(TreeError::InvalidLocation(location));
        }

        let node = Self::empty(location, as_root);
        node.save(storage)?;
        Ok(node)
    }

    /// Format an occupied node at `location` and persist it.
    ///
    /// Used both for fresh leaves and for re-attaching existing subtrees
    /// without going through insert.
    pub fn init_occupied<S: Storage>(
        storage: &mut S,
        location: Location,
        key: Key,
        value: Value,
        left: Option<Location>,
        right: Option<Location>,
    ) -> Result<Self, TreeError> {
        if location == FREE_LIST_HEAD {
            return Err(TreeError::InvalidLocation(location));
        }

        let node = Self::occupied(location, key, value, left, right);
        node.save(storage)?;
        Ok(node)
    }

    /// Read the tree node stored at `location`.
    pub fn load<S: Storage>(storage: &mut S, location: Location) -> Result<Self, TreeError> {
        match storage.read_record(location)? {
            Record::Tree(node) if node.location == location => Ok(node),
            Record::Tree(node) => Err(TreeError::LocationMismatch {
                location,
                recorded: node.location,
            }),
            other => Err(TreeError::NotATreeNode {
                location,
                found: other.kind(),
            }),
        }
    }

    /// Write this node back to its own location.
    pub fn save<S: Storage>(&self, storage: &mut S) -> Result<(), TreeError> {
        storage.write_record(self.location, &Record::Tree(*self))?;
        Ok(())
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.state, NodeState::Occupied)
    }

    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    #[must_use]
    pub const fn child(&self, side: Side) -> Option<Location> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub const fn set_child(&mut self, side: Side, child: Option<Location>) {
        match side {
            Side::Left => self.left = child,
            Side::Right => self.right = child,
        }
    }

    /// Reset to an empty node in place and persist.
    pub fn invalidate<S: Storage>(&mut self, storage: &mut S) -> Result<(), TreeError> {
        *self = Self::empty(self.location, self.is_root);
        self.save(storage)
    }

    /// Take over the contents of `other` (state, entry and both links),
    /// keeping this node's location and root flag, and persist.
    pub fn copy_from<S: Storage>(&mut self, storage: &mut S, other: &Self) -> Result<(), TreeError> {
        self.state = other.state;
        self.key = other.key;
        self.value = other.value;
        self.left = other.left;
        self.right = other.right;
        self.save(storage)
    }
}
