//! Binary search tree over record locations.
//!
//! The tree is rooted at `TREE_ROOT` and never rebalanced. Every reference
//! between nodes is a slot location; every step of every operation reads the
//! node it visits from storage and writes back the nodes it changes. Fresh
//! nodes come from the free list and deleted nodes go back to it.
//!
//! Ordering is the same everywhere: a smaller key goes left, a larger key
//! goes right.

use std::cmp::Ordering;

use crate::storage::bst::node::{NodeState, Side, TreeNode};
use crate::storage::freelist::{FreeList, FreeListError};
use crate::storage::io::{Storage, StorageError};
use crate::storage::record::{Key, Location, RecordKind, TREE_ROOT, Value};

/// Open key interval covered by an empty child link.
#[derive(Debug, Clone, Copy, Default)]
struct KeyRange {
    lower: Option<Key>,
    upper: Option<Key>,
}

impl KeyRange {
    fn contains(self, key: Key) -> bool {
        self.lower.is_none_or(|lower| key > lower) && self.upper.is_none_or(|upper| key < upper)
    }
}

/// A binary search tree stored in `storage`.
pub struct BinaryTree<'a, S: Storage> {
    storage: &'a mut S,
    free_list: FreeList,
}

impl<'a, S: Storage> BinaryTree<'a, S> {
    /// Format an empty root at `TREE_ROOT`.
    ///
    /// Storage must hold exactly the free-list head.
    pub fn create(storage: &'a mut S, free_list: FreeList) -> Result<Self, TreeError> {
        let total_slots = storage.size_in_records()?;
        if total_slots != TREE_ROOT {
            return Err(TreeError::InvalidLocation(total_slots));
        }
        TreeNode::init_empty(storage, TREE_ROOT, true)?;
        tracing::debug!("initialized empty tree root");

        Ok(Self { storage, free_list })
    }

    /// Attach to an existing tree, validating the root record.
    pub fn open(storage: &'a mut S, free_list: FreeList) -> Result<Self, TreeError> {
        let root = TreeNode::load(storage, TREE_ROOT)?;
        if !root.is_root {
            return Err(TreeError::InvalidRoot);
        }

        Ok(Self { storage, free_list })
    }

    /// Wrap storage that `create` or `open` has already validated.
    pub(crate) const fn attached(storage: &'a mut S, free_list: FreeList) -> Self {
        Self { storage, free_list }
    }

    /// Get mutable access to the underlying storage.
    #[allow(clippy::missing_const_for_fn)] // mutable references can't be const
    pub fn storage_mut(&mut self) -> &mut S {
        self.storage
    }

    #[must_use]
    pub const fn free_list(&self) -> FreeList {
        self.free_list
    }

    /// Read the root node.
    pub fn root(&mut self) -> Result<TreeNode, TreeError> {
        TreeNode::load(self.storage, TREE_ROOT)
    }

    /// Read the node at `location`.
    pub fn node(&mut self, location: Location) -> Result<TreeNode, TreeError> {
        TreeNode::load(self.storage, location)
    }

    /// Insert or update a key-value pair.
    ///
    /// Returns the old value if the key was already present.
    pub fn add(&mut self, key: Key, value: Value) -> Result<Option<Value>, TreeError> {
        let mut current = self.root()?;

        if !current.is_valid() && current.is_root {
            current.state = NodeState::Occupied;
            current.key = key;
            current.value = value;
            current.left = None;
            current.right = None;
            current.save(self.storage)?;
            tracing::trace!("key {key} stored in empty root");
            return Ok(None);
        }

        loop {
            let side = match key.cmp(&current.key) {
                Ordering::Equal => {
                    let old = current.value;
                    current.value = value;
                    current.save(self.storage)?;
                    return Ok(Some(old));
                }
                Ordering::Less => Side::Left,
                Ordering::Greater => Side::Right,
            };

            match current.child(side) {
                Some(child) => current = self.node(child)?,
                None => {
                    // Write the leaf before linking it so a failure never
                    // leaves the parent pointing at garbage.
                    let location = self.free_list.next_free_location(self.storage)?;
                    TreeNode::init_occupied(self.storage, location, key, value, None, None)?;
                    current.set_child(side, Some(location));
                    current.save(self.storage)?;
                    tracing::trace!(
                        "key {key} stored at location {location} under {}",
                        current.location
                    );
                    return Ok(None);
                }
            }
        }
    }

    /// Find the location of the node holding `key`.
    pub fn find_by_key(&mut self, key: Key) -> Result<Option<Location>, TreeError> {
        Ok(self.find_node(key)?.map(|node| node.location))
    }

    /// Look up the value stored for `key`.
    pub fn get(&mut self, key: Key) -> Result<Option<Value>, TreeError> {
        Ok(self.find_node(key)?.map(|node| node.value))
    }

    fn find_node(&mut self, key: Key) -> Result<Option<TreeNode>, TreeError> {
        let mut current = self.root()?;
        if !current.is_valid() {
            return Ok(None);
        }

        loop {
            let next = match key.cmp(&current.key) {
                Ordering::Equal => return Ok(Some(current)),
                Ordering::Less => current.left,
                Ordering::Greater => current.right,
            };
            match next {
                Some(child) => current = self.node(child)?,
                None => return Ok(None),
            }
        }
    }

    /// Remove `key` from the tree.
    ///
    /// Fails with `KeyNotFound` if the key is absent.
    pub fn del(&mut self, key: Key) -> Result<Value, TreeError> {
        let mut parent: Option<(TreeNode, Side)> = None;
        let mut node = self.root()?;

        loop {
            if !node.is_valid() {
                return Err(TreeError::KeyNotFound(key));
            }
            let side = match key.cmp(&node.key) {
                Ordering::Equal => break,
                Ordering::Less => Side::Left,
                Ordering::Greater => Side::Right,
            };
            let Some(child) = node.child(side) else {
                return Err(TreeError::KeyNotFound(key));
            };
            parent = Some((node, side));
            node = self.node(child)?;
        }

        let (value, released) = self.del_here(node)?;
        if let (true, Some((mut parent, side))) = (released, parent) {
            parent.set_child(side, None);
            parent.save(self.storage)?;
        }
        Ok(value)
    }

    /// Remove the entry held by `node` itself.
    ///
    /// Returns the removed value and whether the slot was released as a
    /// leaf, in which case the parent must clear its link.
    fn del_here(&mut self, mut node: TreeNode) -> Result<(Value, bool), TreeError> {
        let value = node.value;
        let location = node.location;

        match (node.left, node.right) {
            (None, None) if node.is_root => {
                tracing::debug!("deleted key {} from root, tree is now empty", node.key);
                node.invalidate(self.storage)?;
                Ok((value, true))
            }
            (None, None) => {
                tracing::debug!("deleted leaf key {} at location {location}", node.key);
                self.free_list.free_location(self.storage, location)?;
                Ok((value, true))
            }
            (None, Some(child)) | (Some(child), None) => {
                // Pull the only child up into this slot; its children come
                // along with the copy.
                let replacement = self.node(child)?;
                tracing::debug!(
                    "deleted key {} at location {location}, pulled up key {} from {child}",
                    node.key,
                    replacement.key
                );
                node.copy_from(self.storage, &replacement)?;
                self.free_list.free_location(self.storage, child)?;
                Ok((value, false))
            }
            (Some(left), Some(right)) => {
                tracing::debug!(
                    "deleted key {} at location {location}, merging subtrees {left} and {right}",
                    node.key
                );
                self.add_node(left, right)?;
                let merged = self.node(left)?;
                node.copy_from(self.storage, &merged)?;
                self.free_list.free_location(self.storage, left)?;
                Ok((value, false))
            }
        }
    }

    /// Graft the subtree rooted at `donor` into the subtree rooted at
    /// `recipient`, keeping search order.
    ///
    /// A donor node whose key already exists hands its value to the existing
    /// node and its slot is freed; its children are grafted in turn. A donor
    /// subtree is linked whole under an empty child link only if all of its
    /// keys fall inside the interval that link covers. Otherwise the donor
    /// node is linked alone and its children are grafted separately.
    ///
    /// Donors still to be placed wait on a work list, so a long chain does
    /// not deepen the call stack.
    fn add_node(&mut self, recipient: Location, donor: Location) -> Result<(), TreeError> {
        let mut pending = vec![donor];
        while let Some(donor) = pending.pop() {
            self.place_donor(recipient, donor, &mut pending)?;
        }
        Ok(())
    }

    /// Place one donor node, pushing any children it leaves behind.
    fn place_donor(
        &mut self,
        recipient: Location,
        donor: Location,
        pending: &mut Vec<Location>,
    ) -> Result<(), TreeError> {
        let donor_node = self.node(donor)?;
        let mut current = self.node(recipient)?;
        let mut range = KeyRange::default();

        loop {
            // Empty root: the donor subtree becomes the whole tree.
            if !current.is_valid() && current.is_root {
                current.copy_from(self.storage, &donor_node)?;
                self.free_list.free_location(self.storage, donor)?;
                return Ok(());
            }

            let side = match donor_node.key.cmp(&current.key) {
                Ordering::Equal => return self.absorb(&mut current, &donor_node, pending),
                Ordering::Less => {
                    range.upper = Some(current.key);
                    Side::Left
                }
                Ordering::Greater => {
                    range.lower = Some(current.key);
                    Side::Right
                }
            };

            match current.child(side) {
                Some(child) => current = self.node(child)?,
                None => return self.graft(&mut current, side, donor_node, range, pending),
            }
        }
    }

    /// Merge a donor node into the existing node with the same key.
    fn absorb(
        &mut self,
        current: &mut TreeNode,
        donor: &TreeNode,
        pending: &mut Vec<Location>,
    ) -> Result<(), TreeError> {
        current.value = donor.value;
        current.save(self.storage)?;
        self.free_list.free_location(self.storage, donor.location)?;
        tracing::trace!(
            "merged duplicate key {} from {} into {}",
            donor.key,
            donor.location,
            current.location
        );

        push_children(pending, donor);
        Ok(())
    }

    /// Link a donor under an empty child link of `parent`.
    fn graft(
        &mut self,
        parent: &mut TreeNode,
        side: Side,
        donor: TreeNode,
        range: KeyRange,
        pending: &mut Vec<Location>,
    ) -> Result<(), TreeError> {
        let (min, max) = self.key_span(&donor)?;

        if range.contains(min) && range.contains(max) {
            parent.set_child(side, Some(donor.location));
            parent.save(self.storage)?;
            return Ok(());
        }

        // The donor's subtree straddles keys already in the tree. Hang the
        // donor alone and re-home its children from the top.
        let mut detached = donor;
        detached.left = None;
        detached.right = None;
        detached.save(self.storage)?;
        parent.set_child(side, Some(donor.location));
        parent.save(self.storage)?;
        tracing::trace!(
            "detached key {} at {} to keep order",
            donor.key,
            donor.location
        );

        push_children(pending, &donor);
        Ok(())
    }

    /// Smallest and largest key in the subtree rooted at `node`.
    fn key_span(&mut self, node: &TreeNode) -> Result<(Key, Key), TreeError> {
        let mut min = *node;
        while let Some(left) = min.left {
            min = self.node(left)?;
        }
        let mut max = *node;
        while let Some(right) = max.right {
            max = self.node(right)?;
        }
        Ok((min.key, max.key))
    }

    /// All occupied nodes in ascending key order.
    ///
    /// Fails with `Cycle` if a link leads back to a node already visited.
    pub fn in_order(&mut self) -> Result<Vec<TreeNode>, TreeError> {
        let root = self.root()?;
        if !root.is_valid() {
            return Ok(Vec::new());
        }

        let total_slots = self.storage.size_in_records()?;
        let mut result = Vec::new();
        let mut stack = Vec::new();
        let mut next = Some(root);
        let mut visited: u64 = 0;

        loop {
            while let Some(node) = next {
                visited += 1;
                if visited > total_slots {
                    return Err(TreeError::Cycle {
                        location: node.location,
                    });
                }
                next = match node.left {
                    Some(left) => Some(self.node(left)?),
                    None => None,
                };
                stack.push(node);
            }

            let Some(node) = stack.pop() else {
                return Ok(result);
            };
            next = match node.right {
                Some(right) => Some(self.node(right)?),
                None => None,
            };
            result.push(node);
        }
    }
}

/// Queue the children of `node` so the left one is placed first.
fn push_children(pending: &mut Vec<Location>, node: &TreeNode) {
    pending.extend([node.right, node.left].into_iter().flatten());
}

/// Errors that can occur during tree operations.
#[derive(Debug)]
pub enum TreeError {
    /// Storage error.
    Storage(StorageError),
    /// Free-list error.
    FreeList(FreeListError),
    /// A node cannot be formatted at this location.
    InvalidLocation(Location),
    /// The key is not in the tree.
    KeyNotFound(Key),
    /// The record at a linked location is not a tree node.
    NotATreeNode { location: Location, found: RecordKind },
    /// The record at `location` claims to live somewhere else.
    LocationMismatch { location: Location, recorded: Location },
    /// The record at `TREE_ROOT` is not flagged as the root.
    InvalidRoot,
    /// Child links loop back on themselves.
    Cycle { location: Location },
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::FreeList(e) => write!(f, "free list error: {e}"),
            Self::InvalidLocation(location) => {
                write!(f, "cannot initialize a tree node at location {location}")
            }
            Self::KeyNotFound(key) => write!(f, "key {key} not found"),
            Self::NotATreeNode { location, found } => {
                write!(f, "expected tree node at location {location}, found {found:?}")
            }
            Self::LocationMismatch { location, recorded } => write!(
                f,
                "record at location {location} claims location {recorded}"
            ),
            Self::InvalidRoot => write!(f, "record at location {TREE_ROOT} is not a tree root"),
            Self::Cycle { location } => write!(f, "tree links loop through location {location}"),
        }
    }
}

impl std::error::Error for TreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::FreeList(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for TreeError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<FreeListError> for TreeError {
    fn from(e: FreeListError) -> Self {
        Self::FreeList(e)
    }
}
