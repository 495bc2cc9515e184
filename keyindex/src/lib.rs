// Life of an operation:
// 1. The caller hands a key (and value) to `Index`
// 2. The tree walks from the root slot, reading one record per step
// 3. Changed nodes are written back to their own slots
// 4. New nodes take a slot from the free list, or grow the file by one
//    slot; deleted nodes hand their slot back to the free list
//
// System components:
//  - Slot I/O over the index file (storage::file, storage::record)
//  - Free-list allocator threaded through the file (storage::freelist)
//  - Unbalanced binary search tree by slot location (storage::bst)

pub mod config;
pub mod simulation;
pub mod storage;

mod e2e_tests;
