//! Structural verification of an index file.
//!
//! Walks the free list and the tree independently and checks that together
//! they account for every slot exactly once, that search order holds at
//! every node, and that every record sits where it says it does.

use crate::storage::io::{Storage, StorageError};
use crate::storage::record::{FREE_LIST_HEAD, Key, Location, Record, RecordKind, TREE_ROOT};

/// A single broken invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A slot could not be read or decoded.
    Unreadable { location: Location, error: String },
    /// A link points past the end of the file.
    DanglingLink { from: Location, to: Location },
    /// A record's stored location differs from where it was found.
    Misplaced { location: Location, recorded: Location },
    /// Wrong record kind for its position.
    WrongKind {
        location: Location,
        expected: RecordKind,
        found: RecordKind,
    },
    /// Root flag set anywhere but `TREE_ROOT`, or missing there.
    RootFlag { location: Location },
    /// A key falls outside the interval its position allows.
    OutOfOrder {
        location: Location,
        key: Key,
        lower: Option<Key>,
        upper: Option<Key>,
    },
    /// A slot is reachable twice (from the tree, the free list, or both).
    SharedSlot { location: Location },
    /// A non-reserved slot is reachable from neither the tree nor the free list.
    Leaked { location: Location },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreadable { location, error } => {
                write!(f, "slot {location} is unreadable: {error}")
            }
            Self::DanglingLink { from, to } => {
                write!(f, "slot {from} links to {to}, past the end of the file")
            }
            Self::Misplaced { location, recorded } => {
                write!(f, "slot {location} claims to be at {recorded}")
            }
            Self::WrongKind {
                location,
                expected,
                found,
            } => write!(f, "slot {location} holds {found:?}, expected {expected:?}"),
            Self::RootFlag { location } => {
                write!(f, "slot {location} has a wrong root flag")
            }
            Self::OutOfOrder {
                location,
                key,
                lower,
                upper,
            } => write!(
                f,
                "key {key} at slot {location} is outside ({lower:?}, {upper:?})"
            ),
            Self::SharedSlot { location } => {
                write!(f, "slot {location} is reachable more than once")
            }
            Self::Leaked { location } => {
                write!(f, "slot {location} is neither in the tree nor free")
            }
        }
    }
}

/// Outcome of a verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Slots in the file, reserved ones included.
    pub total_slots: u64,
    /// Occupied tree nodes reached from the root.
    pub tree_nodes: usize,
    /// Slots reached from the free-list head.
    pub free_slots: usize,
    pub violations: Vec<Violation>,
}

impl VerifyReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Reserved,
    Tree,
    FreeList,
}

/// Verify the index stored in `storage`.
///
/// Only I/O failures are returned as errors; anything wrong with the
/// content is collected into the report.
// Slot counts are bounded by the file length; a file with more than
// usize::MAX slots cannot be addressed anyway.
#[allow(clippy::cast_possible_truncation)]
pub fn verify<S: Storage>(storage: &mut S) -> Result<VerifyReport, StorageError> {
    let total_slots = storage.size_in_records()?;
    let mut report = VerifyReport {
        total_slots,
        ..VerifyReport::default()
    };
    if total_slots <= TREE_ROOT {
        report.violations.push(Violation::Unreadable {
            location: total_slots,
            error: "file is missing its reserved slots".to_string(),
        });
        return Ok(report);
    }

    let mut owners: Vec<Option<Owner>> = vec![None; total_slots as usize];
    owners[FREE_LIST_HEAD as usize] = Some(Owner::Reserved);
    owners[TREE_ROOT as usize] = Some(Owner::Reserved);

    check_free_list(storage, &mut owners, &mut report)?;
    check_tree(storage, &mut owners, &mut report)?;

    for (location, owner) in owners.iter().enumerate() {
        if owner.is_none() {
            report.violations.push(Violation::Leaked {
                location: location as Location,
            });
        }
    }

    Ok(report)
}

/// Read a record, turning content errors into violations.
fn read<S: Storage>(
    storage: &mut S,
    location: Location,
    report: &mut VerifyReport,
) -> Result<Option<Record>, StorageError> {
    match storage.read_record(location) {
        Ok(record) => {
            if record.location() != location {
                report.violations.push(Violation::Misplaced {
                    location,
                    recorded: record.location(),
                });
            }
            Ok(Some(record))
        }
        Err(e @ StorageError::Record { .. }) => {
            report.violations.push(Violation::Unreadable {
                location,
                error: e.to_string(),
            });
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Claim `to` for `owner`, reporting links that dangle or revisit a slot.
#[allow(clippy::cast_possible_truncation)]
fn claim(
    owners: &mut [Option<Owner>],
    from: Location,
    to: Location,
    owner: Owner,
    report: &mut VerifyReport,
) -> bool {
    match owners.get_mut(to as usize) {
        None => {
            report.violations.push(Violation::DanglingLink { from, to });
            false
        }
        Some(Some(_)) => {
            report.violations.push(Violation::SharedSlot { location: to });
            false
        }
        Some(slot) => {
            *slot = Some(owner);
            true
        }
    }
}

fn check_free_list<S: Storage>(
    storage: &mut S,
    owners: &mut [Option<Owner>],
    report: &mut VerifyReport,
) -> Result<(), StorageError> {
    let mut current = FREE_LIST_HEAD;

    loop {
        let next = match read(storage, current, report)? {
            Some(Record::Free(node)) => node.next,
            Some(other) => {
                report.violations.push(Violation::WrongKind {
                    location: current,
                    expected: RecordKind::Free,
                    found: other.kind(),
                });
                return Ok(());
            }
            None => return Ok(()),
        };

        let Some(next) = next else {
            return Ok(());
        };
        if !claim(owners, current, next, Owner::FreeList, report) {
            return Ok(());
        }
        report.free_slots += 1;
        current = next;
    }
}

fn check_tree<S: Storage>(
    storage: &mut S,
    owners: &mut [Option<Owner>],
    report: &mut VerifyReport,
) -> Result<(), StorageError> {
    // (location, exclusive lower bound, exclusive upper bound)
    let mut stack: Vec<(Location, Option<Key>, Option<Key>)> = vec![(TREE_ROOT, None, None)];

    while let Some((location, lower, upper)) = stack.pop() {
        let node = match read(storage, location, report)? {
            Some(Record::Tree(node)) => node,
            Some(other) => {
                report.violations.push(Violation::WrongKind {
                    location,
                    expected: RecordKind::Occupied,
                    found: other.kind(),
                });
                continue;
            }
            None => continue,
        };

        if node.is_root != (location == TREE_ROOT) {
            report.violations.push(Violation::RootFlag { location });
        }

        if !node.is_valid() {
            if location != TREE_ROOT {
                report.violations.push(Violation::WrongKind {
                    location,
                    expected: RecordKind::Occupied,
                    found: RecordKind::Invalid,
                });
            }
            // An emptied root's links are meaningless.
            continue;
        }
        report.tree_nodes += 1;

        let in_range =
            lower.is_none_or(|lower| node.key > lower) && upper.is_none_or(|upper| node.key < upper);
        if !in_range {
            report.violations.push(Violation::OutOfOrder {
                location,
                key: node.key,
                lower,
                upper,
            });
        }

        if let Some(right) = node.right {
            if claim(owners, location, right, Owner::Tree, report) {
                stack.push((right, Some(node.key), upper));
            }
        }
        if let Some(left) = node.left {
            if claim(owners, location, left, Owner::Tree, report) {
                stack.push((left, lower, Some(node.key)));
            }
        }
    }

    Ok(())
}
