//! Invariant checking for deterministic simulation testing.
//!
//! This module provides infrastructure for verifying index invariants
//! after each operation, helping to detect bugs and data corruption. The
//! expected contents are tracked in a `BTreeMap` model that the index must
//! match exactly.

use std::collections::BTreeMap;

use crate::simulation::workload::Operation;
use crate::storage::{Index, IndexError, Key, Storage, TREE_ROOT, Value};

/// What an operation returned, or should have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Insert: the value the key held before.
    Previous(Option<Value>),
    /// Remove: the removed value, `None` for a missing key.
    Removed(Option<Value>),
    /// Lookup: the value found.
    Found(Option<Value>),
}

/// Tracks the history of operations and the expected index contents.
#[derive(Debug, Default)]
pub struct OperationHistory {
    /// All operations in order.
    operations: Vec<Operation>,
    /// What we expect to be in the index.
    expected_state: BTreeMap<Key, Value>,
    /// Inserts of new keys.
    inserts: u64,
    /// Inserts that overwrote an existing key.
    updates: u64,
    /// Removes of present keys.
    removes: u64,
    /// Removes of absent keys.
    missed_removes: u64,
    /// Lookups.
    lookups: u64,
}

impl OperationHistory {
    /// Create a new empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `operation` to the model and return what the index should
    /// report for it.
    pub fn apply(&mut self, operation: Operation) -> Outcome {
        self.operations.push(operation);

        match operation {
            Operation::Insert { key, value } => {
                let previous = self.expected_state.insert(key, value);
                if previous.is_some() {
                    self.updates += 1;
                } else {
                    self.inserts += 1;
                }
                Outcome::Previous(previous)
            }
            Operation::Remove { key } => {
                let removed = self.expected_state.remove(&key);
                if removed.is_some() {
                    self.removes += 1;
                } else {
                    self.missed_removes += 1;
                }
                Outcome::Removed(removed)
            }
            Operation::Lookup { key } => {
                self.lookups += 1;
                Outcome::Found(self.expected_state.get(&key).copied())
            }
        }
    }

    /// Get the number of operations.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if history is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Get statistics.
    #[must_use]
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            total_operations: self.operations.len(),
            inserts: self.inserts,
            updates: self.updates,
            removes: self.removes,
            missed_removes: self.missed_removes,
            lookups: self.lookups,
            live_keys: self.expected_state.len(),
        }
    }

    /// Get the expected state (for verification).
    #[must_use]
    pub const fn expected_state(&self) -> &BTreeMap<Key, Value> {
        &self.expected_state
    }
}

/// Statistics about the operation history.
#[derive(Debug, Clone)]
pub struct HistoryStats {
    /// Total number of operations.
    pub total_operations: usize,
    /// Number of inserts of new keys.
    pub inserts: u64,
    /// Number of inserts that overwrote a key.
    pub updates: u64,
    /// Number of removes of present keys.
    pub removes: u64,
    /// Number of removes of absent keys.
    pub missed_removes: u64,
    /// Number of lookups.
    pub lookups: u64,
    /// Number of keys in the expected state.
    pub live_keys: usize,
}

/// An invariant violation detected during simulation.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violation.
    pub description: String,
    /// Operation index where it was detected.
    pub operation_index: usize,
    /// Additional context.
    pub context: String,
}

/// Checker for index invariants.
pub struct InvariantChecker {
    /// Detected violations.
    violations: Vec<InvariantViolation>,
}

impl Default for InvariantChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantChecker {
    /// Create a new invariant checker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            violations: Vec::new(),
        }
    }

    /// Get all violations.
    #[must_use]
    pub fn violations(&self) -> &[InvariantViolation] {
        &self.violations
    }

    /// Check if any violations were detected.
    #[must_use]
    pub const fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Clear all recorded violations.
    pub fn clear(&mut self) {
        self.violations.clear();
    }

    /// Add a violation.
    pub fn add_violation(&mut self, violation: InvariantViolation) {
        self.violations.push(violation);
    }

    /// Check that an operation returned what the model predicted.
    pub fn check_outcome(
        &mut self,
        operation: &Operation,
        expected: Outcome,
        actual: Outcome,
        operation_index: usize,
    ) {
        if expected != actual {
            self.violations.push(InvariantViolation {
                description: "Operation result differs from model".to_string(),
                operation_index,
                context: format!("{operation:?}: expected {expected:?}, got {actual:?}"),
            });
        }
    }

    /// Check that the index holds exactly the model's entries, in order.
    pub fn check_contents<S: Storage>(
        &mut self,
        index: &mut Index<S>,
        expected: &BTreeMap<Key, Value>,
        operation_index: usize,
    ) -> Result<(), IndexError> {
        let entries = index.entries()?;
        let model: Vec<(Key, Value)> = expected.iter().map(|(k, v)| (*k, *v)).collect();

        if entries != model {
            self.violations.push(InvariantViolation {
                description: "Index contents differ from model".to_string(),
                operation_index,
                context: format!(
                    "index has {} entries, model has {}",
                    entries.len(),
                    model.len()
                ),
            });
        }
        Ok(())
    }

    /// Check the on-disk structure and that every slot is accounted for.
    ///
    /// Each slot is reserved, on the free list, or a tree node below the
    /// root; nothing else.
    pub fn check_structure<S: Storage>(
        &mut self,
        index: &mut Index<S>,
        operation_index: usize,
    ) -> Result<(), IndexError> {
        let report = index.verify()?;
        for violation in &report.violations {
            self.violations.push(InvariantViolation {
                description: "Structural verification failed".to_string(),
                operation_index,
                context: violation.to_string(),
            });
        }

        let stats = index.stats()?;
        let root_in_use = usize::from(!index.is_empty()?);
        let below_root = stats.live_nodes.saturating_sub(root_in_use);
        let accounted = TREE_ROOT + 1 + (below_root + stats.free_slots) as u64;
        if accounted != stats.total_slots {
            self.violations.push(InvariantViolation {
                description: "Slot accounting mismatch".to_string(),
                operation_index,
                context: format!(
                    "{} slots, {} live nodes, {} free",
                    stats.total_slots, stats.live_nodes, stats.free_slots
                ),
            });
        }
        Ok(())
    }
}
