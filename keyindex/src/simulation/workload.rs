//! Operation generator for deterministic simulation testing.
//!
//! This module generates random but reproducible sequences of index
//! operations. Keys are drawn from a small pool so that updates, deletes of
//! present keys and deletes of interior nodes with two children all happen
//! often.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::storage::{Key, Value};

/// Configuration for operation generation.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Keys are drawn from `-key_space..key_space`.
    pub key_space: Key,
    /// Probability of an insert (0.0 - 1.0).
    pub insert_rate: f64,
    /// Probability of a remove (0.0 - 1.0). The rest are lookups.
    pub remove_rate: f64,
    /// Probability that a remove targets a key known to be absent.
    pub missing_key_rate: f64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            key_space: 64,
            insert_rate: 0.5,
            remove_rate: 0.3,
            missing_key_rate: 0.05,
        }
    }
}

/// A single index operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert { key: Key, value: Value },
    Remove { key: Key },
    Lookup { key: Key },
}

impl Operation {
    #[must_use]
    pub const fn key(&self) -> Key {
        match self {
            Self::Insert { key, .. } | Self::Remove { key } | Self::Lookup { key } => *key,
        }
    }
}

/// Generator for random `Operation` instances.
///
/// This generator produces deterministic sequences of operations
/// given the same seed, enabling reproducible testing.
pub struct OperationGenerator {
    rng: StdRng,
    config: WorkloadConfig,
}

impl OperationGenerator {
    /// Create a new operation generator with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, WorkloadConfig::default())
    }

    /// Create a new operation generator with custom configuration.
    #[must_use]
    pub fn with_config(seed: u64, config: WorkloadConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    fn random_key(&mut self) -> Key {
        let space = self.config.key_space.max(1);
        self.rng.random_range(-space..space)
    }

    /// Generate the next operation.
    pub fn next_operation(&mut self) -> Operation {
        let roll = self.rng.random::<f64>();

        if roll < self.config.insert_rate {
            let key = self.random_key();
            let value = self.rng.random::<Value>();
            return Operation::Insert { key, value };
        }

        if roll < self.config.insert_rate + self.config.remove_rate {
            let key = if self.rng.random::<f64>() < self.config.missing_key_rate {
                // Outside the pool, never inserted.
                self.config.key_space.max(1) + self.rng.random_range(0..1000)
            } else {
                self.random_key()
            };
            return Operation::Remove { key };
        }

        Operation::Lookup {
            key: self.random_key(),
        }
    }

    /// Generate `count` operations.
    pub fn operations(&mut self, count: usize) -> Vec<Operation> {
        (0..count).map(|_| self.next_operation()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_deterministic() {
        let mut gen1 = OperationGenerator::new(12345);
        let mut gen2 = OperationGenerator::new(12345);

        assert_eq!(gen1.operations(100), gen2.operations(100));
    }

    #[test]
    fn test_keys_stay_in_pool() {
        let mut generator = OperationGenerator::with_config(
            7,
            WorkloadConfig {
                missing_key_rate: 0.0,
                ..WorkloadConfig::default()
            },
        );

        for operation in generator.operations(500) {
            assert!((-64..64).contains(&operation.key()), "{operation:?}");
        }
    }

    #[test]
    fn test_mix_covers_all_operations() {
        let mut generator = OperationGenerator::new(3);
        let operations = generator.operations(500);

        assert!(operations.iter().any(|op| matches!(op, Operation::Insert { .. })));
        assert!(operations.iter().any(|op| matches!(op, Operation::Remove { .. })));
        assert!(operations.iter().any(|op| matches!(op, Operation::Lookup { .. })));
    }

    #[test]
    fn test_inserts_only() {
        let mut generator = OperationGenerator::with_config(
            9,
            WorkloadConfig {
                insert_rate: 1.0,
                remove_rate: 0.0,
                ..WorkloadConfig::default()
            },
        );

        assert!(
            generator
                .operations(50)
                .iter()
                .all(|op| matches!(op, Operation::Insert { .. }))
        );
    }
}
