//! Main simulator harness for deterministic simulation testing.
//!
//! This module ties together all the simulation components: a workload of
//! random operations runs against an index on simulated storage, and every
//! step is checked against a model.

use super::invariants::{InvariantChecker, InvariantViolation, OperationHistory, Outcome};
use super::storage::{FaultConfig, SimulatedStorage};
use super::workload::{Operation, OperationGenerator, WorkloadConfig};
use crate::storage::{Index, IndexError};

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Fault injection configuration.
    pub fault_config: FaultConfig,
    /// Operation generation configuration.
    pub workload: WorkloadConfig,
    /// Run the full structural check every this many operations.
    /// Contents are compared after every operation regardless.
    pub verify_every: usize,
}

impl SimulatorConfig {
    /// Create a new simulator config with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            fault_config: FaultConfig::default(),
            workload: WorkloadConfig::default(),
            verify_every: 1,
        }
    }

    /// Set the fault configuration.
    #[must_use]
    pub const fn with_fault_config(mut self, config: FaultConfig) -> Self {
        self.fault_config = config;
        self
    }

    /// Set the workload configuration.
    #[must_use]
    pub const fn with_workload(mut self, config: WorkloadConfig) -> Self {
        self.workload = config;
        self
    }

    /// Set the key space of the workload.
    #[must_use]
    pub const fn with_key_space(mut self, key_space: i64) -> Self {
        self.workload.key_space = key_space;
        self
    }

    /// Run the structural check only every `interval` operations.
    #[must_use]
    pub const fn with_verify_every(mut self, interval: usize) -> Self {
        self.verify_every = interval;
        self
    }
}

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The seed used for this simulation.
    pub seed: u64,
    /// Number of operations processed.
    pub operations_processed: u64,
    /// Keys left in the index at the end.
    pub final_keys: usize,
    /// Invariant violations detected.
    pub invariant_violations: Vec<InvariantViolation>,
    /// Whether the run went through all operations.
    pub completed_successfully: bool,
    /// Error that stopped the run early.
    pub error: Option<String>,
}

impl SimulationResult {
    /// Check if the simulation passed (no invariant violations).
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.completed_successfully && self.invariant_violations.is_empty()
    }
}

/// The main simulator harness.
pub struct Simulator {
    config: SimulatorConfig,
    generator: OperationGenerator,
    history: OperationHistory,
    checker: InvariantChecker,
    operations_processed: u64,
}

impl Simulator {
    /// Create a new simulator with the given configuration.
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let generator = OperationGenerator::with_config(config.seed, config.workload.clone());

        Self {
            config,
            generator,
            history: OperationHistory::new(),
            checker: InvariantChecker::new(),
            operations_processed: 0,
        }
    }

    /// Run the simulation for a given number of operations.
    ///
    /// This creates a fresh index on simulated storage and checks invariants
    /// after each operation. A storage fault stops the run: writes of a
    /// multi-slot operation are not rolled back, so the model no longer
    /// describes the file.
    pub fn run(&mut self, operation_count: usize) -> SimulationResult {
        let storage =
            SimulatedStorage::with_config(self.config.seed, self.config.fault_config.clone());

        let error = match Index::with_storage(storage) {
            Ok(mut index) => self.run_with_index(&mut index, operation_count).err(),
            Err(e) => Some(e),
        };

        if let Some(e) = &error {
            tracing::debug!(
                "simulation with seed {} stopped after {} operations: {e}",
                self.config.seed,
                self.operations_processed
            );
        }

        SimulationResult {
            seed: self.config.seed,
            operations_processed: self.operations_processed,
            final_keys: self.history.expected_state().len(),
            invariant_violations: self.checker.violations().to_vec(),
            completed_successfully: error.is_none(),
            error: error.map(|e| e.to_string()),
        }
    }

    fn run_with_index(
        &mut self,
        index: &mut Index<SimulatedStorage>,
        operation_count: usize,
    ) -> Result<(), IndexError> {
        let verify_every = self.config.verify_every.max(1);

        for _ in 0..operation_count {
            let operation = self.generator.next_operation();
            let operation_index = self.history.len();

            let actual = execute(index, operation)?;
            self.operations_processed += 1;
            let expected = self.history.apply(operation);

            self.checker
                .check_outcome(&operation, expected, actual, operation_index);
            self.checker
                .check_contents(index, self.history.expected_state(), operation_index)?;
            if (operation_index + 1) % verify_every == 0 {
                self.checker.check_structure(index, operation_index)?;
            }
        }

        // Always finish on a full check.
        self.checker.check_structure(index, self.history.len())?;
        Ok(())
    }

    /// Get the operation history.
    #[must_use]
    pub const fn history(&self) -> &OperationHistory {
        &self.history
    }

    /// Get the invariant checker.
    #[must_use]
    pub const fn checker(&self) -> &InvariantChecker {
        &self.checker
    }
}

/// Run one operation against the index.
fn execute(index: &mut Index<SimulatedStorage>, operation: Operation) -> Result<Outcome, IndexError> {
    match operation {
        Operation::Insert { key, value } => Ok(Outcome::Previous(index.insert(key, value)?)),
        Operation::Remove { key } => match index.remove(key) {
            Ok(value) => Ok(Outcome::Removed(Some(value))),
            Err(IndexError::KeyNotFound(_)) => Ok(Outcome::Removed(None)),
            Err(e) => Err(e),
        },
        Operation::Lookup { key } => Ok(Outcome::Found(index.lookup(key)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulator_basic() {
        let config = SimulatorConfig::new(12345);
        let mut simulator = Simulator::new(config);

        let result = simulator.run(300);

        assert!(
            result.passed(),
            "Simulation should pass: {:?} {:?}",
            result.error,
            result.invariant_violations
        );
        assert_eq!(result.operations_processed, 300);
        assert_eq!(simulator.history().len(), 300);
    }

    #[test]
    fn test_simulator_exercises_all_paths() {
        let mut simulator = Simulator::new(SimulatorConfig::new(777).with_key_space(16));
        let result = simulator.run(500);
        assert!(result.passed(), "{:?}", result.invariant_violations);

        let stats = simulator.history().stats();
        assert!(stats.inserts > 0);
        assert!(stats.updates > 0);
        assert!(stats.removes > 0);
        assert!(stats.missed_removes > 0);
        assert!(stats.lookups > 0);
    }

    #[test]
    fn test_simulator_deterministic() {
        // Same seed should produce same results
        let result1 = Simulator::new(SimulatorConfig::new(12345)).run(200);
        let result2 = Simulator::new(SimulatorConfig::new(12345)).run(200);

        assert_eq!(result1.operations_processed, result2.operations_processed);
        assert_eq!(result1.final_keys, result2.final_keys);
    }

    #[test]
    fn test_simulator_many_seeds() {
        for seed in 0..20 {
            let config = SimulatorConfig::new(seed).with_key_space(24);
            let result = Simulator::new(config).run(250);
            assert!(
                result.passed(),
                "seed {seed} failed: {:?} {:?}",
                result.error,
                result.invariant_violations
            );
        }
    }

    #[test]
    fn test_simulator_stops_on_fault() {
        let config = SimulatorConfig::new(4242).with_fault_config(FaultConfig::high_faults());
        let result = Simulator::new(config).run(1_000);

        // Faults end the run early.
        assert!(!result.completed_successfully);
        assert!(result.operations_processed < 1_000);
        assert!(result.error.is_some());
    }

    #[test]
    #[ignore] // Long running test
    fn test_simulator_stress() {
        let config = SimulatorConfig::new(99999)
            .with_key_space(512)
            .with_verify_every(50);
        let mut simulator = Simulator::new(config);

        let result = simulator.run(20_000);

        assert!(result.passed(), "{:?}", result.invariant_violations);
    }
}
