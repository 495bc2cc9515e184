//! Deterministic Simulation Testing (DST) infrastructure.
//!
//! This module provides tools for testing the index with:
//! - In-memory storage with fault injection
//! - Reproducible random operation generation
//! - Invariant checking after each operation against a `BTreeMap` model
//!
//! # Design Principles
//!
//! 1. All I/O goes through `Storage` and can be simulated
//! 2. All randomness is seeded for reproducibility
//! 3. Faults can be injected at any I/O boundary
//! 4. Given the same seed, execution is identical
//!
//! # Usage
//!
//! ```
//! use keyindex::simulation::{Simulator, SimulatorConfig};
//!
//! let config = SimulatorConfig::new(12345).with_key_space(32);
//!
//! let mut sim = Simulator::new(config);
//! let result = sim.run(200); // Run 200 operations
//!
//! assert!(result.invariant_violations.is_empty());
//! ```

mod invariants;
mod simulator;
mod storage;
mod workload;

pub use invariants::{
    HistoryStats, InvariantChecker, InvariantViolation, OperationHistory, Outcome,
};
pub use simulator::{SimulationResult, Simulator, SimulatorConfig};
pub use storage::{FaultConfig, SimulatedStorage, SimulatedStorageStats};
pub use workload::{Operation, OperationGenerator, WorkloadConfig};
