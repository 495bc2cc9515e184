//! Simulated in-memory storage for deterministic testing.
//!
//! This module provides an in-memory implementation of the `Storage` trait
//! with support for fault injection at various levels:
//! - Slot-level read/write errors
//! - Byte-level corruption (bit flips)
//! - Partial writes
//! - Sync failures

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::storage::{Location, Record, SLOT_SIZE, Storage, StorageError};

/// Configuration for fault injection.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    /// Probability of a read error (0.0 - 1.0).
    pub read_error_rate: f64,
    /// Probability of a write error (0.0 - 1.0).
    pub write_error_rate: f64,
    /// Probability of a sync error (0.0 - 1.0).
    pub sync_error_rate: f64,
    /// Probability of slot corruption on read (0.0 - 1.0).
    pub corruption_rate: f64,
    /// Probability of partial write (0.0 - 1.0).
    pub partial_write_rate: f64,
}

impl FaultConfig {
    /// Create a fault config with no faults (for baseline testing).
    #[must_use]
    pub fn no_faults() -> Self {
        Self::default()
    }

    /// Create a fault config with low fault rates (for stress testing).
    #[must_use]
    pub const fn low_faults() -> Self {
        Self {
            read_error_rate: 0.001,
            write_error_rate: 0.001,
            sync_error_rate: 0.001,
            corruption_rate: 0.001,
            partial_write_rate: 0.001,
        }
    }

    /// Create a fault config with high fault rates (for extreme testing).
    #[must_use]
    pub const fn high_faults() -> Self {
        Self {
            read_error_rate: 0.05,
            write_error_rate: 0.05,
            sync_error_rate: 0.05,
            corruption_rate: 0.05,
            partial_write_rate: 0.05,
        }
    }
}

/// In-memory storage implementation for deterministic testing.
///
/// Slots are kept as encoded bytes, so every read goes through the same
/// decoding and checksum verification as the file-backed store. A slot that
/// was never written reads back as zeroes, like a hole in a sparse file.
pub struct SimulatedStorage {
    /// Encoded slots that have been written.
    slots: HashMap<Location, [u8; SLOT_SIZE]>,
    /// One past the highest location written.
    total_slots: u64,

    /// Fault injection configuration.
    fault_config: FaultConfig,
    /// Random number generator for fault injection.
    rng: StdRng,

    /// Statistics for tracking.
    stats: SimulatedStorageStats,
}

/// Statistics about simulated storage operations.
#[derive(Debug, Default, Clone)]
pub struct SimulatedStorageStats {
    /// Number of record reads.
    pub reads: u64,
    /// Number of record writes.
    pub writes: u64,
    /// Number of syncs.
    pub syncs: u64,
    /// Number of injected read errors.
    pub injected_read_errors: u64,
    /// Number of injected write errors.
    pub injected_write_errors: u64,
    /// Number of injected sync errors.
    pub injected_sync_errors: u64,
    /// Number of corrupted slots returned.
    pub corrupted_reads: u64,
    /// Number of partial writes.
    pub partial_writes: u64,
}

impl SimulatedStorage {
    /// Create a new, empty simulated storage with the given seed.
    ///
    /// The seed ensures deterministic behavior - the same seed will
    /// produce the same sequence of faults.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, FaultConfig::default())
    }

    /// Create a new simulated storage with custom fault configuration.
    #[must_use]
    pub fn with_config(seed: u64, fault_config: FaultConfig) -> Self {
        Self {
            slots: HashMap::new(),
            total_slots: 0,
            fault_config,
            rng: StdRng::seed_from_u64(seed),
            stats: SimulatedStorageStats::default(),
        }
    }

    /// Get the current statistics.
    #[must_use]
    pub const fn stats(&self) -> &SimulatedStorageStats {
        &self.stats
    }

    /// Reset statistics.
    pub fn reset_stats(&mut self) {
        self.stats = SimulatedStorageStats::default();
    }

    /// Update the fault configuration.
    pub fn set_fault_config(&mut self, config: FaultConfig) {
        self.fault_config = config;
    }

    /// Raw bytes of a slot, zeroes if it was never written.
    #[must_use]
    pub fn raw_slot(&self, location: Location) -> [u8; SLOT_SIZE] {
        self.slots
            .get(&location)
            .copied()
            .unwrap_or([0u8; SLOT_SIZE])
    }

    /// Overwrite the raw bytes of a slot, bypassing encoding.
    pub fn write_raw_slot(&mut self, location: Location, bytes: [u8; SLOT_SIZE]) {
        self.slots.insert(location, bytes);
        self.total_slots = self.total_slots.max(location + 1);
    }

    /// Check if a fault should be injected based on the given rate.
    fn should_inject_fault(&mut self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        self.rng.random::<f64>() < rate
    }

    /// Corrupt a slot by flipping random bits.
    fn corrupt_slot(&mut self, bytes: &mut [u8; SLOT_SIZE]) {
        // Flip 1-8 random bits
        let num_flips = self.rng.random_range(1..=8);
        for _ in 0..num_flips {
            let byte_offset = self.rng.random_range(0..SLOT_SIZE);
            let bit = self.rng.random_range(0..8u8);
            bytes[byte_offset] ^= 1 << bit;
        }
    }

    /// Simulate a partial write by zeroing out the tail of the slot.
    fn make_partial_write(&mut self, bytes: &mut [u8; SLOT_SIZE]) {
        let cutoff = self.rng.random_range(0..SLOT_SIZE);
        for byte in bytes.iter_mut().skip(cutoff) {
            *byte = 0;
        }
    }
}

impl Storage for SimulatedStorage {
    fn read_record(&mut self, location: Location) -> Result<Record, StorageError> {
        self.stats.reads += 1;

        if location >= self.total_slots {
            return Err(StorageError::LocationOutOfBounds {
                location,
                total_slots: self.total_slots,
            });
        }

        // Check for injected read error
        if self.should_inject_fault(self.fault_config.read_error_rate) {
            self.stats.injected_read_errors += 1;
            return Err(StorageError::InjectedFault(
                "simulated read error".to_string(),
            ));
        }

        let mut bytes = self.raw_slot(location);

        // Check for corruption
        if self.should_inject_fault(self.fault_config.corruption_rate) {
            self.stats.corrupted_reads += 1;
            self.corrupt_slot(&mut bytes);
        }

        Record::from_bytes(&bytes).map_err(|source| StorageError::Record { location, source })
    }

    fn write_record(&mut self, location: Location, record: &Record) -> Result<(), StorageError> {
        self.stats.writes += 1;

        // Check for injected write error
        if self.should_inject_fault(self.fault_config.write_error_rate) {
            self.stats.injected_write_errors += 1;
            return Err(StorageError::InjectedFault(
                "simulated write error".to_string(),
            ));
        }

        let mut bytes = record.to_bytes();

        // Check for partial write
        if self.should_inject_fault(self.fault_config.partial_write_rate) {
            self.stats.partial_writes += 1;
            self.make_partial_write(&mut bytes);
        }

        self.write_raw_slot(location, bytes);
        Ok(())
    }

    fn size_in_records(&self) -> Result<u64, StorageError> {
        Ok(self.total_slots)
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        self.stats.syncs += 1;

        // Check for injected sync error
        if self.should_inject_fault(self.fault_config.sync_error_rate) {
            self.stats.injected_sync_errors += 1;
            return Err(StorageError::InjectedFault(
                "simulated sync error".to_string(),
            ));
        }

        // Writes are already "durable" in memory
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FreeListNode, TreeNode};

    fn leaf(location: Location) -> Record {
        Record::Tree(TreeNode::occupied(location, 7, 70, None, None))
    }

    #[test]
    fn test_simulated_storage_basic() {
        let mut storage = SimulatedStorage::new(12345);
        assert_eq!(storage.size_in_records().unwrap(), 0);

        let head = Record::Free(FreeListNode {
            location: 0,
            next: None,
        });
        storage.write_record(0, &head).unwrap();
        storage.write_record(1, &leaf(1)).unwrap();

        assert_eq!(storage.size_in_records().unwrap(), 2);
        assert_eq!(storage.read_record(0).unwrap(), head);
        assert_eq!(storage.read_record(1).unwrap(), leaf(1));
        assert_eq!(storage.stats().writes, 2);
        assert_eq!(storage.stats().reads, 2);
    }

    #[test]
    fn test_simulated_storage_sparse_growth() {
        let mut storage = SimulatedStorage::new(12345);
        storage.write_record(3, &leaf(3)).unwrap();

        assert_eq!(storage.size_in_records().unwrap(), 4);
        // The hole reads as zeroes, which do not decode.
        assert!(matches!(
            storage.read_record(1),
            Err(StorageError::Record { location: 1, .. })
        ));
    }

    #[test]
    fn test_simulated_storage_out_of_bounds() {
        let mut storage = SimulatedStorage::new(12345);

        let result = storage.read_record(100);
        assert!(matches!(
            result,
            Err(StorageError::LocationOutOfBounds {
                location: 100,
                total_slots: 0
            })
        ));
    }

    #[test]
    fn test_simulated_storage_fault_injection() {
        let config = FaultConfig {
            read_error_rate: 1.0, // Always fail
            ..Default::default()
        };
        let mut storage = SimulatedStorage::with_config(12345, config);
        storage.write_record(0, &leaf(0)).unwrap();

        let result = storage.read_record(0);
        assert!(matches!(result, Err(StorageError::InjectedFault(_))));
        assert_eq!(storage.stats().injected_read_errors, 1);
    }

    #[test]
    fn test_corruption_is_caught_by_checksum() {
        let config = FaultConfig {
            corruption_rate: 1.0,
            ..Default::default()
        };
        let mut storage = SimulatedStorage::with_config(99, config);
        storage.write_record(2, &leaf(2)).unwrap();

        // Flips can cancel out; anything that decodes must be the original.
        match storage.read_record(2) {
            Ok(record) => assert_eq!(record, leaf(2)),
            Err(e) => assert!(matches!(e, StorageError::Record { location: 2, .. })),
        }
        assert_eq!(storage.stats().corrupted_reads, 1);

        // The stored bytes are untouched.
        storage.set_fault_config(FaultConfig::no_faults());
        assert_eq!(storage.read_record(2).unwrap(), leaf(2));
    }

    #[test]
    fn test_simulated_storage_deterministic() {
        // Same seed should produce same behavior
        let config = FaultConfig {
            read_error_rate: 0.5,
            ..Default::default()
        };

        let run = |config: FaultConfig| {
            let mut storage = SimulatedStorage::with_config(12345, config);
            for location in 0..10 {
                storage.write_record(location, &leaf(location)).unwrap();
            }
            (0..10)
                .map(|location| storage.read_record(location).is_ok())
                .collect::<Vec<_>>()
        };

        assert_eq!(
            run(config.clone()),
            run(config),
            "Same seed should produce same fault pattern"
        );
    }
}
