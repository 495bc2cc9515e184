//! Storage abstraction over slot-addressed record I/O.
//!
//! The free list and the tree are generic over `Storage`, so the same code
//! runs against the real index file in production and against simulated
//! in-memory storage in tests.

use crate::storage::record::{Location, Record, RecordError};

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error.
    Io(std::io::Error),
    /// The backing file has been closed.
    FileNotOpen,
    /// Read at or past the end of storage.
    LocationOutOfBounds { location: Location, total_slots: u64 },
    /// Slot bytes do not decode.
    Record { location: Location, source: RecordError },
    /// Injected fault for simulation.
    InjectedFault(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::FileNotOpen => write!(f, "index file is not open"),
            Self::LocationOutOfBounds {
                location,
                total_slots,
            } => write!(
                f,
                "location {location} out of bounds (total slots: {total_slots})"
            ),
            Self::Record { location, source } => {
                write!(f, "bad record at location {location}: {source}")
            }
            Self::InjectedFault(msg) => write!(f, "injected fault: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Record { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Abstraction over fixed-size record storage.
///
/// # Implementation Notes
///
/// Implementations must ensure:
/// - `read_record` returns the last record written at that location
/// - `write_record` past the end grows storage so that
///   `size_in_records() > location` afterwards
/// - `read_record` past the end fails with `LocationOutOfBounds`
pub trait Storage {
    /// Read and decode the record at `location`.
    fn read_record(&mut self, location: Location) -> Result<Record, StorageError>;

    /// Encode and write `record` at `location`.
    fn write_record(&mut self, location: Location, record: &Record) -> Result<(), StorageError>;

    /// Number of whole slots currently in storage.
    fn size_in_records(&self) -> Result<u64, StorageError>;

    /// Make all previous writes durable.
    fn sync(&mut self) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let e = StorageError::LocationOutOfBounds {
            location: 10,
            total_slots: 5,
        };
        assert!(e.to_string().contains("location 10"));
        assert!(e.to_string().contains("total slots: 5"));

        let e = StorageError::Record {
            location: 3,
            source: RecordError::InvalidKind(0),
        };
        assert_eq!(
            e.to_string(),
            "bad record at location 3: invalid record kind: 0x00"
        );

        assert_eq!(StorageError::FileNotOpen.to_string(), "index file is not open");
    }
}
