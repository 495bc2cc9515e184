//! Index file I/O operations.
//!
//! This module handles reading and writing record slots to the index file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::storage::io::{Storage, StorageError};
use crate::storage::record::{Location, Record, SLOT_SIZE, SLOT_SIZE_U64};

/// An index file handle with slot-level record I/O.
///
/// Writes go straight to the file. With `sync_writes` set, every write is
/// followed by `sync_data`.
pub struct IndexFile {
    file: Option<File>,
    path: PathBuf,
    sync_writes: bool,
}

impl IndexFile {
    /// Open the file at `path`, creating it empty if it does not exist.
    pub fn open(path: &Path, sync_writes: bool) -> Result<Self, StorageError> {
        let existed = path.exists();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if existed {
            tracing::debug!("opened index file {}", path.display());
        } else {
            tracing::info!("created index file {}", path.display());
        }

        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            sync_writes,
        })
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Flush and release the file handle.
    ///
    /// Any further operation fails with `StorageError::FileNotOpen`.
    pub fn close(&mut self) -> Result<(), StorageError> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
            tracing::debug!("closed index file {}", self.path.display());
        }
        Ok(())
    }

    fn file(&self) -> Result<&File, StorageError> {
        self.file.as_ref().ok_or(StorageError::FileNotOpen)
    }

    fn file_mut(&mut self) -> Result<&mut File, StorageError> {
        self.file.as_mut().ok_or(StorageError::FileNotOpen)
    }

    /// Byte offset of `location`, if it fits in a file offset.
    fn offset_of(&self, location: Location) -> Result<u64, StorageError> {
        match location.checked_mul(SLOT_SIZE_U64) {
            Some(offset) => Ok(offset),
            None => Err(StorageError::LocationOutOfBounds {
                location,
                total_slots: self.size_in_records()?,
            }),
        }
    }

    /// Read the raw bytes of one slot.
    pub fn read_slot(&mut self, location: Location) -> Result<[u8; SLOT_SIZE], StorageError> {
        let total_slots = self.size_in_records()?;
        if location >= total_slots {
            return Err(StorageError::LocationOutOfBounds {
                location,
                total_slots,
            });
        }

        let offset = self.offset_of(location)?;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))?;

        let mut buf = [0u8; SLOT_SIZE];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Write the raw bytes of one slot, growing the file if needed.
    pub fn write_slot(
        &mut self,
        location: Location,
        bytes: &[u8; SLOT_SIZE],
    ) -> Result<(), StorageError> {
        let sync_writes = self.sync_writes;
        let offset = self.offset_of(location)?;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;

        if sync_writes {
            file.sync_data()?;
        }

        Ok(())
    }
}

impl Storage for IndexFile {
    fn read_record(&mut self, location: Location) -> Result<Record, StorageError> {
        let buf = self.read_slot(location)?;
        Record::from_bytes(&buf).map_err(|source| StorageError::Record { location, source })
    }

    fn write_record(&mut self, location: Location, record: &Record) -> Result<(), StorageError> {
        self.write_slot(location, &record.to_bytes())
    }

    fn size_in_records(&self) -> Result<u64, StorageError> {
        let len = self.file()?.metadata()?.len();
        Ok(len / SLOT_SIZE_U64)
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        self.file()?.sync_all()?;
        Ok(())
    }
}

impl Drop for IndexFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("failed to close index file {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::bst::TreeNode;
    use crate::storage::freelist::FreeListNode;
    use std::fs;
    use tempfile::tempdir;

    fn leaf(location: Location, key: i64, value: i64) -> Record {
        Record::Tree(TreeNode::occupied(location, key, value, None, None))
    }

    #[test]
    fn test_open_creates_empty_file() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.idx");

        let file = IndexFile::open(&path, true).expect("open");
        assert!(path.exists());
        assert_eq!(file.size_in_records().expect("size"), 0);
        assert_eq!(fs::metadata(&path).expect("metadata").len(), 0);
    }

    #[test]
    fn test_write_and_read_record() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.idx");
        let mut file = IndexFile::open(&path, true).expect("open");

        let head = Record::Free(FreeListNode {
            location: 0,
            next: None,
        });
        file.write_record(0, &head).expect("write head");
        file.write_record(1, &leaf(1, 5, 50)).expect("write node");

        assert_eq!(file.size_in_records().expect("size"), 2);
        assert_eq!(file.read_record(0).expect("read head"), head);
        assert_eq!(file.read_record(1).expect("read node"), leaf(1, 5, 50));
    }

    #[test]
    fn test_write_past_end_grows_file() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.idx");
        let mut file = IndexFile::open(&path, false).expect("open");

        file.write_record(4, &leaf(4, 1, 1)).expect("write");

        assert_eq!(file.size_in_records().expect("size"), 5);
        assert_eq!(
            fs::metadata(&path).expect("metadata").len(),
            5 * SLOT_SIZE_U64
        );

        // The hole reads back as zeroes, which is not a valid record.
        assert!(matches!(
            file.read_record(2),
            Err(StorageError::Record { location: 2, .. })
        ));
    }

    #[test]
    fn test_read_out_of_bounds() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.idx");
        let mut file = IndexFile::open(&path, true).expect("open");

        let result = file.read_record(3);
        assert!(matches!(
            result,
            Err(StorageError::LocationOutOfBounds {
                location: 3,
                total_slots: 0
            })
        ));
    }

    #[test]
    fn test_location_past_addressable_range() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.idx");
        let mut file = IndexFile::open(&path, false).expect("open");
        let location = u64::MAX / SLOT_SIZE_U64 + 1;

        assert!(matches!(
            file.write_record(location, &leaf(location, 1, 1)),
            Err(StorageError::LocationOutOfBounds { location: l, total_slots: 0 }) if l == location
        ));
        assert!(matches!(
            file.read_record(location),
            Err(StorageError::LocationOutOfBounds { .. })
        ));
        assert_eq!(file.size_in_records().expect("size"), 0);
    }

    #[test]
    fn test_closed_file_rejects_operations() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.idx");
        let mut file = IndexFile::open(&path, true).expect("open");

        file.close().expect("close");
        assert!(!file.is_open());

        assert!(matches!(file.read_record(0), Err(StorageError::FileNotOpen)));
        assert!(matches!(
            file.write_record(0, &leaf(0, 1, 1)),
            Err(StorageError::FileNotOpen)
        ));
        assert!(matches!(file.size_in_records(), Err(StorageError::FileNotOpen)));

        // Closing twice is harmless.
        file.close().expect("close again");
    }

    #[test]
    fn test_record_persistence() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.idx");

        {
            let mut file = IndexFile::open(&path, true).expect("open");
            file.write_record(2, &leaf(2, -9, 900)).expect("write");
        }

        {
            let mut file = IndexFile::open(&path, true).expect("reopen");
            assert_eq!(file.size_in_records().expect("size"), 3);
            assert_eq!(file.read_record(2).expect("read"), leaf(2, -9, 900));
        }
    }

    #[test]
    fn test_partial_trailing_slot_is_not_counted() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.idx");
        fs::write(&path, [0u8; SLOT_SIZE + 10]).expect("write raw file");

        let file = IndexFile::open(&path, true).expect("open");
        assert_eq!(file.size_in_records().expect("size"), 1);
    }
}
