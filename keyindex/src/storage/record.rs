//! Record slots: the fixed-size unit of the index file.
//!
//! Every slot holds one record. The same slot can hold either a free-list
//! node or a tree node; the leading kind byte decides which.
//!
//! Layout (little-endian):
//! - `kind`: 1 byte
//! - `flags`: 1 byte (bit 0 = tree root)
//! - `checksum`: 4 bytes (CRC32 over the slot with this field zeroed)
//! - `reserved`: 2 bytes
//! - `self_location`: 8 bytes
//! - body: 32 bytes, interpreted per kind
//!
//! Total: 48 bytes

// Locations are u64 in memory and i64 on disk (-1 = no link). A file would
// need 2^63 slots before the conversion wraps.
#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use crate::storage::bst::{NodeState, TreeNode};
use crate::storage::freelist::FreeListNode;

/// Slot size in bytes.
pub const SLOT_SIZE: usize = 48;

/// Slot size as u64 for offset calculations.
pub const SLOT_SIZE_U64: u64 = SLOT_SIZE as u64;

/// A slot identifier (0-indexed slot number).
pub type Location = u64;

/// Index key.
pub type Key = i64;

/// Location of the referenced record in the external data file.
pub type Value = i64;

/// Location of the free-list head record.
pub const FREE_LIST_HEAD: Location = 0;

/// Location of the tree root record.
pub const TREE_ROOT: Location = 1;

/// On-disk encoding of an absent link.
const NO_LINK: i64 = -1;

/// Record kind identifiers stored in the first byte of every slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// Reclaimed slot on the free list (or the free-list head).
    Free = 0x01,
    /// Live tree node.
    Occupied = 0x02,
    /// Emptied root placeholder.
    Invalid = 0x03,
}

impl TryFrom<u8> for RecordKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Free),
            0x02 => Ok(Self::Occupied),
            0x03 => Ok(Self::Invalid),
            _ => Err(value),
        }
    }
}

/// Header present at the start of every slot.
#[derive(Debug, Copy, Clone)]
pub struct RecordHeader {
    pub kind: RecordKind,
    pub flags: u8,
    pub checksum: u32,
}

impl RecordHeader {
    /// Size of the record header in bytes.
    pub const SIZE: usize = 8;

    /// Flag bit marking the tree root.
    pub const ROOT_FLAG: u8 = 0x01;

    /// Serialize the header to bytes.
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.kind as u8;
        buf[1] = self.flags;
        buf[2..6].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Deserialize a header from bytes.
    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Result<Self, RecordError> {
        let kind = RecordKind::try_from(bytes[0]).map_err(RecordError::InvalidKind)?;
        let flags = bytes[1];
        let checksum = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);

        Ok(Self {
            kind,
            flags,
            checksum,
        })
    }
}

/// Byte offsets of the fields after the header.
mod offset {
    pub const SELF_LOCATION: usize = 8;
    pub const NEXT: usize = 16;
    pub const KEY: usize = 16;
    pub const VALUE: usize = 24;
    pub const LEFT: usize = 32;
    pub const RIGHT: usize = 40;
}

/// One decoded slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Free(FreeListNode),
    Tree(TreeNode),
}

impl Record {
    /// The location this record claims to be stored at.
    #[must_use]
    pub const fn location(&self) -> Location {
        match self {
            Self::Free(node) => node.location,
            Self::Tree(node) => node.location,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Free(_) => RecordKind::Free,
            Self::Tree(node) => match node.state {
                NodeState::Occupied => RecordKind::Occupied,
                NodeState::Invalid => RecordKind::Invalid,
            },
        }
    }

    /// Encode the record into a full slot, checksum included.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SLOT_SIZE] {
        let mut buf = [0u8; SLOT_SIZE];
        let flags = match self {
            Self::Tree(node) if node.is_root => RecordHeader::ROOT_FLAG,
            _ => 0,
        };
        let header = RecordHeader {
            kind: self.kind(),
            flags,
            checksum: 0,
        };
        buf[..RecordHeader::SIZE].copy_from_slice(&header.to_bytes());
        write_i64(&mut buf, offset::SELF_LOCATION, self.location() as i64);

        match self {
            Self::Free(node) => {
                write_i64(&mut buf, offset::NEXT, encode_link(node.next));
            }
            Self::Tree(node) => {
                write_i64(&mut buf, offset::KEY, node.key);
                write_i64(&mut buf, offset::VALUE, node.value);
                write_i64(&mut buf, offset::LEFT, encode_link(node.left));
                write_i64(&mut buf, offset::RIGHT, encode_link(node.right));
            }
        }

        let checksum = compute_checksum(&buf);
        buf[2..6].copy_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Decode a slot, verifying its checksum.
    pub fn from_bytes(buf: &[u8; SLOT_SIZE]) -> Result<Self, RecordError> {
        let mut header_bytes = [0u8; RecordHeader::SIZE];
        header_bytes.copy_from_slice(&buf[..RecordHeader::SIZE]);
        let header = RecordHeader::from_bytes(header_bytes)?;

        let actual = compute_checksum(buf);
        if header.checksum != actual {
            return Err(RecordError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }

        let raw_location = read_i64(buf, offset::SELF_LOCATION);
        let location = decode_link(raw_location)?
            .ok_or(RecordError::InvalidLink(raw_location))?;

        let record = match header.kind {
            RecordKind::Free => Self::Free(FreeListNode {
                location,
                next: decode_link(read_i64(buf, offset::NEXT))?,
            }),
            RecordKind::Occupied | RecordKind::Invalid => Self::Tree(TreeNode {
                state: if header.kind == RecordKind::Occupied {
                    NodeState::Occupied
                } else {
                    NodeState::Invalid
                },
                location,
                is_root: header.flags & RecordHeader::ROOT_FLAG != 0,
                key: read_i64(buf, offset::KEY),
                value: read_i64(buf, offset::VALUE),
                left: decode_link(read_i64(buf, offset::LEFT))?,
                right: decode_link(read_i64(buf, offset::RIGHT))?,
            }),
        };

        Ok(record)
    }
}

/// CRC32 of the slot with the checksum field (bytes 2-5) zeroed.
#[must_use]
pub fn compute_checksum(buf: &[u8; SLOT_SIZE]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&buf[0..2]);
    hasher.update(&[0u8; 4]);
    hasher.update(&buf[6..]);
    hasher.finalize()
}

const fn encode_link(link: Option<Location>) -> i64 {
    match link {
        Some(location) => location as i64,
        None => NO_LINK,
    }
}

const fn decode_link(raw: i64) -> Result<Option<Location>, RecordError> {
    if raw == NO_LINK {
        Ok(None)
    } else if raw < 0 {
        Err(RecordError::InvalidLink(raw))
    } else {
        Ok(Some(raw as Location))
    }
}

fn read_i64(buf: &[u8; SLOT_SIZE], offset: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    i64::from_le_bytes(bytes)
}

fn write_i64(buf: &mut [u8; SLOT_SIZE], offset: usize, value: i64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// Errors raised while decoding a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Unknown kind byte (an all-zero slot reports 0x00).
    InvalidKind(u8),
    /// Checksum mismatch.
    ChecksumMismatch { expected: u32, actual: u32 },
    /// A location field holds a negative value other than -1.
    InvalidLink(i64),
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKind(v) => write!(f, "invalid record kind: 0x{v:02x}"),
            Self::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch: expected {expected}, got {actual}")
            }
            Self::InvalidLink(raw) => write!(f, "invalid location field: {raw}"),
        }
    }
}

impl std::error::Error for RecordError {}
