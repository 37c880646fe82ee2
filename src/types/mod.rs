//! Common types and file layout constants used throughout the store.

mod offset;

pub use offset::BlockOffset;

use std::fmt;

/// Size of the file header block at offset 0
pub const HEADER_SIZE: usize = 128;

/// Size of one encoded task record block
pub const RECORD_SIZE: usize = 424;

/// Size of one encoded index entry in the index region
pub const INDEX_ENTRY_SIZE: usize = 16;

/// Size of one encoded free-block entry in the free-list region
pub const FREE_ENTRY_SIZE: usize = 16;

/// Default number of slots in the index table and in the free list
pub const DEFAULT_CAPACITY: usize = 512;

/// Bytes reserved for the title, including the NUL terminator
pub const TITLE_CAPACITY: usize = 128;

/// Bytes reserved for the description, including the NUL terminator
pub const DESCRIPTION_CAPACITY: usize = 256;

/// Region boundaries of a database file.
///
/// ```text
/// Region       Offset                        Size
/// header       0                             HEADER_SIZE
/// index        HEADER_SIZE                   capacity * INDEX_ENTRY_SIZE
/// free list    end of index region           capacity * FREE_ENTRY_SIZE
/// data         end of free-list region       grows, RECORD_SIZE per block
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    capacity: usize,
}

impl Layout {
    /// Create a layout for tables with `capacity` slots
    pub const fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Number of slots in the index table and in the free list
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Start of the index region
    pub const fn index_offset(&self) -> u64 {
        HEADER_SIZE as u64
    }

    /// Start of the free-list region
    pub const fn free_list_offset(&self) -> u64 {
        self.index_offset() + (self.capacity * INDEX_ENTRY_SIZE) as u64
    }

    /// Start of the data region
    pub const fn data_start(&self) -> BlockOffset {
        BlockOffset::new(self.free_list_offset() + (self.capacity * FREE_ENTRY_SIZE) as u64)
    }

    /// File offset of free-list slot `slot`
    pub const fn free_slot(&self, slot: usize) -> u64 {
        self.free_list_offset() + (slot * FREE_ENTRY_SIZE) as u64
    }

    /// Check that `offset` falls on a block boundary of the data region
    pub fn is_block_aligned(&self, offset: BlockOffset) -> bool {
        let start = self.data_start().value();
        offset.value() >= start && (offset.value() - start) % RECORD_SIZE as u64 == 0
    }

    /// Check that `offset` is the start of a record block below `data_end`
    pub fn is_record_offset(&self, offset: BlockOffset, data_end: BlockOffset) -> bool {
        offset < data_end && self.is_block_aligned(offset)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Task priority, most urgent first
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    Urgent = 0,
    Important = 1,
    #[default]
    Medium = 2,
    Low = 3,
}

impl Priority {
    /// Convert from a stored value
    pub fn from_value(v: i64) -> Option<Self> {
        match v {
            0 => Some(Self::Urgent),
            1 => Some(Self::Important),
            2 => Some(Self::Medium),
            3 => Some(Self::Low),
            _ => None,
        }
    }

    /// Convert from a stored value, clamping unknown values to the default
    pub fn from_value_or_default(v: i64) -> Self {
        Self::from_value(v).unwrap_or_default()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Urgent => "URGENT",
            Self::Important => "IMPORTANT",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        };
        write!(f, "{} - {}", *self as u8, label)
    }
}

/// Task lifecycle status
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    Pending = 0,
    InProgress = 1,
    Done = 2,
    /// Soft-deleted (archived) but still stored
    Deleted = 3,
}

impl Status {
    /// Convert from a stored value
    pub fn from_value(v: i64) -> Option<Self> {
        match v {
            0 => Some(Self::Pending),
            1 => Some(Self::InProgress),
            2 => Some(Self::Done),
            3 => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Convert from a stored value, clamping unknown values to the default
    pub fn from_value_or_default(v: i64) -> Self {
        Self::from_value(v).unwrap_or_default()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN PROGRESS",
            Self::Done => "DONE",
            Self::Deleted => "DELETED (archived)",
        };
        f.write_str(label)
    }
}
