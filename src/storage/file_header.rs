//! Database file header.
//!
//! The first `HEADER_SIZE` bytes of the database file hold the counters
//! and region geometry of the store.

use crate::error::{Result, StoreError};
use crate::types::{BlockOffset, Layout, HEADER_SIZE, RECORD_SIZE};

/// Magic bytes to identify a task store file
pub const MAGIC: &[u8; 8] = b"TASKSTOR";

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Database file header
///
/// Layout:
/// ```text
/// Offset  Size  Description
/// 0       8     Magic string "TASKSTOR"
/// 8       4     Format version
/// 12      4     Next record id to issue
/// 16      4     Active record count (valid index entries)
/// 20      4     Free block count (valid free-list entries)
/// 24      8     End offset of the data region
/// 32      4     Record size in bytes
/// 36      4     Index / free-list capacity
/// 40      4     Checksum of header (CRC32)
/// 44      84    Reserved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Format version
    pub version: u32,
    /// Next id handed out by an insertion
    pub next_id: u32,
    /// Number of valid entries in the index region
    pub active_count: u32,
    /// Number of valid entries in the free-list region
    pub free_count: u32,
    /// First byte past the last allocated record block
    pub data_end: BlockOffset,
    /// Number of slots in each of the index and free-list regions
    pub capacity: u32,
}

impl FileHeader {
    /// Create a new file header for an empty store
    pub fn new(layout: Layout) -> Self {
        Self {
            version: FORMAT_VERSION,
            next_id: 1,
            active_count: 0,
            free_count: 0,
            data_end: layout.data_start(),
            capacity: layout.capacity() as u32,
        }
    }

    /// Region geometry described by this header
    pub fn layout(&self) -> Layout {
        Layout::new(self.capacity as usize)
    }

    /// Read a file header from bytes
    pub fn read(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(StoreError::invalid_db("header too short"));
        }

        if &bytes[0..8] != MAGIC {
            return Err(StoreError::invalid_db("invalid magic bytes"));
        }

        let version = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let next_id = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        let active_count = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        let free_count = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
        let mut data_end = [0u8; 8];
        data_end.copy_from_slice(&bytes[24..32]);
        let record_size = u32::from_be_bytes([bytes[32], bytes[33], bytes[34], bytes[35]]);
        let capacity = u32::from_be_bytes([bytes[36], bytes[37], bytes[38], bytes[39]]);

        // Verify checksum
        let stored_checksum = u32::from_be_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]);
        let computed_checksum = crc32fast::hash(&bytes[0..40]);
        if stored_checksum != computed_checksum {
            return Err(StoreError::corruption("header checksum mismatch"));
        }

        if version != FORMAT_VERSION {
            return Err(StoreError::invalid_db(format!(
                "unsupported format version: {} (expected {})",
                version, FORMAT_VERSION
            )));
        }

        if record_size != RECORD_SIZE as u32 {
            return Err(StoreError::invalid_db(format!(
                "unsupported record size: {} (expected {})",
                record_size, RECORD_SIZE
            )));
        }

        if capacity == 0 || active_count > capacity || free_count > capacity {
            return Err(StoreError::corruption(format!(
                "counts out of range: {} active, {} free, capacity {}",
                active_count, free_count, capacity
            )));
        }

        let header = Self {
            version,
            next_id,
            active_count,
            free_count,
            data_end: BlockOffset::new(u64::from_be_bytes(data_end)),
            capacity,
        };

        if header.data_end < header.layout().data_start() {
            return Err(StoreError::corruption(format!(
                "data end {} precedes data region",
                header.data_end
            )));
        }

        Ok(header)
    }

    /// Write this header to bytes
    pub fn write(&self, bytes: &mut [u8]) {
        bytes[..HEADER_SIZE].fill(0);

        bytes[0..8].copy_from_slice(MAGIC);
        bytes[8..12].copy_from_slice(&self.version.to_be_bytes());
        bytes[12..16].copy_from_slice(&self.next_id.to_be_bytes());
        bytes[16..20].copy_from_slice(&self.active_count.to_be_bytes());
        bytes[20..24].copy_from_slice(&self.free_count.to_be_bytes());
        bytes[24..32].copy_from_slice(&self.data_end.value().to_be_bytes());
        bytes[32..36].copy_from_slice(&(RECORD_SIZE as u32).to_be_bytes());
        bytes[36..40].copy_from_slice(&self.capacity.to_be_bytes());

        let checksum = crc32fast::hash(&bytes[0..40]);
        bytes[40..44].copy_from_slice(&checksum.to_be_bytes());
    }

    /// Claim a new block at the end of the data region
    pub fn append_block(&mut self) -> BlockOffset {
        let offset = self.data_end;
        self.data_end = offset.next(RECORD_SIZE);
        offset
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new(Layout::default())
    }
}
