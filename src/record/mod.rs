//! Record layer: the fixed-size task record and its block encoding.
//!
//! Every record occupies exactly [`RECORD_SIZE`] bytes on disk so a block
//! can be addressed by offset and reused after deletion without reflowing
//! the data region.

pub mod text;

use crate::error::{Result, StoreError};
use crate::types::{Priority, Status, DESCRIPTION_CAPACITY, RECORD_SIZE, TITLE_CAPACITY};

const TITLE_START: usize = 32;
const DESCRIPTION_START: usize = TITLE_START + TITLE_CAPACITY;
const CHECKSUM_START: usize = DESCRIPTION_START + DESCRIPTION_CAPACITY;

/// A single task.
///
/// Layout of the encoded block:
/// ```text
/// Offset  Size  Description
/// 0       4     Record id (0 never issued)
/// 4       1     Priority
/// 5       1     Status
/// 6       2     Reserved
/// 8       8     Created at (unix seconds)
/// 16      8     Due date (unix seconds, 0 if unset)
/// 24      8     Completed at (unix seconds, 0 if unset)
/// 32      128   Title, NUL padded
/// 160     256   Description, NUL padded
/// 416     4     Checksum of bytes 0..416 (CRC32)
/// 420     4     Reserved
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskRecord {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub created_at: i64,
    pub due_date: i64,
    pub completed_at: i64,
    pub priority: Priority,
    pub status: Status,
}

impl TaskRecord {
    /// Create a pending, medium-priority task with the given title
    pub fn new(title: impl Into<String>) -> Self {
        let mut record = Self {
            title: title.into(),
            ..Self::default()
        };
        record.clamp_text();
        record
    }

    /// Truncate title and description to what the block can hold
    pub fn clamp_text(&mut self) {
        let title = text::clamp(&self.title, TITLE_CAPACITY).len();
        self.title.truncate(title);
        let description = text::clamp(&self.description, DESCRIPTION_CAPACITY).len();
        self.description.truncate(description);
    }

    /// Reject text the NUL-padded fields cannot hold without loss
    pub fn validate(&self) -> Result<()> {
        if self.title.contains('\0') || self.description.contains('\0') {
            return Err(StoreError::invalid_payload(
                "title and description must not contain NUL characters",
            ));
        }
        Ok(())
    }

    /// Decode a record from a block
    pub fn read(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RECORD_SIZE {
            return Err(StoreError::corruption(format!(
                "record block too short: {} bytes",
                bytes.len()
            )));
        }

        let stored_checksum = u32::from_be_bytes([
            bytes[CHECKSUM_START],
            bytes[CHECKSUM_START + 1],
            bytes[CHECKSUM_START + 2],
            bytes[CHECKSUM_START + 3],
        ]);
        let computed_checksum = crc32fast::hash(&bytes[..CHECKSUM_START]);
        if stored_checksum != computed_checksum {
            return Err(StoreError::corruption("record checksum mismatch"));
        }

        Ok(Self {
            id: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            priority: Priority::from_value_or_default(bytes[4] as i64),
            status: Status::from_value_or_default(bytes[5] as i64),
            created_at: read_i64(&bytes[8..16]),
            due_date: read_i64(&bytes[16..24]),
            completed_at: read_i64(&bytes[24..32]),
            title: text::read_field(&bytes[TITLE_START..DESCRIPTION_START]),
            description: text::read_field(&bytes[DESCRIPTION_START..CHECKSUM_START]),
        })
    }

    /// Encode this record into a block
    pub fn write(&self, bytes: &mut [u8]) {
        bytes[..RECORD_SIZE].fill(0);

        bytes[0..4].copy_from_slice(&self.id.to_be_bytes());
        bytes[4] = self.priority as u8;
        bytes[5] = self.status as u8;
        bytes[8..16].copy_from_slice(&self.created_at.to_be_bytes());
        bytes[16..24].copy_from_slice(&self.due_date.to_be_bytes());
        bytes[24..32].copy_from_slice(&self.completed_at.to_be_bytes());
        text::write_field(&mut bytes[TITLE_START..DESCRIPTION_START], &self.title);
        text::write_field(&mut bytes[DESCRIPTION_START..CHECKSUM_START], &self.description);

        let checksum = crc32fast::hash(&bytes[..CHECKSUM_START]);
        bytes[CHECKSUM_START..CHECKSUM_START + 4].copy_from_slice(&checksum.to_be_bytes());
    }

    /// Encode this record into a freshly allocated block
    pub fn to_block(&self) -> [u8; RECORD_SIZE] {
        let mut block = [0u8; RECORD_SIZE];
        self.write(&mut block);
        block
    }
}

fn read_i64(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    i64::from_be_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TaskRecord {
        TaskRecord {
            id: 7,
            title: "Write report".to_string(),
            description: "Quarterly numbers".to_string(),
            created_at: 1_700_000_000,
            due_date: 1_700_086_400,
            completed_at: 0,
            priority: Priority::Important,
            status: Status::InProgress,
        }
    }

    #[test]
    fn test_record_roundtrip() {
        let record = sample();
        let block = record.to_block();
        assert_eq!(TaskRecord::read(&block).unwrap(), record);
    }

    #[test]
    fn test_field_positions() {
        let block = sample().to_block();
        assert_eq!(&block[0..4], &7u32.to_be_bytes());
        assert_eq!(block[4], Priority::Important as u8);
        assert_eq!(block[5], Status::InProgress as u8);
        assert_eq!(&block[TITLE_START..TITLE_START + 12], b"Write report");
        assert_eq!(block[TITLE_START + 12], 0);
    }

    #[test]
    fn test_checksum_validation() {
        let mut block = sample().to_block();
        block[TITLE_START] ^= 0xFF;
        assert!(matches!(
            TaskRecord::read(&block),
            Err(StoreError::Corruption(_))
        ));

        // An all-zero block was never written
        assert!(TaskRecord::read(&[0u8; RECORD_SIZE]).is_err());
    }

    #[test]
    fn test_out_of_range_enums_decode_to_default() {
        let mut block = sample().to_block();
        block[4] = 42;
        block[5] = 42;
        let checksum = crc32fast::hash(&block[..CHECKSUM_START]);
        block[CHECKSUM_START..CHECKSUM_START + 4].copy_from_slice(&checksum.to_be_bytes());

        let record = TaskRecord::read(&block).unwrap();
        assert_eq!(record.priority, Priority::Medium);
        assert_eq!(record.status, Status::Pending);
    }

    #[test]
    fn test_validate_rejects_nul() {
        assert!(sample().validate().is_ok());

        let mut record = sample();
        record.title = "a\0b".to_string();
        assert!(matches!(record.validate(), Err(StoreError::InvalidPayload(_))));

        let mut record = sample();
        record.description = "x\0".to_string();
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_long_text_is_clamped() {
        let mut record = TaskRecord::new("x".repeat(500));
        record.description = "y".repeat(500);
        record.clamp_text();
        assert_eq!(record.title.len(), TITLE_CAPACITY - 1);
        assert_eq!(record.description.len(), DESCRIPTION_CAPACITY - 1);

        let decoded = TaskRecord::read(&record.to_block()).unwrap();
        assert_eq!(decoded, record);
    }
}
