//! Block offset type.

use std::fmt;

/// Byte offset of a record block in the database file.
///
/// Offset 0 is the file header and never addresses a record, so it
/// doubles as the "empty slot" marker in the on-disk free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BlockOffset(pub u64);

impl BlockOffset {
    /// Offset of the file header
    pub const HEADER: BlockOffset = BlockOffset(0);

    /// Create a new block offset
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    /// Get the raw byte offset
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The offset of the block that follows this one
    pub const fn next(self, block_size: usize) -> Self {
        Self(self.0 + block_size as u64)
    }
}

impl fmt::Display for BlockOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BlockOffset {
    fn from(offset: u64) -> Self {
        Self(offset)
    }
}

impl From<BlockOffset> for u64 {
    fn from(offset: BlockOffset) -> Self {
        offset.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RECORD_SIZE;

    #[test]
    fn test_block_offset_next() {
        let offset = BlockOffset::new(1000);
        assert_eq!(offset.next(RECORD_SIZE).value(), 1000 + RECORD_SIZE as u64);
    }

    #[test]
    fn test_block_offset_display() {
        assert_eq!(format!("{}", BlockOffset::new(16512)), "16512");
        assert_eq!(u64::from(BlockOffset::HEADER), 0);
    }
}
