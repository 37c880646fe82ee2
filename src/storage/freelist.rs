//! Free list management.
//!
//! Tracks record blocks left behind by deletions so later insertions can
//! reuse them. Blocks are handed out LIFO: the most recently freed block is
//! the next one allocated.

use crate::error::{Result, StoreError};
use crate::types::{BlockOffset, FREE_ENTRY_SIZE, RECORD_SIZE};

/// One free-list entry
///
/// Layout:
/// ```text
/// Offset  Size  Description
/// 0       8     Block offset
/// 8       8     Block size
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FreeBlock {
    pub offset: BlockOffset,
    pub size: u64,
}

impl FreeBlock {
    /// Describe a freed record block
    pub fn new(offset: BlockOffset) -> Self {
        Self {
            offset,
            size: RECORD_SIZE as u64,
        }
    }

    /// Decode an entry
    pub fn read(bytes: &[u8]) -> Self {
        let mut offset = [0u8; 8];
        let mut size = [0u8; 8];
        offset.copy_from_slice(&bytes[0..8]);
        size.copy_from_slice(&bytes[8..16]);
        Self {
            offset: BlockOffset::new(u64::from_be_bytes(offset)),
            size: u64::from_be_bytes(size),
        }
    }

    /// Encode this entry
    pub fn write(&self, bytes: &mut [u8]) {
        bytes[0..8].copy_from_slice(&self.offset.value().to_be_bytes());
        bytes[8..16].copy_from_slice(&self.size.to_be_bytes());
    }
}

/// Encode a run of entries into a contiguous region image
pub fn encode_blocks(blocks: &[FreeBlock]) -> Vec<u8> {
    let mut buf = vec![0u8; blocks.len() * FREE_ENTRY_SIZE];
    for (block, chunk) in blocks.iter().zip(buf.chunks_exact_mut(FREE_ENTRY_SIZE)) {
        block.write(chunk);
    }
    buf
}

/// Decode a region image into entries
pub fn decode_blocks(bytes: &[u8]) -> Vec<FreeBlock> {
    bytes.chunks_exact(FREE_ENTRY_SIZE).map(FreeBlock::read).collect()
}

/// Fixed-capacity stack of reusable blocks
#[derive(Debug)]
pub struct FreeList {
    slots: Box<[FreeBlock]>,
    len: usize,
}

impl FreeList {
    /// Create an empty free list with `capacity` slots
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![FreeBlock::default(); capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Get the number of free blocks
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the free list is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if every slot is taken
    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Free blocks, oldest first
    pub fn blocks(&self) -> &[FreeBlock] {
        &self.slots[..self.len]
    }

    /// Check whether `offset` is already on the list
    pub fn contains(&self, offset: BlockOffset) -> bool {
        self.blocks().iter().any(|b| b.offset == offset)
    }

    /// Add a block to the free list
    pub fn push(&mut self, block: FreeBlock) -> Result<()> {
        if self.is_full() {
            return Err(StoreError::FreeListFull {
                capacity: self.capacity(),
            });
        }
        self.slots[self.len] = block;
        self.len += 1;
        Ok(())
    }

    /// Take the most recently freed block, if any
    pub fn pop(&mut self) -> Option<FreeBlock> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        let block = self.slots[self.len];
        self.slots[self.len] = FreeBlock::default();
        Some(block)
    }
}
