//! Index table: maps record ids to block offsets.
//!
//! The table is a bounded arena of `capacity` slots with an explicit
//! length, mirroring the preallocated index region on disk slot for slot.
//! Slots at or beyond `len` hold zeroed entries.

use crate::error::{Result, StoreError};
use crate::types::{BlockOffset, INDEX_ENTRY_SIZE, RECORD_SIZE};

/// One index entry
///
/// Layout:
/// ```text
/// Offset  Size  Description
/// 0       4     Record id (0 marks a vacated slot)
/// 4       4     Record size
/// 8       8     Block offset
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexEntry {
    pub id: u32,
    pub offset: BlockOffset,
    pub size: u32,
}

impl IndexEntry {
    /// Create an entry for a full-size record block
    pub fn new(id: u32, offset: BlockOffset) -> Self {
        Self {
            id,
            offset,
            size: RECORD_SIZE as u32,
        }
    }

    /// Decode an entry
    pub fn read(bytes: &[u8]) -> Self {
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&bytes[8..16]);
        Self {
            id: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            size: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            offset: BlockOffset::new(u64::from_be_bytes(offset)),
        }
    }

    /// Encode this entry
    pub fn write(&self, bytes: &mut [u8]) {
        bytes[0..4].copy_from_slice(&self.id.to_be_bytes());
        bytes[4..8].copy_from_slice(&self.size.to_be_bytes());
        bytes[8..16].copy_from_slice(&self.offset.value().to_be_bytes());
    }
}

/// Encode a run of entries into a contiguous region image
pub fn encode_entries(entries: &[IndexEntry]) -> Vec<u8> {
    let mut buf = vec![0u8; entries.len() * INDEX_ENTRY_SIZE];
    for (entry, chunk) in entries.iter().zip(buf.chunks_exact_mut(INDEX_ENTRY_SIZE)) {
        entry.write(chunk);
    }
    buf
}

/// Decode a region image into entries
pub fn decode_entries(bytes: &[u8]) -> Vec<IndexEntry> {
    bytes
        .chunks_exact(INDEX_ENTRY_SIZE)
        .map(IndexEntry::read)
        .collect()
}

/// Fixed-capacity table of active index entries
#[derive(Debug)]
pub struct IndexTable {
    slots: Box<[IndexEntry]>,
    len: usize,
}

impl IndexTable {
    /// Create an empty table with `capacity` slots
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![IndexEntry::default(); capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of active entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the table has no active entries
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if every slot is taken
    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Active entries, in slot order
    pub fn entries(&self) -> &[IndexEntry] {
        &self.slots[..self.len]
    }

    /// Slot holding `id`
    pub fn position(&self, id: u32) -> Option<usize> {
        if id == 0 {
            return None;
        }
        self.entries().iter().position(|e| e.id == id)
    }

    /// Offset of the record with `id`
    pub fn lookup(&self, id: u32) -> Option<BlockOffset> {
        self.position(id).map(|slot| self.slots[slot].offset)
    }

    /// Check whether any active entry points at `offset`
    pub fn references(&self, offset: BlockOffset) -> bool {
        self.entries().iter().any(|e| e.offset == offset)
    }

    /// Append an entry
    pub fn push(&mut self, entry: IndexEntry) -> Result<()> {
        if self.is_full() {
            return Err(StoreError::IndexFull {
                capacity: self.capacity(),
            });
        }
        if entry.id == 0 || self.position(entry.id).is_some() {
            return Err(StoreError::DuplicateId(entry.id));
        }

        self.slots[self.len] = entry;
        self.len += 1;
        Ok(())
    }

    /// Remove the entry for `id`, moving the last active entry into its slot
    pub fn swap_remove(&mut self, id: u32) -> Result<IndexEntry> {
        let slot = self.position(id).ok_or(StoreError::RecordNotFound(id))?;
        let last = self.len - 1;
        let removed = self.slots[slot];

        self.slots.swap(slot, last);
        self.slots[last] = IndexEntry::default();
        self.len = last;
        Ok(removed)
    }
}
