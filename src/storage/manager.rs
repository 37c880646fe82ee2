//! Index and free-list manager.
//!
//! Holds the in-memory header, index table and free list. All three are
//! loaded wholesale when the store opens, mutated in memory by CRUD calls,
//! and written back wholesale at checkpoints and at shutdown.

use crate::error::{Result, StoreError};
use crate::storage::block_file::BlockStorage;
use crate::storage::freelist::{FreeBlock, FreeList};
use crate::storage::index::{IndexEntry, IndexTable};
use crate::storage::FileHeader;
use crate::types::{BlockOffset, Layout};
use tracing::{debug, error, info};

/// In-memory mirror of the store metadata
pub struct IndexManager {
    storage: Box<dyn BlockStorage>,
    header: FileHeader,
    index: IndexTable,
    free_list: FreeList,
}

impl IndexManager {
    /// Load header, index and free list from an open block storage
    pub fn initialize(mut storage: Box<dyn BlockStorage>) -> Result<Self> {
        let header = storage.read_header()?;
        let layout = header.layout();

        let mut index = IndexTable::new(layout.capacity());
        if header.active_count > 0 {
            for entry in storage.read_index_entries(header.active_count as usize)? {
                if !layout.is_record_offset(entry.offset, header.data_end) {
                    return Err(StoreError::corruption(format!(
                        "index entry {} points at invalid offset {}",
                        entry.id, entry.offset
                    )));
                }
                if entry.id >= header.next_id {
                    return Err(StoreError::corruption(format!(
                        "index entry {} not below next id {}",
                        entry.id, header.next_id
                    )));
                }
                index.push(entry)?;
            }
        }

        let mut free_list = FreeList::new(layout.capacity());
        if header.free_count > 0 {
            for block in storage.read_free_entries(header.free_count as usize)? {
                if !layout.is_record_offset(block.offset, header.data_end)
                    || index.references(block.offset)
                    || free_list.contains(block.offset)
                {
                    return Err(StoreError::corruption(format!(
                        "free-list entry has invalid offset {}",
                        block.offset
                    )));
                }
                free_list.push(block)?;
            }
        }

        info!(
            active = index.len(),
            free = free_list.len(),
            next_id = header.next_id,
            "index manager loaded"
        );

        Ok(Self {
            storage,
            header,
            index,
            free_list,
        })
    }

    /// Write header, index region and free-list region to disk
    pub fn checkpoint(&mut self) -> Result<()> {
        let first_error = self.persist_metadata();
        match first_error {
            Some(err) => Err(err),
            None => self.storage.sync(),
        }
    }

    /// Persist all metadata and close the file
    ///
    /// Every write is attempted even if an earlier one failed. The first
    /// failure is returned after the file is closed.
    pub fn shutdown(mut self) -> Result<()> {
        let first_error = self.persist_metadata();
        let closed = self.storage.close();
        if let Err(err) = &closed {
            error!(error = %err, "failed to close database file");
        }
        info!("index manager shut down");

        match first_error {
            Some(err) => Err(err),
            None => closed,
        }
    }

    /// Best-effort write of all metadata, returning the first failure
    fn persist_metadata(&mut self) -> Option<StoreError> {
        let mut first_error = None;
        let header = self.header;

        if let Err(err) = self.storage.write_header(&header) {
            error!(error = %err, "failed to write header");
            first_error.get_or_insert(err);
        }
        if let Err(err) = self.storage.write_index_entries(self.index.entries()) {
            error!(error = %err, "failed to write index region");
            first_error.get_or_insert(err);
        }
        if let Err(err) = self.storage.write_free_entries(self.free_list.blocks()) {
            error!(error = %err, "failed to write free-list region");
            first_error.get_or_insert(err);
        }

        first_error
    }

    /// Offset of the record with `id`
    pub fn lookup_offset(&self, id: u32) -> Option<BlockOffset> {
        self.index.lookup(id)
    }

    /// Index a record stored at `offset`
    pub fn add_entry(&mut self, id: u32, offset: BlockOffset) -> Result<()> {
        if !self.layout().is_record_offset(offset, self.header.data_end)
            || self.free_list.contains(offset)
            || self.index.references(offset)
        {
            return Err(StoreError::InvalidOffset(offset));
        }
        self.index.push(IndexEntry::new(id, offset))?;
        self.header.active_count = self.index.len() as u32;
        Ok(())
    }

    /// Drop the index entry for `id`
    pub fn remove_entry(&mut self, id: u32) -> Result<IndexEntry> {
        let entry = self.index.swap_remove(id)?;
        self.header.active_count = self.index.len() as u32;
        Ok(entry)
    }

    /// Pop the most recently freed block
    pub fn allocate_free_offset(&mut self) -> Option<BlockOffset> {
        let block = self.free_list.pop()?;
        self.header.free_count = self.free_list.len() as u32;
        Some(block.offset)
    }

    /// Push a block onto the free list
    pub fn release_offset(&mut self, offset: BlockOffset) -> Result<()> {
        if !self.layout().is_record_offset(offset, self.header.data_end)
            || self.index.references(offset)
            || self.free_list.contains(offset)
        {
            return Err(StoreError::InvalidOffset(offset));
        }
        self.free_list.push(FreeBlock::new(offset))?;
        self.header.free_count = self.free_list.len() as u32;
        Ok(())
    }

    /// Claim a new block from the block storage
    ///
    /// All metadata is persisted first so the on-disk free list matches
    /// memory, and the header is re-read afterwards to pick up the new data
    /// end. A crash after this call leaves at most one unindexed block.
    pub fn allocate_block(&mut self) -> Result<BlockOffset> {
        if let Some(err) = self.persist_metadata() {
            return Err(err);
        }
        let offset = self.storage.allocate_block()?;
        let on_disk = self.storage.read_header()?;

        self.header.data_end = on_disk.data_end;
        if on_disk.free_count != self.header.free_count {
            // The storage popped an on-disk free entry; mirror the pop
            let popped = self.free_list.pop().map(|b| b.offset);
            debug_assert_eq!(popped, Some(offset));
            self.header.free_count = self.free_list.len() as u32;
        }
        debug!(offset = %offset, data_end = %self.header.data_end, "manager.allocate_block");
        Ok(offset)
    }

    /// Next id to be issued
    pub fn next_id(&self) -> u32 {
        self.header.next_id
    }

    /// Move the id counter past the last issued id
    pub fn advance_id(&mut self) {
        self.header.next_id += 1;
    }

    /// Number of active records
    pub fn count(&self) -> usize {
        self.index.len()
    }

    /// Whether another record can be indexed
    pub fn is_full(&self) -> bool {
        self.index.is_full()
    }

    /// Active index entries, in unspecified order
    pub fn index_entries(&self) -> &[IndexEntry] {
        self.index.entries()
    }

    /// Reusable blocks, most recently freed last
    pub fn free_blocks(&self) -> &[FreeBlock] {
        self.free_list.blocks()
    }

    /// The cached header
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Region geometry of the open file
    pub fn layout(&self) -> Layout {
        self.header.layout()
    }

    /// Block storage for record reads and writes
    pub fn storage_mut(&mut self) -> &mut dyn BlockStorage {
        self.storage.as_mut()
    }
}
