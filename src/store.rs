//! Store facade: record-level CRUD over the index manager and block I/O.
//!
//! Record payloads are written through to disk on every call. Metadata
//! (header, index region, free-list region) is checkpointed every
//! `checkpoint_interval` mutations and always at shutdown. It is also
//! written whenever a new block has to be appended to the data region.

use crate::codec;
use crate::error::{Result, StoreError};
use crate::record::TaskRecord;
use crate::storage::{BlockFile, BlockStorage, FileHeader, FreeBlock, IndexEntry, IndexManager};
use crate::types::BlockOffset;
use crate::Config;
use tracing::{debug, info, warn};

/// Single-file task store
pub struct TaskStore {
    manager: IndexManager,
    /// Mutations between automatic checkpoints (0 = no automatic checkpoints)
    checkpoint_interval: usize,
    /// Mutations since the last checkpoint
    pending: usize,
}

impl TaskStore {
    /// Open or create the store described by `config`
    pub fn open(config: &Config) -> Result<Self> {
        let storage = BlockFile::open(&config.path, config.capacity, config.sync_on_write)?;
        let store = Self::with_storage(Box::new(storage), config.checkpoint_interval)?;
        info!(path = %config.path.display(), records = store.count(), "task store opened");
        Ok(store)
    }

    /// Open a store over an already opened block storage
    pub fn with_storage(storage: Box<dyn BlockStorage>, checkpoint_interval: usize) -> Result<Self> {
        Ok(Self {
            manager: IndexManager::initialize(storage)?,
            checkpoint_interval,
            pending: 0,
        })
    }

    /// Parse a JSON payload and insert it as a new record
    ///
    /// Returns the id of the new record. A malformed payload fails before
    /// anything is written.
    pub fn add(&mut self, payload: &str) -> Result<u32> {
        let record = codec::parse_new(payload)?;
        self.insert(record)
    }

    /// Insert a new record, assigning its id and creation time
    pub fn insert(&mut self, mut record: TaskRecord) -> Result<u32> {
        let id = self.manager.next_id();
        if id == 0 || id == u32::MAX {
            return Err(StoreError::invalid_operation("record id space exhausted"));
        }
        if self.manager.is_full() {
            return Err(StoreError::IndexFull {
                capacity: self.manager.layout().capacity(),
            });
        }

        record.validate()?;
        record.id = id;
        record.created_at = codec::now();
        record.clamp_text();

        let offset = match self.manager.allocate_free_offset() {
            Some(offset) => offset,
            None => self.manager.allocate_block()?,
        };

        if let Err(err) = self.place(&record, offset) {
            // Hand the block back so the failed insert does not leak it
            if let Err(release_err) = self.manager.release_offset(offset) {
                warn!(offset = %offset, error = %release_err, "block leaked after failed insert");
            }
            return Err(err);
        }

        self.manager.advance_id();
        debug!(id, offset = %offset, "store.insert");
        self.mutated();
        Ok(id)
    }

    fn place(&mut self, record: &TaskRecord, offset: BlockOffset) -> Result<()> {
        self.manager.storage_mut().write_record(offset, record)?;
        self.manager.add_entry(record.id, offset)
    }

    /// Read the record with `id`
    pub fn find(&mut self, id: u32) -> Result<TaskRecord> {
        let offset = self
            .manager
            .lookup_offset(id)
            .ok_or(StoreError::RecordNotFound(id))?;
        let record = self.manager.storage_mut().read_record(offset)?;
        if record.id != id {
            return Err(StoreError::corruption(format!(
                "block {} holds record {} but is indexed as {}",
                offset, record.id, id
            )));
        }
        Ok(record)
    }

    /// Overwrite an existing record in place
    ///
    /// Every field is replaced; use [`TaskStore::update_json`] to change
    /// only some of them.
    pub fn update(&mut self, record: &TaskRecord) -> Result<()> {
        record.validate()?;
        let offset = self
            .manager
            .lookup_offset(record.id)
            .ok_or(StoreError::RecordNotFound(record.id))?;
        self.manager.storage_mut().write_record(offset, record)?;
        debug!(id = record.id, offset = %offset, "store.update");
        Ok(())
    }

    /// Apply a partial JSON update and return the resulting record
    ///
    /// Fields absent from the payload keep their stored values.
    pub fn update_json(&mut self, payload: &str) -> Result<TaskRecord> {
        let patch = codec::parse_patch(payload)?;
        let mut record = self.find(patch.id)?;
        patch.apply(&mut record);
        self.update(&record)?;
        Ok(record)
    }

    /// Delete the record with `id` and make its block reusable
    ///
    /// If the free list cannot take the block the delete still succeeds and
    /// the block is leaked.
    pub fn delete(&mut self, id: u32) -> Result<()> {
        let offset = self
            .manager
            .lookup_offset(id)
            .ok_or(StoreError::RecordNotFound(id))?;

        // Unindex before releasing so a failure cannot double-free the block
        self.manager.remove_entry(id)?;
        if let Err(err) = self.manager.release_offset(offset) {
            warn!(id, offset = %offset, error = %err, "block leaked on delete");
        }

        debug!(id, offset = %offset, "store.delete");
        self.mutated();
        Ok(())
    }

    /// Number of active records
    pub fn count(&self) -> usize {
        self.manager.count()
    }

    /// Read every active record. Order is unspecified and changes after
    /// deletions. Unreadable blocks are logged and skipped.
    pub fn enumerate_all(&mut self) -> Result<Vec<TaskRecord>> {
        let entries: Vec<IndexEntry> = self.manager.index_entries().to_vec();
        let mut records = Vec::with_capacity(entries.len());

        for entry in entries {
            match self.manager.storage_mut().read_record(entry.offset) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(id = entry.id, offset = %entry.offset, error = %err, "skipping unreadable record");
                }
            }
        }

        Ok(records)
    }

    /// Every active record as a JSON array (`[]` when empty)
    pub fn enumerate_all_json(&mut self) -> Result<String> {
        let records = self.enumerate_all()?;
        codec::to_json_array(&records)
    }

    /// Persist header, index and free list now
    pub fn checkpoint(&mut self) -> Result<()> {
        self.manager.checkpoint()?;
        self.pending = 0;
        Ok(())
    }

    /// Persist all metadata and close the file
    pub fn shutdown(self) -> Result<()> {
        info!(records = self.count(), "shutting down task store");
        self.manager.shutdown()
    }

    fn mutated(&mut self) {
        self.pending += 1;
        if self.checkpoint_interval == 0 || self.pending < self.checkpoint_interval {
            return;
        }
        // Pending stays non-zero, so the next mutation retries
        if let Err(err) = self.checkpoint() {
            warn!(error = %err, pending = self.pending, "automatic checkpoint failed");
        }
    }

    /// Id the next insertion will receive
    pub fn next_id(&self) -> u32 {
        self.manager.next_id()
    }

    /// Offset of the block holding `id`
    pub fn offset_of(&self, id: u32) -> Option<BlockOffset> {
        self.manager.lookup_offset(id)
    }

    /// Active index entries
    pub fn index_entries(&self) -> &[IndexEntry] {
        self.manager.index_entries()
    }

    /// Reusable blocks, most recently freed last
    pub fn free_blocks(&self) -> &[FreeBlock] {
        self.manager.free_blocks()
    }

    /// The in-memory header
    pub fn header(&self) -> &FileHeader {
        self.manager.header()
    }
}
