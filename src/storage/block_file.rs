//! Block I/O.
//!
//! The block file owns the database file handle and performs byte-exact,
//! positioned reads and writes of the header, the metadata regions and
//! record blocks. It sits behind the [`BlockStorage`] trait so the layers
//! above can be exercised against failing or in-memory backends in tests.

use crate::error::{Result, StoreError};
use crate::record::TaskRecord;
use crate::storage::freelist::{self, FreeBlock};
use crate::storage::index::{self, IndexEntry};
use crate::storage::FileHeader;
use crate::types::{
    BlockOffset, Layout, FREE_ENTRY_SIZE, HEADER_SIZE, INDEX_ENTRY_SIZE, RECORD_SIZE,
};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Trait for block-level file operations
pub trait BlockStorage: Send {
    /// Region geometry of the open file
    fn layout(&self) -> Layout;

    /// Read the on-disk header
    fn read_header(&mut self) -> Result<FileHeader>;

    /// Write the header and flush
    fn write_header(&mut self, header: &FileHeader) -> Result<()>;

    /// Read one record block
    fn read_record(&mut self, offset: BlockOffset) -> Result<TaskRecord>;

    /// Write one record block and flush
    fn write_record(&mut self, offset: BlockOffset, record: &TaskRecord) -> Result<()>;

    /// Allocate a record block, reusing the last on-disk free entry if any
    fn allocate_block(&mut self) -> Result<BlockOffset>;

    /// Append a block to the on-disk free list
    ///
    /// When the free-list region is full the block is dropped and the call
    /// still succeeds.
    fn free_block(&mut self, offset: BlockOffset) -> Result<()>;

    /// Read the first `count` entries of the index region
    fn read_index_entries(&mut self, count: usize) -> Result<Vec<IndexEntry>>;

    /// Overwrite the index region with `entries`, zeroing the remaining slots
    fn write_index_entries(&mut self, entries: &[IndexEntry]) -> Result<()>;

    /// Read the first `count` entries of the free-list region
    fn read_free_entries(&mut self, count: usize) -> Result<Vec<FreeBlock>>;

    /// Overwrite the free-list region with `blocks`, zeroing the remaining slots
    fn write_free_entries(&mut self, blocks: &[FreeBlock]) -> Result<()>;

    /// Sync all data to disk
    fn sync(&mut self) -> Result<()>;

    /// Sync and release the file handle
    fn close(self: Box<Self>) -> Result<()>;
}

/// File-based block storage
pub struct BlockFile {
    /// The database file
    file: File,
    /// Region geometry, taken from the header once the file is open
    layout: Layout,
    /// Whether to sync after each flushed write
    sync_on_write: bool,
}

impl BlockFile {
    /// Open or create a database file
    ///
    /// `capacity` only applies when a new file is laid out; an existing
    /// file keeps the capacity recorded in its header.
    pub fn open(path: &Path, capacity: usize, sync_on_write: bool) -> Result<Self> {
        if capacity == 0 {
            return Err(StoreError::invalid_operation("capacity must be at least 1"));
        }

        let exists = path.exists();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();

        let mut block_file = Self {
            file,
            layout: Layout::new(capacity),
            sync_on_write,
        };

        if exists && len >= HEADER_SIZE as u64 {
            let header = block_file.read_header()?;
            if header.capacity as usize != capacity {
                debug!(
                    stored = header.capacity,
                    requested = capacity,
                    "block_file.open.capacity_from_header"
                );
            }
            block_file.layout = header.layout();
        } else {
            if exists {
                warn!(path = %path.display(), len, "database file too short, reinitializing");
            }
            block_file.initialize()?;
            info!(path = %path.display(), capacity, "created database file");
        }

        Ok(block_file)
    }

    /// Lay out an empty database: header, zeroed metadata regions, no data
    fn initialize(&mut self) -> Result<()> {
        let header = FileHeader::new(self.layout);
        let data_start = self.layout.data_start().value();

        self.file.set_len(0)?;
        let mut image = vec![0u8; data_start as usize];
        header.write(&mut image[..HEADER_SIZE]);
        self.write_at(0, &image)?;
        self.file.set_len(data_start)?;
        self.file.sync_all()?;
        Ok(())
    }

    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, pos: u64, buf: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        self.file.write_all(buf)?;
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        if self.sync_on_write {
            self.file.sync_data()?;
        }
        Ok(())
    }

    fn check_block(&self, offset: BlockOffset) -> Result<()> {
        if self.layout.is_block_aligned(offset) {
            Ok(())
        } else {
            Err(StoreError::InvalidOffset(offset))
        }
    }

    /// Write a region image followed by zeroed slots up to `capacity`
    fn write_region(&mut self, start: u64, image: Vec<u8>, entry_size: usize) -> Result<()> {
        let capacity = self.layout.capacity();
        if image.len() > capacity * entry_size {
            return Err(StoreError::invalid_operation(format!(
                "{} entries exceed region capacity {}",
                image.len() / entry_size,
                capacity
            )));
        }
        let mut region = image;
        region.resize(capacity * entry_size, 0);
        self.write_at(start, &region)
    }

    fn read_region(&mut self, start: u64, count: usize, entry_size: usize) -> Result<Vec<u8>> {
        if count > self.layout.capacity() {
            return Err(StoreError::corruption(format!(
                "{} entries exceed region capacity {}",
                count,
                self.layout.capacity()
            )));
        }
        let mut buf = vec![0u8; count * entry_size];
        self.read_at(start, &mut buf)?;
        Ok(buf)
    }
}

impl BlockStorage for BlockFile {
    fn layout(&self) -> Layout {
        self.layout
    }

    fn read_header(&mut self) -> Result<FileHeader> {
        let mut buf = [0u8; HEADER_SIZE];
        self.read_at(0, &mut buf)?;
        FileHeader::read(&buf)
    }

    fn write_header(&mut self, header: &FileHeader) -> Result<()> {
        let mut buf = [0u8; HEADER_SIZE];
        header.write(&mut buf);
        self.write_at(0, &buf)
    }

    fn read_record(&mut self, offset: BlockOffset) -> Result<TaskRecord> {
        self.check_block(offset)?;
        let mut buf = [0u8; RECORD_SIZE];
        self.read_at(offset.value(), &mut buf)?;
        TaskRecord::read(&buf)
    }

    fn write_record(&mut self, offset: BlockOffset, record: &TaskRecord) -> Result<()> {
        self.check_block(offset)?;
        let block = record.to_block();
        self.write_at(offset.value(), &block)
    }

    fn allocate_block(&mut self) -> Result<BlockOffset> {
        let mut header = self.read_header()?;

        let offset = if header.free_count > 0 {
            let slot = header.free_count as usize - 1;
            let mut buf = [0u8; FREE_ENTRY_SIZE];
            self.read_at(self.layout.free_slot(slot), &mut buf)?;
            let block = FreeBlock::read(&buf);
            if !self.layout.is_record_offset(block.offset, header.data_end) {
                return Err(StoreError::corruption(format!(
                    "free-list slot {} holds invalid offset {}",
                    slot, block.offset
                )));
            }

            // Clear the popped slot
            self.write_at(self.layout.free_slot(slot), &[0u8; FREE_ENTRY_SIZE])?;
            header.free_count -= 1;
            debug!(offset = %block.offset, "block_file.allocate.reused");
            block.offset
        } else {
            let offset = header.append_block();
            debug!(offset = %offset, "block_file.allocate.appended");
            offset
        };

        self.write_header(&header)?;
        Ok(offset)
    }

    fn free_block(&mut self, offset: BlockOffset) -> Result<()> {
        self.check_block(offset)?;
        let mut header = self.read_header()?;

        if header.free_count as usize >= self.layout.capacity() {
            warn!(offset = %offset, "free list is full, block will not be reused");
            return Ok(());
        }

        let mut buf = [0u8; FREE_ENTRY_SIZE];
        FreeBlock::new(offset).write(&mut buf);
        self.write_at(self.layout.free_slot(header.free_count as usize), &buf)?;

        header.free_count += 1;
        self.write_header(&header)
    }

    fn read_index_entries(&mut self, count: usize) -> Result<Vec<IndexEntry>> {
        let start = self.layout.index_offset();
        let buf = self.read_region(start, count, INDEX_ENTRY_SIZE)?;
        Ok(index::decode_entries(&buf))
    }

    fn write_index_entries(&mut self, entries: &[IndexEntry]) -> Result<()> {
        let start = self.layout.index_offset();
        self.write_region(start, index::encode_entries(entries), INDEX_ENTRY_SIZE)
    }

    fn read_free_entries(&mut self, count: usize) -> Result<Vec<FreeBlock>> {
        let start = self.layout.free_list_offset();
        let buf = self.read_region(start, count, FREE_ENTRY_SIZE)?;
        Ok(freelist::decode_blocks(&buf))
    }

    fn write_free_entries(&mut self, blocks: &[FreeBlock]) -> Result<()> {
        let start = self.layout.free_list_offset();
        self.write_region(start, freelist::encode_blocks(blocks), FREE_ENTRY_SIZE)
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, Status};
    use tempfile::tempdir;

    fn record(id: u32, title: &str) -> TaskRecord {
        TaskRecord {
            id,
            title: title.to_string(),
            priority: Priority::Low,
            status: Status::Done,
            ..TaskRecord::default()
        }
    }

    #[test]
    fn test_create_new_database() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut bf = BlockFile::open(&path, 8, false)?;
        let header = bf.read_header()?;

        assert_eq!(header.next_id, 1);
        assert_eq!(header.active_count, 0);
        assert_eq!(header.free_count, 0);
        assert_eq!(header.capacity, 8);
        assert_eq!(header.data_end, Layout::new(8).data_start());
        assert_eq!(
            std::fs::metadata(&path)?.len(),
            Layout::new(8).data_start().value()
        );

        Ok(())
    }

    #[test]
    fn test_allocate_and_write_record() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut bf = BlockFile::open(&path, 8, false)?;
        let start = bf.layout().data_start();

        let b1 = bf.allocate_block()?;
        let b2 = bf.allocate_block()?;
        assert_eq!(b1, start);
        assert_eq!(b2, start.next(RECORD_SIZE));
        assert_eq!(bf.read_header()?.data_end, b2.next(RECORD_SIZE));

        bf.write_record(b2, &record(2, "second"))?;
        assert_eq!(bf.read_record(b2)?, record(2, "second"));

        Ok(())
    }

    #[test]
    fn test_read_past_end_fails() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut bf = BlockFile::open(&path, 8, false)?;
        let start = bf.layout().data_start();

        assert!(matches!(bf.read_record(start), Err(StoreError::Io(_))));
        assert!(matches!(
            bf.read_record(BlockOffset::new(start.value() + 3)),
            Err(StoreError::InvalidOffset(_))
        ));

        Ok(())
    }

    #[test]
    fn test_free_block_is_reused_lifo() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut bf = BlockFile::open(&path, 8, false)?;
        let b1 = bf.allocate_block()?;
        let b2 = bf.allocate_block()?;
        let b3 = bf.allocate_block()?;

        bf.free_block(b1)?;
        bf.free_block(b3)?;
        assert_eq!(bf.read_header()?.free_count, 2);
        assert_eq!(bf.read_free_entries(2)?[1].offset, b3);

        assert_eq!(bf.allocate_block()?, b3);
        assert_eq!(bf.allocate_block()?, b1);

        // Free list drained, so the next block is appended after b3
        let b4 = bf.allocate_block()?;
        assert_eq!(b4, b3.next(RECORD_SIZE));
        assert_ne!(b4, b2);

        Ok(())
    }

    #[test]
    fn test_free_block_discarded_when_full() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut bf = BlockFile::open(&path, 1, false)?;
        let b1 = bf.allocate_block()?;
        let b2 = bf.allocate_block()?;

        bf.free_block(b1)?;
        bf.free_block(b2)?;
        assert_eq!(bf.read_header()?.free_count, 1);
        assert_eq!(bf.allocate_block()?, b1);

        Ok(())
    }

    #[test]
    fn test_metadata_regions_roundtrip() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut bf = BlockFile::open(&path, 4, false)?;
        let start = bf.layout().data_start();
        let entries = vec![
            IndexEntry::new(1, start),
            IndexEntry::new(5, start.next(RECORD_SIZE)),
        ];
        let blocks = vec![FreeBlock::new(start.next(RECORD_SIZE * 2))];

        bf.write_index_entries(&entries)?;
        bf.write_free_entries(&blocks)?;

        assert_eq!(bf.read_index_entries(2)?, entries);
        assert_eq!(bf.read_free_entries(1)?, blocks);

        // Slots past the written entries stay zeroed
        let all = bf.read_index_entries(4)?;
        assert_eq!(all[2], IndexEntry::default());
        assert_eq!(all[3], IndexEntry::default());

        assert!(bf.read_index_entries(5).is_err());
        assert!(bf.write_free_entries(&vec![blocks[0]; 5]).is_err());

        Ok(())
    }

    #[test]
    fn test_reopen_database() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let offset = {
            let mut bf = BlockFile::open(&path, 16, true)?;
            let offset = bf.allocate_block()?;
            bf.write_record(offset, &record(1, "persisted"))?;
            Box::new(bf).close()?;
            offset
        };

        // The stored capacity wins over the requested one
        let mut bf = BlockFile::open(&path, 4, false)?;
        assert_eq!(bf.layout().capacity(), 16);
        assert_eq!(bf.read_record(offset)?.title, "persisted");

        Ok(())
    }

    #[test]
    fn test_short_file_is_reinitialized() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        std::fs::write(&path, b"garbage")?;

        let mut bf = BlockFile::open(&path, 8, false)?;
        assert_eq!(bf.read_header()?, FileHeader::new(Layout::new(8)));

        Ok(())
    }

    #[test]
    fn test_magic_mismatch_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        std::fs::write(&path, vec![0xABu8; HEADER_SIZE * 2]).unwrap();

        assert!(matches!(
            BlockFile::open(&path, 8, false),
            Err(StoreError::InvalidDatabaseFile(_))
        ));
    }
}
