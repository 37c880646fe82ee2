//! # Task Store
//!
//! A single-file store of fixed-size task records with an in-memory index
//! and free list.
//!
//! ## Architecture
//!
//! - **Types** (`types`): file layout constants, region geometry, enums
//! - **Record Layer** (`record`): the fixed-size record and its encoding
//! - **Storage Layer** (`storage`): block I/O, file header, index table,
//!   free list and the manager that mirrors them in memory
//! - **Store** (`store`): CRUD facade used by callers
//! - **Codec** (`codec`): JSON payloads in and out
//!
//! ## Usage
//!
//! ```rust,ignore
//! use task_store::{Config, Db};
//!
//! let db = Db::open(Config::new("tasks.db"))?;
//!
//! let id = db.add(r#"{"title": "Write report", "prio": 1}"#)?;
//! let task = db.find(id)?;
//!
//! db.update_json(&format!(r#"{{"id": {}, "status": 2}}"#, id))?;
//! println!("{}", db.enumerate_all_json()?);
//!
//! db.delete(id)?;
//! db.shutdown()?;
//! ```

pub mod codec;
pub mod error;
pub mod logging;
pub mod record;
pub mod storage;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use record::TaskRecord;
pub use store::TaskStore;
pub use types::{BlockOffset, Priority, Status, DEFAULT_CAPACITY, RECORD_SIZE};

use parking_lot::Mutex;
use std::path::PathBuf;

/// Store configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the database file
    pub path: PathBuf,
    /// Slots in the index table and free list of a new file (default: 512)
    pub capacity: usize,
    /// Whether to sync writes to the device immediately (default: false)
    pub sync_on_write: bool,
    /// Mutations between metadata checkpoints (default: 1)
    ///
    /// With 0 there are no automatic checkpoints; metadata is still written
    /// on `checkpoint`, at shutdown, and whenever a new block is appended.
    pub checkpoint_interval: usize,
}

impl Config {
    /// Create a new configuration with default settings
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            capacity: DEFAULT_CAPACITY,
            sync_on_write: false,
            checkpoint_interval: 1,
        }
    }

    /// Set the table capacity used when creating a file
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Enable sync on write for durability
    pub fn sync_on_write(mut self, enabled: bool) -> Self {
        self.sync_on_write = enabled;
        self
    }

    /// Set how many mutations may pass between metadata checkpoints
    pub fn checkpoint_interval(mut self, mutations: usize) -> Self {
        self.checkpoint_interval = mutations;
        self
    }
}

/// Thread-safe database handle
///
/// The store itself is single-threaded; this handle serializes every call
/// through one lock so it can be shared between threads.
pub struct Db {
    store: Mutex<TaskStore>,
}

impl Db {
    /// Open or create a database
    pub fn open(config: Config) -> Result<Self> {
        Ok(Self {
            store: Mutex::new(TaskStore::open(&config)?),
        })
    }

    /// Insert a record from a JSON payload, returning its id
    pub fn add(&self, payload: &str) -> Result<u32> {
        self.store.lock().add(payload)
    }

    /// Insert a record, returning its id
    pub fn insert(&self, record: TaskRecord) -> Result<u32> {
        self.store.lock().insert(record)
    }

    /// Get a record by id
    pub fn find(&self, id: u32) -> Result<TaskRecord> {
        self.store.lock().find(id)
    }

    /// Replace a stored record
    pub fn update(&self, record: &TaskRecord) -> Result<()> {
        self.store.lock().update(record)
    }

    /// Apply a partial JSON update
    pub fn update_json(&self, payload: &str) -> Result<TaskRecord> {
        self.store.lock().update_json(payload)
    }

    /// Delete a record by id
    pub fn delete(&self, id: u32) -> Result<()> {
        self.store.lock().delete(id)
    }

    /// Number of active records
    pub fn count(&self) -> usize {
        self.store.lock().count()
    }

    /// All active records, in unspecified order
    pub fn enumerate_all(&self) -> Result<Vec<TaskRecord>> {
        self.store.lock().enumerate_all()
    }

    /// All active records as a JSON array
    pub fn enumerate_all_json(&self) -> Result<String> {
        self.store.lock().enumerate_all_json()
    }

    /// Persist metadata now
    pub fn checkpoint(&self) -> Result<()> {
        self.store.lock().checkpoint()
    }

    /// Get statistics about the database
    pub fn stats(&self) -> DbStats {
        let store = self.store.lock();
        let header = store.header();
        DbStats {
            record_count: store.count(),
            free_blocks: store.free_blocks().len(),
            next_id: header.next_id,
            capacity: header.capacity as usize,
            data_end: header.data_end,
        }
    }

    /// Persist all metadata and close the file
    pub fn shutdown(self) -> Result<()> {
        self.store.into_inner().shutdown()
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DbStats {
    /// Active records
    pub record_count: usize,
    /// Blocks waiting for reuse
    pub free_blocks: usize,
    /// Id the next insertion will receive
    pub next_id: u32,
    /// Slots in the index table and the free list
    pub capacity: usize,
    /// End of the data region
    pub data_end: BlockOffset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[test]
    fn test_basic_operations() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Db::open(Config::new(&path))?;

        let id = db.add(r#"{"title": "first", "description": "hello"}"#)?;
        assert_eq!(db.find(id)?.description, "hello");

        let updated = db.update_json(&format!(r#"{{"id": {}, "description": "bye"}}"#, id))?;
        assert_eq!(db.find(id)?, updated);

        db.delete(id)?;
        assert!(db.find(id).unwrap_err().is_not_found());
        assert!(db.delete(id).unwrap_err().is_not_found());
        assert_eq!(db.count(), 0);

        let stats = db.stats();
        assert_eq!(stats.free_blocks, 1);
        assert_eq!(stats.next_id, 2);
        assert_eq!(stats.capacity, DEFAULT_CAPACITY);

        db.shutdown()?;
        Ok(())
    }

    #[test]
    fn test_shared_between_threads() -> Result<()> {
        let dir = tempdir().unwrap();
        let db = Db::open(Config::new(dir.path().join("test.db")).checkpoint_interval(8))?;

        let ids: Vec<u32> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let db = &db;
                    s.spawn(move || {
                        (0..10)
                            .map(|i| db.add(&format!(r#"{{"title": "t{}-{}"}}"#, t, i)).unwrap())
                            .collect::<Vec<u32>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let unique: HashSet<u32> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 40);
        assert_eq!(db.count(), 40);
        assert_eq!(db.enumerate_all()?.len(), 40);

        Ok(())
    }

    #[test]
    fn test_reopen_after_shutdown() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let db = Db::open(Config::new(&path).checkpoint_interval(0))?;
            db.add(r#"{"title": "kept"}"#)?;
            db.shutdown()?;
        }

        let db = Db::open(Config::new(&path))?;
        assert_eq!(db.count(), 1);
        assert_eq!(db.find(1)?.title, "kept");

        Ok(())
    }
}
