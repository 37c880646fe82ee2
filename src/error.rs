//! Error types for the task store.

use crate::types::BlockOffset;
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the task store
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error from the underlying file system, including short reads
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No active record carries this id
    #[error("Record {0} not found")]
    RecordNotFound(u32),

    /// The index table has no free slot left
    #[error("Index table is full (capacity {capacity})")]
    IndexFull { capacity: usize },

    /// The free list has no free slot left
    #[error("Free list is full (capacity {capacity})")]
    FreeListFull { capacity: usize },

    /// An index entry with this id already exists
    #[error("Duplicate record id {0}")]
    DuplicateId(u32),

    /// Offset does not address a record block in the data region
    #[error("Invalid block offset {0}")]
    InvalidOffset(BlockOffset),

    /// Malformed or incomplete record payload
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Data corruption detected (e.g., checksum mismatch)
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Invalid operation for the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Database file is not a task store or has an incompatible format
    #[error("Invalid database file: {0}")]
    InvalidDatabaseFile(String),
}

impl StoreError {
    /// Create a corruption error with a message
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create an invalid payload error
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    /// Create an invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Create an invalid database file error
    pub fn invalid_db(msg: impl Into<String>) -> Self {
        Self::InvalidDatabaseFile(msg.into())
    }

    /// Whether this error means the requested record does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}
