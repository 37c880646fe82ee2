//! Storage layer: block I/O and metadata management.
//!
//! This module reads and writes fixed-size blocks in the database file,
//! defines the file header, and keeps the in-memory index table and free
//! list that mirror the preallocated metadata regions.

mod block_file;
mod file_header;
pub mod freelist;
pub mod index;
mod manager;

pub use block_file::{BlockFile, BlockStorage};
pub use file_header::{FileHeader, FORMAT_VERSION, MAGIC};
pub use freelist::{FreeBlock, FreeList};
pub use index::{IndexEntry, IndexTable};
pub use manager::IndexManager;
