//! Backend storage implementations for the blob store
//!
//! - `memory`: in-memory storage for testing and transient use
//! - `file`: file-based storage for production use

pub mod file;
pub mod memory;

pub use file::{FileBlobStore, FileBlobStoreBuilder};
pub use memory::MemoryBlobStore;
