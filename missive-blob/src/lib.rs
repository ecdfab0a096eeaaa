//! Content-addressable storage for mail header and body blocks
//!
//! Message bytes are stored under identifiers derived from their content, so
//! identical content saved by any number of concurrent producers lands in a
//! single stored blob. Backends:
//! - `memory`: in-memory storage for testing and transient use
//! - `file`: one file per blob for production use

pub mod backends;
pub mod config;
pub mod error;
pub mod id;
pub mod store;

pub use backends::{FileBlobStore, FileBlobStoreBuilder, MemoryBlobStore};
pub use config::{BlobConfig, MemoryBlobConfig};
pub use error::{BlobError, Result, ValidationError};
pub use id::{BlobId, BlobPartsId};
pub use store::{BlobStore, MailPartsStore};
