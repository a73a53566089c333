//! Storage for uploaded document binaries.

pub mod filesystem;

pub use filesystem::FileBlobStore;

use crate::error::StorageError;

/// Where a blob ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Name the client uploaded the file under.
    pub original_name: String,
    /// Name the store chose for it.
    pub saved_as: String,
    /// Opaque reference a print worker uses to fetch the file.
    pub storage_ref: String,
}

/// Accepts uploaded binaries and hands back a reference to them.
pub trait BlobStore: Send + Sync {
    fn put(&self, original_name: &str, content: &[u8]) -> Result<StoredBlob, StorageError>;

    /// Deletes a blob written by `put`. Removing a blob that is already gone
    /// succeeds.
    fn remove(&self, blob: &StoredBlob) -> Result<(), StorageError>;
}
