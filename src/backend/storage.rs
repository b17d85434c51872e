//! Storage backend trait
//!
//! Minimal binary-file interface the recording pipeline needs from a host:
//! whole-file reads/writes, an append-equivalent, rename and remove. No
//! transactional guarantees are required of implementations; the per-track
//! write queue is the only write-race protection the pipeline relies on.

use async_trait::async_trait;
use std::io;
use std::path::Path;

/// Host storage seam.
///
/// `supports_append` decides the persistence strategy for a session:
/// backends with an efficient incremental append get one growing temp file
/// per track, everything else gets buffered segment files.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Whether this backend can append to an existing file without
    /// rewriting it
    fn supports_append(&self) -> bool;

    /// Check whether a path exists
    async fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Create a new binary file with the given contents
    async fn create_binary(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Read a binary file in full
    async fn read_binary(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Overwrite a binary file in full
    async fn write_binary(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Append bytes to a file.
    ///
    /// The default implementation is a read-merge-write, which is the
    /// correct fallback for backends without native append: the resulting
    /// byte stream still equals exact arrival-order concatenation because
    /// each track serializes its writes.
    async fn append_binary(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut existing = if self.exists(path).await? {
            self.read_binary(path).await?
        } else {
            Vec::new()
        };
        existing.extend_from_slice(data);
        self.write_binary(path, &existing).await
    }

    /// Rename a file
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove a file
    async fn remove(&self, path: &Path) -> io::Result<()>;

    /// Create a folder (and any missing parents)
    async fn create_folder(&self, path: &Path) -> io::Result<()>;
}
