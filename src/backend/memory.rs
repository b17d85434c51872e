//! In-memory storage backend
//!
//! `StorageBackend` implementation over a guarded map. Reports no append
//! support, so it doubles as the segmented-buffer host profile: sessions on
//! this backend buffer chunks in memory and flush ordered segment files.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use super::storage::StorageBackend;

/// In-memory storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    folders: Mutex<HashSet<PathBuf>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a stored file, if present
    pub fn file(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().get(path).cloned()
    }

    /// Paths of every stored file, sorted
    pub fn file_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files.lock().keys().cloned().collect();
        paths.sort();
        paths
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no such file: {:?}", path))
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn supports_append(&self) -> bool {
        false
    }

    async fn exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.files.lock().contains_key(path) || self.folders.lock().contains(path))
    }

    async fn create_binary(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.files.lock().insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    async fn read_binary(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    async fn write_binary(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.files.lock().insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut files = self.files.lock();
        let data = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_path_buf(), data);
        Ok(())
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    async fn create_folder(&self, path: &Path) -> io::Result<()> {
        self.folders.lock().insert(path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_append_is_read_merge_write() {
        let storage = MemoryStorage::new();
        let path = Path::new("track.webm");

        storage.append_binary(path, b"one").await.unwrap();
        storage.append_binary(path, b"two").await.unwrap();

        assert_eq!(storage.read_binary(path).await.unwrap(), b"onetwo");
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let storage = MemoryStorage::new();
        let err = storage.read_binary(Path::new("missing")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_rename_moves_contents() {
        let storage = MemoryStorage::new();
        storage
            .create_binary(Path::new("a"), b"data")
            .await
            .unwrap();
        storage
            .rename(Path::new("a"), Path::new("b"))
            .await
            .unwrap();
        assert!(!storage.exists(Path::new("a")).await.unwrap());
        assert_eq!(storage.read_binary(Path::new("b")).await.unwrap(), b"data");
    }
}
