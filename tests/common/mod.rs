//! Shared test doubles: a scriptable media backend and a storage wrapper
//! that fails on demand.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use trackdeck::audio::AudioBuffer;
use trackdeck::backend::{
    AcquireError, AudioDeviceInfo, CaptureStream, DeviceKind, MediaBackend, MemoryStorage,
    StorageBackend, TrackEvent,
};

/// Scriptable media backend. Every opened stream emits the same chunk
/// script; per-device acquisition failures are consumed in order before
/// opens start succeeding.
pub struct MockMedia {
    supported: Vec<String>,
    devices: Vec<AudioDeviceInfo>,
    chunks: Vec<Vec<u8>>,
    acquire_failures: Mutex<HashMap<String, Vec<AcquireError>>>,
    decoded: Option<AudioBuffer>,
    releases: Arc<AtomicUsize>,
}

impl MockMedia {
    /// Backend that records webm/opus natively
    pub fn webm() -> Self {
        Self {
            supported: vec!["audio/webm;codecs=opus".to_string()],
            devices: Vec::new(),
            chunks: vec![b"abc".to_vec(), b"def".to_vec()],
            acquire_failures: Mutex::new(HashMap::new()),
            decoded: None,
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_devices(mut self, ids: &[&str]) -> Self {
        self.devices = ids
            .iter()
            .map(|id| AudioDeviceInfo {
                id: (*id).to_string(),
                name: format!("Mock {id}"),
                kind: DeviceKind::Input,
                is_default: false,
            })
            .collect();
        self
    }

    pub fn with_chunks(mut self, chunks: &[&[u8]]) -> Self {
        self.chunks = chunks.iter().map(|c| c.to_vec()).collect();
        self
    }

    /// What `decode` returns for any input
    pub fn with_decoded(mut self, buffer: AudioBuffer) -> Self {
        self.decoded = Some(buffer);
        self
    }

    /// Queue acquisition failures for one device ("default" for the
    /// unnamed default device); consumed front to back
    pub fn fail_acquire(self, device: &str, failures: Vec<AcquireError>) -> Self {
        self.acquire_failures
            .lock()
            .insert(device.to_string(), failures);
        self
    }

    /// Total `release` calls across all streams ever opened
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaBackend for MockMedia {
    async fn enumerate_devices(&self) -> io::Result<Vec<AudioDeviceInfo>> {
        Ok(self.devices.clone())
    }

    fn is_format_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|m| m == mime_type)
    }

    async fn open_stream(
        &self,
        device_id: Option<&str>,
        _sample_rate: Option<u32>,
    ) -> Result<Box<dyn CaptureStream>, AcquireError> {
        let key = device_id.unwrap_or("default").to_string();
        if let Some(queue) = self.acquire_failures.lock().get_mut(&key) {
            if !queue.is_empty() {
                return Err(queue.remove(0));
            }
        }
        Ok(Box::new(MockStream {
            device_id: key,
            chunks: self.chunks.clone(),
            sender: None,
            releases: Arc::clone(&self.releases),
            released: false,
        }))
    }

    async fn decode(&self, _data: &[u8]) -> Result<AudioBuffer, String> {
        self.decoded
            .clone()
            .ok_or_else(|| "no decoder scripted".to_string())
    }
}

/// Stream double: emits its whole chunk script when recording starts, then
/// holds the event sender open until `stop` (or `release`) closes it.
pub struct MockStream {
    device_id: String,
    chunks: Vec<Vec<u8>>,
    sender: Option<mpsc::UnboundedSender<TrackEvent>>,
    releases: Arc<AtomicUsize>,
    released: bool,
}

#[async_trait]
impl CaptureStream for MockStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn sample_rate(&self) -> u32 {
        44_100
    }

    async fn start_recorder(
        &mut self,
        _mime_type: &str,
        _bitrate: u32,
        _timeslice: Duration,
        events: mpsc::UnboundedSender<TrackEvent>,
    ) -> io::Result<()> {
        for chunk in &self.chunks {
            let _ = events.send(TrackEvent::Data(chunk.clone()));
        }
        self.sender = Some(events);
        Ok(())
    }

    async fn pause(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn resume(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn stop(&mut self) -> io::Result<()> {
        // Closing the sender is the stopped confirmation: the write queue
        // sees end-of-stream and drains
        self.sender = None;
        Ok(())
    }

    async fn release(&mut self) {
        self.sender = None;
        if !self.released {
            self.released = true;
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Storage wrapper that fails `remove` for any path containing a configured
/// substring; everything else delegates to in-memory storage.
pub struct FlakyStorage {
    pub inner: Arc<MemoryStorage>,
    fail_remove_containing: String,
}

impl FlakyStorage {
    pub fn failing_removes_containing(marker: &str) -> Self {
        Self {
            inner: Arc::new(MemoryStorage::new()),
            fail_remove_containing: marker.to_string(),
        }
    }
}

#[async_trait]
impl StorageBackend for FlakyStorage {
    fn supports_append(&self) -> bool {
        self.inner.supports_append()
    }

    async fn exists(&self, path: &Path) -> io::Result<bool> {
        self.inner.exists(path).await
    }

    async fn create_binary(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.inner.create_binary(path, data).await
    }

    async fn read_binary(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read_binary(path).await
    }

    async fn write_binary(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.inner.write_binary(path, data).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.inner.rename(from, to).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        if path.to_string_lossy().contains(&self.fail_remove_containing) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("remove refused: {:?}", path),
            ));
        }
        self.inner.remove(path).await
    }

    async fn create_folder(&self, path: &Path) -> io::Result<()> {
        self.inner.create_folder(path).await
    }
}
