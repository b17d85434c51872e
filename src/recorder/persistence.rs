//! Per-track incremental persistence
//!
//! Each track owns one persistence strategy and one writer task. The writer
//! task consumes the track's recorder events from a single mpsc queue, so
//! writes within a track can never interleave or reorder, while different
//! tracks proceed fully in parallel with no shared lock.
//!
//! Two strategies exist, selected once at session start from the storage
//! backend's append capability:
//! - `AppendFileStrategy`: one growing temp file, appended per chunk.
//! - `SegmentedBufferStrategy`: chunks accumulate in memory and flush to a
//!   new ordered segment file whenever buffered bytes cross the threshold.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::backend::media::TrackEvent;
use crate::backend::storage::StorageBackend;
use crate::error::{RecorderError, RecorderResult};

use super::session::SessionEvent;
use super::state::{PersistenceMode, TrackState, TrackSummary};

/// Buffered bytes that trigger a segment flush (50 MiB)
pub const SEGMENT_FLUSH_THRESHOLD: usize = 50 * 1024 * 1024;

/// Where a track's captured bytes ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackData {
    /// One temp file holding the whole track
    TempFile(PathBuf),
    /// Ordered segment files; concatenated they equal the track's bytes
    Segments(Vec<PathBuf>),
}

impl TrackData {
    /// Every on-disk path backing this track
    pub fn paths(&self) -> Vec<PathBuf> {
        match self {
            TrackData::TempFile(path) => vec![path.clone()],
            TrackData::Segments(paths) => paths.clone(),
        }
    }

    /// The single backing file, when there is exactly one
    pub fn single_path(&self) -> Option<&Path> {
        match self {
            TrackData::TempFile(path) => Some(path),
            TrackData::Segments(paths) if paths.len() == 1 => Some(&paths[0]),
            TrackData::Segments(_) => None,
        }
    }

    /// Read the track's bytes back in capture order
    pub async fn read_all(&self, storage: &dyn StorageBackend) -> RecorderResult<Vec<u8>> {
        let mut out = Vec::new();
        for path in self.paths() {
            let bytes = storage
                .read_binary(&path)
                .await
                .map_err(|e| RecorderError::persistence(&path, e))?;
            out.extend_from_slice(&bytes);
        }
        Ok(out)
    }
}

/// One track's persistence strategy.
///
/// Exactly one strategy is active per track for the session's lifetime.
#[async_trait]
pub trait PersistenceStrategy: Send {
    /// Which mode this strategy implements
    fn mode(&self) -> PersistenceMode;

    /// Called at session start, before any capture. Append-file pre-creates
    /// its empty temp file here so unwritable storage fails the start, not
    /// minutes into capture.
    async fn prepare(&mut self) -> RecorderResult<()>;

    /// Persist one chunk. Chunks arrive in capture order on a serialized
    /// queue; the persisted byte stream must equal their concatenation.
    async fn write_chunk(&mut self, chunk: &[u8]) -> RecorderResult<()>;

    /// Flush anything still buffered and hand back the on-disk data
    async fn finish(&mut self) -> RecorderResult<TrackData>;
}

/// Build the strategy for a track
pub fn strategy_for(
    mode: PersistenceMode,
    storage: Arc<dyn StorageBackend>,
    base: PathBuf,
    extension: &str,
) -> Box<dyn PersistenceStrategy> {
    match mode {
        PersistenceMode::AppendFile => {
            Box::new(AppendFileStrategy::new(storage, base, extension))
        }
        PersistenceMode::SegmentedBuffer => {
            Box::new(SegmentedBufferStrategy::new(storage, base, extension))
        }
    }
}

/// Append-per-chunk persistence into one temp file
pub struct AppendFileStrategy {
    storage: Arc<dyn StorageBackend>,
    path: PathBuf,
}

impl AppendFileStrategy {
    pub fn new(storage: Arc<dyn StorageBackend>, base: PathBuf, extension: &str) -> Self {
        let mut name = base.into_os_string();
        name.push(format!(".{extension}.part"));
        Self {
            storage,
            path: PathBuf::from(name),
        }
    }
}

#[async_trait]
impl PersistenceStrategy for AppendFileStrategy {
    fn mode(&self) -> PersistenceMode {
        PersistenceMode::AppendFile
    }

    async fn prepare(&mut self) -> RecorderResult<()> {
        self.storage
            .create_binary(&self.path, &[])
            .await
            .map_err(|e| RecorderError::persistence(&self.path, e))
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> RecorderResult<()> {
        self.storage
            .append_binary(&self.path, chunk)
            .await
            .map_err(|e| RecorderError::persistence(&self.path, e))
    }

    async fn finish(&mut self) -> RecorderResult<TrackData> {
        Ok(TrackData::TempFile(self.path.clone()))
    }
}

/// Buffered persistence with ordered segment files
pub struct SegmentedBufferStrategy {
    storage: Arc<dyn StorageBackend>,
    base: PathBuf,
    extension: String,
    flush_threshold: usize,
    buffered_chunks: Vec<Vec<u8>>,
    buffered_bytes: usize,
    segment_paths: Vec<PathBuf>,
}

impl SegmentedBufferStrategy {
    pub fn new(storage: Arc<dyn StorageBackend>, base: PathBuf, extension: &str) -> Self {
        Self::with_flush_threshold(storage, base, extension, SEGMENT_FLUSH_THRESHOLD)
    }

    pub fn with_flush_threshold(
        storage: Arc<dyn StorageBackend>,
        base: PathBuf,
        extension: &str,
        flush_threshold: usize,
    ) -> Self {
        Self {
            storage,
            base,
            extension: extension.to_string(),
            flush_threshold,
            buffered_chunks: Vec::new(),
            buffered_bytes: 0,
            segment_paths: Vec::new(),
        }
    }

    /// Bytes currently buffered in memory
    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    /// Segment files flushed so far
    pub fn segment_count(&self) -> usize {
        self.segment_paths.len()
    }

    fn next_segment_path(&self) -> PathBuf {
        let mut name = self.base.clone().into_os_string();
        name.push(format!(
            ".seg{:03}.{}.part",
            self.segment_paths.len(),
            self.extension
        ));
        PathBuf::from(name)
    }

    async fn flush(&mut self) -> RecorderResult<()> {
        if self.buffered_chunks.is_empty() {
            return Ok(());
        }
        let path = self.next_segment_path();
        let mut data = Vec::with_capacity(self.buffered_bytes);
        for chunk in &self.buffered_chunks {
            data.extend_from_slice(chunk);
        }
        self.storage
            .create_binary(&path, &data)
            .await
            .map_err(|e| RecorderError::persistence(&path, e))?;

        tracing::debug!("flushed {} buffered bytes to {:?}", data.len(), path);
        self.segment_paths.push(path);
        self.buffered_chunks.clear();
        self.buffered_bytes = 0;
        Ok(())
    }
}

#[async_trait]
impl PersistenceStrategy for SegmentedBufferStrategy {
    fn mode(&self) -> PersistenceMode {
        PersistenceMode::SegmentedBuffer
    }

    async fn prepare(&mut self) -> RecorderResult<()> {
        Ok(())
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> RecorderResult<()> {
        self.buffered_bytes += chunk.len();
        self.buffered_chunks.push(chunk.to_vec());
        if self.buffered_bytes >= self.flush_threshold {
            self.flush().await?;
        }
        Ok(())
    }

    async fn finish(&mut self) -> RecorderResult<TrackData> {
        self.flush().await?;
        Ok(TrackData::Segments(self.segment_paths.clone()))
    }
}

/// Spawn the serialized writer task for one track.
///
/// The task consumes recorder events until the sender side closes (which
/// happens when the recorder stops), then flushes the strategy and reports
/// what it persisted. Per-chunk failures are logged and surfaced as
/// warnings; they never stop the queue or other tracks.
pub(crate) fn spawn_track_writer(
    state: TrackState,
    mut strategy: Box<dyn PersistenceStrategy>,
    mut events: mpsc::UnboundedReceiver<TrackEvent>,
    notices: broadcast::Sender<SessionEvent>,
) -> JoinHandle<TrackSummary> {
    tokio::spawn(async move {
        let mut bytes_written = 0u64;
        let mut chunks_received = 0u64;
        let mut write_failures = 0u32;
        let mut last_error = None;

        while let Some(event) = events.recv().await {
            match event {
                TrackEvent::Data(chunk) => {
                    chunks_received += 1;
                    match strategy.write_chunk(&chunk).await {
                        Ok(()) => bytes_written += chunk.len() as u64,
                        Err(e) => {
                            write_failures += 1;
                            last_error = Some(e.to_string());
                            tracing::warn!(
                                "track {} chunk write failed: {}",
                                state.track_number,
                                e
                            );
                            let _ = notices.send(SessionEvent::TrackWarning {
                                track_number: state.track_number,
                                message: e.to_string(),
                            });
                        }
                    }
                }
                TrackEvent::Error(message) => {
                    tracing::warn!("track {} recorder error: {}", state.track_number, message);
                    last_error = Some(message.clone());
                    let _ = notices.send(SessionEvent::TrackWarning {
                        track_number: state.track_number,
                        message,
                    });
                }
            }
        }

        let data = match strategy.finish().await {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!("track {} final flush failed: {}", state.track_number, e);
                last_error = Some(e.to_string());
                let _ = notices.send(SessionEvent::TrackWarning {
                    track_number: state.track_number,
                    message: e.to_string(),
                });
                None
            }
        };

        TrackSummary {
            state,
            data,
            bytes_written,
            chunks_received,
            write_failures,
            last_error,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryStorage;

    fn segmented(
        storage: &Arc<MemoryStorage>,
        threshold: usize,
    ) -> SegmentedBufferStrategy {
        SegmentedBufferStrategy::with_flush_threshold(
            Arc::clone(storage) as Arc<dyn StorageBackend>,
            PathBuf::from("tmp/take-track1"),
            "webm",
            threshold,
        )
    }

    #[tokio::test]
    async fn test_append_strategy_concatenates_in_order() {
        let storage = Arc::new(MemoryStorage::new());
        let mut strategy = AppendFileStrategy::new(
            Arc::clone(&storage) as Arc<dyn StorageBackend>,
            PathBuf::from("tmp/take-track1"),
            "webm",
        );

        strategy.prepare().await.unwrap();
        strategy.write_chunk(b"abc").await.unwrap();
        strategy.write_chunk(b"def").await.unwrap();
        let data = strategy.finish().await.unwrap();

        let path = data.single_path().unwrap().to_path_buf();
        assert_eq!(path, PathBuf::from("tmp/take-track1.webm.part"));
        assert_eq!(storage.file(&path).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn test_prepare_creates_empty_temp_file() {
        let storage = Arc::new(MemoryStorage::new());
        let mut strategy = AppendFileStrategy::new(
            Arc::clone(&storage) as Arc<dyn StorageBackend>,
            PathBuf::from("take-track2"),
            "ogg",
        );

        strategy.prepare().await.unwrap();
        assert_eq!(
            storage.file(Path::new("take-track2.ogg.part")).unwrap(),
            b""
        );
    }

    #[tokio::test]
    async fn test_segment_flush_at_threshold_resets_buffer() {
        let storage = Arc::new(MemoryStorage::new());
        let mut strategy = segmented(&storage, 6);

        strategy.write_chunk(b"abc").await.unwrap();
        assert_eq!(strategy.buffered_bytes(), 3);
        assert_eq!(strategy.segment_count(), 0);

        // Crossing the threshold flushes and resets to zero
        strategy.write_chunk(b"def").await.unwrap();
        assert_eq!(strategy.buffered_bytes(), 0);
        assert_eq!(strategy.segment_count(), 1);

        strategy.write_chunk(b"g").await.unwrap();
        let data = strategy.finish().await.unwrap();

        match &data {
            TrackData::Segments(paths) => assert_eq!(paths.len(), 2),
            other => panic!("expected segments, got {other:?}"),
        }
        let bytes = data
            .read_all(storage.as_ref() as &dyn StorageBackend)
            .await
            .unwrap();
        assert_eq!(bytes, b"abcdefg");
    }

    #[tokio::test]
    async fn test_finish_without_data_yields_no_segments() {
        let storage = Arc::new(MemoryStorage::new());
        let mut strategy = segmented(&storage, 1024);
        let data = strategy.finish().await.unwrap();
        assert_eq!(data, TrackData::Segments(vec![]));
    }

    #[tokio::test]
    async fn test_writer_task_drains_queue_and_reports() {
        let storage = Arc::new(MemoryStorage::new());
        let strategy = strategy_for(
            PersistenceMode::SegmentedBuffer,
            Arc::clone(&storage) as Arc<dyn StorageBackend>,
            PathBuf::from("take-track1"),
            "webm",
        );
        let state = TrackState {
            track_number: 1,
            device_id: None,
            source_name: "default".to_string(),
            mode: PersistenceMode::SegmentedBuffer,
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let (notice_tx, _) = broadcast::channel(16);

        let handle = spawn_track_writer(state, strategy, rx, notice_tx);
        tx.send(TrackEvent::Data(b"one".to_vec())).unwrap();
        tx.send(TrackEvent::Data(b"two".to_vec())).unwrap();
        drop(tx);

        let summary = handle.await.unwrap();
        assert_eq!(summary.chunks_received, 2);
        assert_eq!(summary.bytes_written, 6);
        assert_eq!(summary.write_failures, 0);
        let bytes = summary
            .data
            .unwrap()
            .read_all(storage.as_ref() as &dyn StorageBackend)
            .await
            .unwrap();
        assert_eq!(bytes, b"onetwo");
    }

    #[tokio::test]
    async fn test_recorder_error_is_non_fatal() {
        let storage = Arc::new(MemoryStorage::new());
        let strategy = strategy_for(
            PersistenceMode::SegmentedBuffer,
            Arc::clone(&storage) as Arc<dyn StorageBackend>,
            PathBuf::from("take-track1"),
            "webm",
        );
        let state = TrackState {
            track_number: 1,
            device_id: None,
            source_name: "default".to_string(),
            mode: PersistenceMode::SegmentedBuffer,
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let (notice_tx, mut notice_rx) = broadcast::channel(16);

        let handle = spawn_track_writer(state, strategy, rx, notice_tx);
        tx.send(TrackEvent::Data(b"a".to_vec())).unwrap();
        tx.send(TrackEvent::Error("glitch".to_string())).unwrap();
        tx.send(TrackEvent::Data(b"b".to_vec())).unwrap();
        drop(tx);

        let summary = handle.await.unwrap();
        assert_eq!(summary.chunks_received, 2);
        assert_eq!(summary.bytes_written, 2);
        assert_eq!(summary.last_error.as_deref(), Some("glitch"));

        match notice_rx.try_recv().unwrap() {
            SessionEvent::TrackWarning {
                track_number,
                message,
            } => {
                assert_eq!(track_number, 1);
                assert_eq!(message, "glitch");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
