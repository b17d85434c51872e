//! Recording state types
//!
//! Defines the session state machine states and per-track records.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::persistence::TrackData;

/// Current state of the recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderStatus {
    /// No recording in progress
    Idle,
    /// Currently recording
    Recording,
    /// Recording is paused
    Paused,
}

impl Default for RecorderStatus {
    fn default() -> Self {
        Self::Idle
    }
}

/// How a track persists its chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PersistenceMode {
    /// One growing temp file, appended per chunk
    AppendFile,
    /// In-memory buffering with ordered segment files flushed at a threshold
    SegmentedBuffer,
}

/// Descriptor for one active track
///
/// Tracks are numbered 1..N, unique and contiguous; the persistence mode is
/// fixed for the session's lifetime.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackState {
    /// Track number, 1-based
    pub track_number: u32,

    /// Source device ID (None = backend default)
    pub device_id: Option<String>,

    /// Human-readable source name, used for file naming when enabled
    pub source_name: String,

    /// Persistence strategy chosen at start
    pub mode: PersistenceMode,
}

/// What one track's writer produced by the time its queue drained
#[derive(Debug)]
pub struct TrackSummary {
    /// The track's descriptor
    pub state: TrackState,

    /// Persisted data, or None when the write pipeline lost it
    pub data: Option<TrackData>,

    /// Total bytes successfully persisted
    pub bytes_written: u64,

    /// Chunks that arrived from the recorder
    pub chunks_received: u64,

    /// Chunk writes that failed (capture continued regardless)
    pub write_failures: u32,

    /// Last write/flush error, if any
    pub last_error: Option<String>,
}

/// Result of a completed recording
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    /// Final artifact paths, in track order
    pub files: Vec<PathBuf>,

    /// MIME type of the produced artifacts
    pub mime_type: String,

    /// Number of tracks that were captured
    pub track_count: usize,

    /// Recording duration in milliseconds (pauses excluded)
    pub duration_ms: f64,
}
