//! Media backend trait
//!
//! Platform-agnostic seam for device enumeration, capture stream
//! acquisition, time-sliced recording, and compressed-audio decoding.
//! Hardware integrations implement these traits; the pipeline itself never
//! talks to a capture API directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::audio::AudioBuffer;

/// Kind of audio device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Input,
    Output,
}

/// Information about an audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Input or output
    pub kind: DeviceKind,

    /// Whether this is the default device of its kind
    pub is_default: bool,
}

/// Stream acquisition failure classification.
///
/// Transient failures are retried by the acquisition layer; terminal ones
/// abort immediately with no fallback to a different device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    /// Device busy or the request was interrupted; worth retrying
    #[error("device busy or request interrupted: {0}")]
    Transient(String),

    /// The user or OS denied capture permission
    #[error("capture permission denied")]
    PermissionDenied,

    /// No device with the requested ID exists
    #[error("device not found")]
    NotFound,

    /// The requested constraints (e.g. sample rate) cannot be satisfied
    #[error("requested constraints cannot be satisfied")]
    Overconstrained,
}

impl AcquireError {
    /// Whether the bounded retry policy applies to this failure
    pub fn is_transient(&self) -> bool {
        matches!(self, AcquireError::Transient(_))
    }
}

/// Event delivered from a live recorder to its track's write queue
#[derive(Debug, Clone)]
pub enum TrackEvent {
    /// A captured chunk, emitted once per timeslice
    Data(Vec<u8>),

    /// A non-fatal recorder error; capture of other chunks continues
    Error(String),
}

/// One acquired capture stream with its recorder.
///
/// Lifecycle: `start_recorder` once, then any number of `pause`/`resume`
/// cycles, then `stop` (which flushes the final chunk, awaits the stopped
/// confirmation, and closes the event sender), then `release`. `release`
/// must be safe to call at any point and must be idempotent.
#[async_trait]
pub trait CaptureStream: Send {
    /// ID of the device this stream captures from
    fn device_id(&self) -> &str;

    /// Negotiated sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Begin time-sliced recording into `events`
    async fn start_recorder(
        &mut self,
        mime_type: &str,
        bitrate: u32,
        timeslice: Duration,
        events: mpsc::UnboundedSender<TrackEvent>,
    ) -> io::Result<()>;

    /// Suspend chunk emission without releasing the stream
    async fn pause(&mut self) -> io::Result<()>;

    /// Resume chunk emission
    async fn resume(&mut self) -> io::Result<()>;

    /// Stop recording and await the recorder's stopped confirmation
    async fn stop(&mut self) -> io::Result<()>;

    /// Release the underlying hardware
    async fn release(&mut self);
}

impl std::fmt::Debug for dyn CaptureStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureStream")
            .field("device_id", &self.device_id())
            .finish_non_exhaustive()
    }
}

/// Host media seam: devices, streams, and decoding.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Enumerate audio devices visible to the host
    async fn enumerate_devices(&self) -> io::Result<Vec<AudioDeviceInfo>>;

    /// Whether the host recorder can capture the given MIME type
    fn is_format_supported(&self, mime_type: &str) -> bool;

    /// Whether the host recorder supports the given capture sample rate
    fn is_sample_rate_supported(&self, _sample_rate: u32) -> bool {
        true
    }

    /// Open a capture stream on a device (None = default device) at an
    /// optional requested sample rate
    async fn open_stream(
        &self,
        device_id: Option<&str>,
        sample_rate: Option<u32>,
    ) -> Result<Box<dyn CaptureStream>, AcquireError>;

    /// Decode captured container bytes to planar PCM
    async fn decode(&self, data: &[u8]) -> Result<AudioBuffer, String>;
}
