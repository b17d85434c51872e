//! Error types and handling
//!
//! Common error types used across the recording pipeline.

use crate::backend::media::AcquireError;
use std::path::PathBuf;
use thiserror::Error;

/// Recorder-wide error type
#[derive(Error, Debug)]
pub enum RecorderError {
    /// The requested format (or every compressed intermediate for it) is
    /// unsupported by the media backend. Raised before any hardware is touched.
    #[error("unsupported recording format '{format}': {reason}")]
    Capability { format: String, reason: String },

    /// A terminal device failure: permission denied, device gone, or
    /// constraints that cannot be satisfied. Never retried, never falls back
    /// to a different device.
    #[error("cannot open capture device '{device_id}': {source}")]
    DeviceAccess {
        device_id: String,
        #[source]
        source: AcquireError,
    },

    /// A storage read/write/append/rename/remove failed.
    #[error("storage error at {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Decoding captured bytes to PCM failed during finalize.
    #[error("failed to decode captured audio: {0}")]
    Decode(String),

    /// Intermediate cleanup after building a merged/converted artifact failed.
    /// The artifact has been rolled back; `leftover` names every path that
    /// could not be removed.
    #[error("cleanup after finalize failed, rolled back {artifact:?}; leftover intermediates: {leftover:?}")]
    FinalizeIntegrity {
        artifact: PathBuf,
        leftover: Vec<PathBuf>,
    },

    /// An operation was invoked from a state that does not allow it.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl RecorderError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

impl From<RecorderError> for String {
    fn from(e: RecorderError) -> String {
        e.to_string()
    }
}

/// Result type alias using RecorderError
pub type RecorderResult<T> = Result<T, RecorderError>;
