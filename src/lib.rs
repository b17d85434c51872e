//! trackdeck - Multi-track live audio recording pipeline.
//!
//! Captures one or more audio device streams concurrently, persists each
//! track's compressed chunks incrementally as they arrive, and finalizes
//! captured data into per-track files or a single merged artifact. Hardware
//! access and storage go through the injected [`backend::MediaBackend`] and
//! [`backend::StorageBackend`] seams, so the pipeline itself is host-agnostic
//! and fully testable in memory.

pub mod audio;
pub mod backend;
pub mod capability;
pub mod config;
pub mod device;
pub mod error;
pub mod finalize;
pub mod recorder;

pub use backend::{FsStorage, MediaBackend, MemoryStorage, StorageBackend};
pub use capability::{detect_capabilities, resolve_capture_format, CapabilityReport};
pub use config::{OutputFormat, OutputMode, RecorderConfig};
pub use error::{RecorderError, RecorderResult};
pub use recorder::{RecorderStatus, RecordingSession, SessionEvent, SessionOutcome};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging for binaries embedding the pipeline.
///
/// Honors `RUST_LOG`; defaults to debug-level output for this crate.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trackdeck=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("trackdeck v{}", env!("CARGO_PKG_VERSION"));
}
