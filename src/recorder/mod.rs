//! Recording system module
//!
//! This module implements the multi-track recording pipeline:
//! - PersistenceStrategy for incremental per-track persistence
//! - RecordingSession to orchestrate capture, pause/resume, and finalize

pub mod persistence;
pub mod session;
pub mod state;

pub use persistence::{PersistenceStrategy, TrackData, SEGMENT_FLUSH_THRESHOLD};
pub use session::{RecordingSession, SessionEvent};
pub use state::{PersistenceMode, RecorderStatus, SessionOutcome, TrackState, TrackSummary};
