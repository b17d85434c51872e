//! Recording session orchestration
//!
//! The session state machine: Idle → start → Recording ⇄ pause/resume ⇄
//! Paused → stop → Idle. One session owns N track pipelines (stream +
//! serialized writer task), routes recorder events to persistence, and
//! drives finalize. Hardware release and the return to Idle never depend on
//! finalize succeeding.

use chrono::Local;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::backend::media::{AcquireError, CaptureStream, MediaBackend};
use crate::backend::storage::StorageBackend;
use crate::capability::{self, FormatResolution};
use crate::config::{OutputFormat, RecorderConfig};
use crate::device::{acquire_many, RetryPolicy};
use crate::error::{RecorderError, RecorderResult};
use crate::finalize::{destination_dir, Finalizer};

use super::persistence::{spawn_track_writer, strategy_for};
use super::state::{PersistenceMode, RecorderStatus, SessionOutcome, TrackState, TrackSummary};

/// Events emitted during recording
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Recording started
    Started,
    /// Recording stopped
    Stopped,
    /// Recording paused
    Paused,
    /// Recording resumed
    Resumed,
    /// Short user-facing notice
    Notice(String),
    /// A non-fatal per-track problem; other tracks continue
    TrackWarning { track_number: u32, message: String },
}

struct ActiveTrack {
    state: TrackState,
    stream: Box<dyn CaptureStream>,
    writer: JoinHandle<TrackSummary>,
}

struct ActiveSession {
    /// Timestamp token used in final file names
    token: String,
    resolution: FormatResolution,
    dest_dir: PathBuf,
    started_at: Instant,
    paused: Duration,
    pause_started: Option<Instant>,
    tracks: Vec<ActiveTrack>,
}

/// Orchestrates one or more concurrent capture tracks
pub struct RecordingSession {
    storage: Arc<dyn StorageBackend>,
    media: Arc<dyn MediaBackend>,
    config: RecorderConfig,
    retry_policy: RetryPolicy,
    status: Arc<RwLock<RecorderStatus>>,
    event_tx: broadcast::Sender<SessionEvent>,
    document_dir: Option<PathBuf>,
    active: Option<ActiveSession>,
}

impl RecordingSession {
    /// Create a new session over the given backends
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        media: Arc<dyn MediaBackend>,
        config: RecorderConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            storage,
            media,
            config,
            retry_policy: RetryPolicy::default(),
            status: Arc::new(RwLock::new(RecorderStatus::Idle)),
            event_tx,
            document_dir: None,
            active: None,
        }
    }

    /// Get the current session status
    pub fn status(&self) -> RecorderStatus {
        *self.status.read()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Descriptors for the currently active tracks
    pub fn tracks(&self) -> Vec<TrackState> {
        self.active
            .as_ref()
            .map(|a| a.tracks.iter().map(|t| t.state.clone()).collect())
            .unwrap_or_default()
    }

    /// Current configuration
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Replace the configuration. Only allowed while idle.
    pub fn set_config(&mut self, config: RecorderConfig) -> RecorderResult<()> {
        if self.status() != RecorderStatus::Idle {
            return Err(RecorderError::InvalidState(
                "cannot change configuration while recording".to_string(),
            ));
        }
        self.config = config;
        Ok(())
    }

    /// Override the acquisition retry policy
    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.retry_policy = policy;
    }

    /// Provide the active document's directory for document-relative
    /// destinations
    pub fn set_document_dir(&mut self, dir: Option<PathBuf>) {
        self.document_dir = dir;
    }

    /// Recording duration so far in milliseconds, pauses excluded
    pub fn duration_ms(&self) -> f64 {
        let Some(active) = &self.active else {
            return 0.0;
        };
        let mut paused = active.paused;
        if let Some(pause_start) = active.pause_started {
            paused += pause_start.elapsed();
        }
        active
            .started_at
            .elapsed()
            .saturating_sub(paused)
            .as_secs_f64()
            * 1000.0
    }

    /// Start recording.
    ///
    /// Resolves and validates the capture format, checks that every
    /// configured device is still enumerable, acquires all streams, sets up
    /// per-track persistence, and begins time-sliced capture. On any failure
    /// every stream opened so far is released and the session stays Idle.
    pub async fn start(&mut self) -> RecorderResult<()> {
        if self.status() != RecorderStatus::Idle {
            return Err(self.report(RecorderError::InvalidState(
                "can only start from idle state".to_string(),
            )));
        }

        match self.start_inner().await {
            Ok(active) => {
                let track_count = active.tracks.len();
                tracing::info!(
                    "recording started: {} track(s), capture format '{}'",
                    track_count,
                    active.resolution.capture_mime
                );
                self.active = Some(active);
                self.set_status(RecorderStatus::Recording);
                let _ = self.event_tx.send(SessionEvent::Started);
                self.notify(format!("Recording started ({track_count} track(s))"));
                Ok(())
            }
            Err(e) => Err(self.report(e)),
        }
    }

    async fn start_inner(&mut self) -> RecorderResult<ActiveSession> {
        self.config
            .validate()
            .map_err(RecorderError::InvalidState)?;

        // Fail fast on format problems before any hardware is touched
        let resolution = capability::resolve_capture_format(self.media.as_ref(), self.config.format)?;

        let sources = self.config.sources();
        let devices = match self.media.enumerate_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                // Acquisition still reports NotFound per device, so a failed
                // enumeration only costs the up-front availability check
                tracing::warn!("device enumeration failed: {}", e);
                Vec::new()
            }
        };
        if !devices.is_empty() {
            for source in &sources {
                if let Some(id) = &source.device_id {
                    if !devices.iter().any(|d| d.id == *id) {
                        return Err(RecorderError::DeviceAccess {
                            device_id: id.clone(),
                            source: AcquireError::NotFound,
                        });
                    }
                }
            }
        }

        let dest_dir = destination_dir(&self.config.destination, self.document_dir.as_deref())?;
        if !self
            .storage
            .exists(&dest_dir)
            .await
            .map_err(|e| RecorderError::persistence(&dest_dir, e))?
        {
            self.storage
                .create_folder(&dest_dir)
                .await
                .map_err(|e| RecorderError::persistence(&dest_dir, e))?;
        }

        let mut pending = acquire_many(
            Arc::clone(&self.media),
            &sources,
            Some(self.config.sample_rate),
            self.retry_policy,
        )
        .await?;

        let token = Local::now().format("%Y%m%d-%H%M%S").to_string();
        let run_id = Uuid::new_v4().simple().to_string();
        let mode = if self.storage.supports_append() {
            PersistenceMode::AppendFile
        } else {
            PersistenceMode::SegmentedBuffer
        };
        tracing::debug!("session {} using {:?} persistence", token, mode);

        let timeslice = Duration::from_millis(self.config.timeslice_ms);
        let mut tracks: Vec<ActiveTrack> = Vec::with_capacity(sources.len());
        let mut failure: Option<RecorderError> = None;

        for (index, source) in sources.iter().enumerate() {
            let mut stream = pending.remove(0);
            let track_number = (index + 1) as u32;
            let source_name = source
                .label
                .clone()
                .or_else(|| {
                    source.device_id.as_ref().and_then(|id| {
                        devices.iter().find(|d| &d.id == id).map(|d| d.name.clone())
                    })
                })
                .unwrap_or_else(|| stream.device_id().to_string());

            let state = TrackState {
                track_number,
                device_id: source.device_id.clone(),
                source_name,
                mode,
            };

            // Temp artifacts live next to the final destination so a crashed
            // session leaves something discoverable for manual recovery
            let base = dest_dir.join(format!("{}-{}-track{}", token, &run_id[..8], track_number));
            let mut strategy = strategy_for(
                mode,
                Arc::clone(&self.storage),
                base,
                &resolution.capture_extension,
            );
            if let Err(e) = strategy.prepare().await {
                stream.release().await;
                failure = Some(e);
                break;
            }

            let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
            let writer = spawn_track_writer(state.clone(), strategy, chunk_rx, self.event_tx.clone());

            if let Err(e) = stream
                .start_recorder(
                    &resolution.capture_mime,
                    self.config.bitrate,
                    timeslice,
                    chunk_tx,
                )
                .await
            {
                stream.release().await;
                failure = Some(RecorderError::DeviceAccess {
                    device_id: stream.device_id().to_string(),
                    source: AcquireError::Transient(format!("recorder start failed: {e}")),
                });
                break;
            }

            tracks.push(ActiveTrack {
                state,
                stream,
                writer,
            });
        }

        if let Some(error) = failure {
            // Wind down anything that already started; temp artifacts stay
            // on disk like any other teardown
            for track in &mut tracks {
                if let Err(e) = track.stream.stop().await {
                    tracing::warn!(
                        "track {} recorder stop during rollback failed: {}",
                        track.state.track_number,
                        e
                    );
                }
            }
            for mut track in tracks {
                track.stream.release().await;
                let _ = track.writer.await;
            }
            for mut stream in pending {
                stream.release().await;
            }
            return Err(error);
        }

        Ok(ActiveSession {
            token,
            resolution,
            dest_dir,
            started_at: Instant::now(),
            paused: Duration::ZERO,
            pause_started: None,
            tracks,
        })
    }

    /// Stop recording and finalize.
    ///
    /// Stops every recorder, drains every track's write queue, then runs the
    /// finalizer. Streams are released and the session returns to Idle
    /// regardless of the finalize outcome.
    pub async fn stop(&mut self) -> RecorderResult<SessionOutcome> {
        if self.status() == RecorderStatus::Idle {
            return Err(self.report(RecorderError::InvalidState(
                "no recording in progress".to_string(),
            )));
        }
        let Some(mut active) = self.active.take() else {
            self.set_status(RecorderStatus::Idle);
            return Err(self.report(RecorderError::InvalidState(
                "no active session to stop".to_string(),
            )));
        };

        tracing::info!("stopping recording session {}", active.token);
        if let Some(pause_start) = active.pause_started.take() {
            active.paused += pause_start.elapsed();
        }

        let mut streams = Vec::with_capacity(active.tracks.len());
        let mut writers = Vec::with_capacity(active.tracks.len());
        for track in active.tracks {
            streams.push((track.state.track_number, track.stream));
            writers.push(track.writer);
        }

        // Signal stop on every recorder and await each confirmation; the
        // final chunk is flushed into the write queue before it closes
        for (track_number, stream) in &mut streams {
            if let Err(e) = stream.stop().await {
                tracing::warn!("track {} recorder stop failed: {}", track_number, e);
            }
        }

        // Drain every track's pending writes
        let mut summaries: Vec<TrackSummary> = Vec::with_capacity(writers.len());
        for writer in writers {
            match writer.await {
                Ok(summary) => summaries.push(summary),
                Err(e) => tracing::error!("track writer task failed: {}", e),
            }
        }

        let finalizer = Finalizer::new(
            self.storage.as_ref(),
            self.media.as_ref(),
            &self.config,
            &active.resolution,
            &self.event_tx,
        );
        let finalize_result = finalizer
            .run(&active.dest_dir, &active.token, &summaries)
            .await;

        // Resource release and the Idle transition happen no matter what
        for (_, mut stream) in streams {
            stream.release().await;
        }
        self.set_status(RecorderStatus::Idle);
        let _ = self.event_tx.send(SessionEvent::Stopped);

        let duration_ms = active
            .started_at
            .elapsed()
            .saturating_sub(active.paused)
            .as_secs_f64()
            * 1000.0;

        match finalize_result {
            Ok(files) => {
                self.notify(format!("Recording saved ({} file(s))", files.len()));
                let mime_type = if active.resolution.requested == OutputFormat::Wav {
                    OutputFormat::Wav.mime_type().to_string()
                } else {
                    active.resolution.capture_mime.clone()
                };
                Ok(SessionOutcome {
                    files,
                    mime_type,
                    track_count: summaries.len(),
                    duration_ms,
                })
            }
            Err(e) => Err(self.report(e)),
        }
    }

    /// Pause capture without touching persisted state.
    ///
    /// Outside the Recording state this is a no-op with a diagnostic notice.
    pub async fn pause(&mut self) -> RecorderResult<()> {
        if self.status() != RecorderStatus::Recording {
            self.notify("Nothing to pause: no recording in progress");
            return Ok(());
        }
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        for track in &mut active.tracks {
            if let Err(e) = track.stream.pause().await {
                tracing::warn!("track {} pause failed: {}", track.state.track_number, e);
            }
        }
        active.pause_started = Some(Instant::now());
        self.set_status(RecorderStatus::Paused);
        let _ = self.event_tx.send(SessionEvent::Paused);
        self.notify("Recording paused");
        Ok(())
    }

    /// Resume capture after a pause.
    ///
    /// Outside the Paused state this is a no-op with a diagnostic notice.
    pub async fn resume(&mut self) -> RecorderResult<()> {
        if self.status() != RecorderStatus::Paused {
            self.notify("Nothing to resume: recording is not paused");
            return Ok(());
        }
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        for track in &mut active.tracks {
            if let Err(e) = track.stream.resume().await {
                tracing::warn!("track {} resume failed: {}", track.state.track_number, e);
            }
        }
        if let Some(pause_start) = active.pause_started.take() {
            active.paused += pause_start.elapsed();
        }
        self.set_status(RecorderStatus::Recording);
        let _ = self.event_tx.send(SessionEvent::Resumed);
        self.notify("Recording resumed");
        Ok(())
    }

    /// Start or stop depending on the current state.
    ///
    /// Returns the session outcome when this toggle stopped a recording.
    pub async fn toggle_recording(&mut self) -> RecorderResult<Option<SessionOutcome>> {
        match self.status() {
            RecorderStatus::Idle => self.start().await.map(|_| None),
            RecorderStatus::Recording | RecorderStatus::Paused => {
                self.stop().await.map(Some)
            }
        }
    }

    /// Pause or resume depending on the current state; a no-op with a user
    /// notice when idle
    pub async fn toggle_pause_resume(&mut self) -> RecorderResult<()> {
        match self.status() {
            RecorderStatus::Recording => self.pause().await,
            RecorderStatus::Paused => self.resume().await,
            RecorderStatus::Idle => {
                self.notify("Nothing to pause: no recording in progress");
                Ok(())
            }
        }
    }

    /// Process-teardown cleanup: release live streams and clear in-memory
    /// state. On-disk temp artifacts are deliberately kept so a crashed or
    /// abandoned session can be recovered manually.
    pub async fn cleanup(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::info!(
                "cleanup: releasing {} stream(s) from session {}; temp artifacts kept",
                active.tracks.len(),
                active.token
            );
            for mut track in active.tracks {
                track.stream.release().await;
                // The writer drains on its own once the stream (and with it
                // the chunk sender) is dropped
            }
        }
        self.set_status(RecorderStatus::Idle);
    }

    fn set_status(&self, status: RecorderStatus) {
        *self.status.write() = status;
    }

    fn notify(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        let _ = self.event_tx.send(SessionEvent::Notice(message));
    }

    fn report(&self, error: RecorderError) -> RecorderError {
        tracing::error!("{}", error);
        let _ = self.event_tx.send(SessionEvent::Notice(error.to_string()));
        error
    }
}
