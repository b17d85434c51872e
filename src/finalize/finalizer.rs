//! Finalize pipeline
//!
//! Converts and merges captured track data into final artifacts, removes
//! intermediates, and rolls back on partial failure. Three shapes exist:
//! per-track artifacts (rename or decode/re-encode), a single-file WAV
//! mixdown, and a single-file raw container concatenation.

use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

use crate::audio::{mixer, wav, AudioBuffer};
use crate::backend::media::MediaBackend;
use crate::backend::storage::StorageBackend;
use crate::capability::FormatResolution;
use crate::config::{OutputFormat, OutputMode, RecorderConfig};
use crate::error::{RecorderError, RecorderResult};
use crate::recorder::session::SessionEvent;
use crate::recorder::state::TrackSummary;
use crate::recorder::TrackData;

use super::paths::{resolve_unique_path, sanitize_file_name};

/// Converts captured track data into final artifacts
pub struct Finalizer<'a> {
    storage: &'a dyn StorageBackend,
    media: &'a dyn MediaBackend,
    config: &'a RecorderConfig,
    resolution: &'a FormatResolution,
    notices: &'a broadcast::Sender<SessionEvent>,
}

impl<'a> Finalizer<'a> {
    pub fn new(
        storage: &'a dyn StorageBackend,
        media: &'a dyn MediaBackend,
        config: &'a RecorderConfig,
        resolution: &'a FormatResolution,
        notices: &'a broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            storage,
            media,
            config,
            resolution,
            notices,
        }
    }

    /// Build final artifacts from the drained track summaries.
    ///
    /// Returns the final paths in track order. In multiple-files mode,
    /// per-track failures are reported individually and do not discard the
    /// tracks that succeeded; only a session with zero successful tracks
    /// fails as a whole.
    pub async fn run(
        &self,
        dest_dir: &Path,
        token: &str,
        summaries: &[TrackSummary],
    ) -> RecorderResult<Vec<PathBuf>> {
        let mut live: Vec<(&TrackSummary, &TrackData)> = Vec::new();
        let mut lost: Vec<&TrackSummary> = Vec::new();

        for summary in summaries {
            match &summary.data {
                Some(data) if summary.bytes_written > 0 => live.push((summary, data)),
                Some(data) => {
                    // Nothing was captured on this track; drop its temp files
                    for path in data.paths() {
                        if self.storage.exists(&path).await.unwrap_or(false) {
                            if let Err(e) = self.storage.remove(&path).await {
                                tracing::warn!("could not remove empty temp {:?}: {}", path, e);
                            }
                        }
                    }
                    tracing::info!(
                        "track {} captured no data, skipping",
                        summary.state.track_number
                    );
                }
                None => lost.push(summary),
            }
        }

        if self.config.output_mode == OutputMode::Single && !lost.is_empty() {
            // A merged artifact must not silently omit a track's audio
            let first = &lost[0];
            return Err(RecorderError::persistence(
                dest_dir,
                std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!(
                        "track {} lost its captured data: {}",
                        first.state.track_number,
                        first.last_error.as_deref().unwrap_or("unknown write failure")
                    ),
                ),
            ));
        }

        if self.config.output_mode == OutputMode::Single && live.len() > 1 {
            let merged = self.merge_tracks(dest_dir, token, &live).await?;
            return Ok(vec![merged]);
        }

        self.per_track(dest_dir, token, &live, &lost).await
    }

    /// Finalize each track independently (single track, or multiple-files
    /// mode). Partial success is allowed.
    async fn per_track(
        &self,
        dest_dir: &Path,
        token: &str,
        live: &[(&TrackSummary, &TrackData)],
        lost: &[&TrackSummary],
    ) -> RecorderResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut first_error: Option<RecorderError> = None;

        for summary in lost {
            let message = summary
                .last_error
                .clone()
                .unwrap_or_else(|| "captured data was lost".to_string());
            tracing::error!(
                "track {} has no data to finalize: {}",
                summary.state.track_number,
                message
            );
            let _ = self.notices.send(SessionEvent::TrackWarning {
                track_number: summary.state.track_number,
                message: message.clone(),
            });
            if first_error.is_none() {
                first_error = Some(RecorderError::persistence(
                    dest_dir,
                    std::io::Error::new(std::io::ErrorKind::Other, message),
                ));
            }
        }

        let label_tracks = live.len() > 1;
        for (summary, data) in live {
            let stem = self.track_stem(token, summary, label_tracks);
            match self.finalize_one(dest_dir, &stem, data).await {
                Ok(path) => {
                    tracing::info!(
                        "track {} finalized to {:?}",
                        summary.state.track_number,
                        path
                    );
                    files.push(path);
                }
                Err(e) => {
                    tracing::error!(
                        "track {} finalize failed: {}",
                        summary.state.track_number,
                        e
                    );
                    let _ = self.notices.send(SessionEvent::TrackWarning {
                        track_number: summary.state.track_number,
                        message: e.to_string(),
                    });
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(error) if files.is_empty() => Err(error),
            _ => Ok(files),
        }
    }

    /// Finalize one track's data into one artifact
    async fn finalize_one(
        &self,
        dest_dir: &Path,
        stem: &str,
        data: &TrackData,
    ) -> RecorderResult<PathBuf> {
        if self.resolution.is_native() {
            if let Some(temp) = data.single_path() {
                // Captured container already matches the request: rename
                let final_path = resolve_unique_path(
                    self.storage,
                    dest_dir,
                    stem,
                    &self.resolution.capture_extension,
                )
                .await?;
                self.storage
                    .rename(temp, &final_path)
                    .await
                    .map_err(|e| RecorderError::persistence(temp, e))?;
                return Ok(final_path);
            }

            // Multiple segments cannot be renamed in one step: concatenate,
            // then remove them under the rollback rule
            let bytes = data.read_all(self.storage).await?;
            let final_path = resolve_unique_path(
                self.storage,
                dest_dir,
                stem,
                &self.resolution.capture_extension,
            )
            .await?;
            self.write_artifact(&final_path, &bytes).await?;
            self.remove_intermediates(&final_path, &data.paths()).await?;
            return Ok(final_path);
        }

        // Requested WAV, captured compressed: decode and re-encode
        let bytes = data.read_all(self.storage).await?;
        let decoded = self
            .media
            .decode(&bytes)
            .await
            .map_err(RecorderError::Decode)?;
        let frames = decoded.frames();
        let encoded = wav::encode(&decoded, frames);

        let final_path = resolve_unique_path(
            self.storage,
            dest_dir,
            stem,
            self.resolution.requested.extension(),
        )
        .await?;
        self.write_artifact(&final_path, &encoded).await?;
        self.remove_intermediates(&final_path, &data.paths()).await?;
        Ok(final_path)
    }

    /// Merge all tracks into one artifact (single-file mode, >1 track)
    async fn merge_tracks(
        &self,
        dest_dir: &Path,
        token: &str,
        live: &[(&TrackSummary, &TrackData)],
    ) -> RecorderResult<PathBuf> {
        let stem = format!("{} {}", self.config.filename_prefix, token);

        let merged: Vec<u8> = if self.resolution.requested == OutputFormat::Wav {
            // Offline mixdown of every track into fixed stereo
            let mut buffers: Vec<AudioBuffer> = Vec::with_capacity(live.len());
            for (_, data) in live {
                let bytes = data.read_all(self.storage).await?;
                let decoded = self
                    .media
                    .decode(&bytes)
                    .await
                    .map_err(RecorderError::Decode)?;
                buffers.push(decoded);
            }
            let mixed = mixer::mixdown(&buffers);
            let frames = mixed.frames();
            wav::encode(&mixed, frames)
        } else {
            // Raw byte concatenation of each track's container bytes,
            // labeled with the combined MIME type. This does not demux or
            // remux; most players will only see the first track's stream.
            tracing::warn!(
                "merging {} tracks by raw concatenation as '{}'",
                live.len(),
                self.resolution.capture_mime
            );
            let mut combined = Vec::new();
            for (_, data) in live {
                combined.extend_from_slice(&data.read_all(self.storage).await?);
            }
            combined
        };

        let extension = if self.resolution.requested == OutputFormat::Wav {
            self.resolution.requested.extension()
        } else {
            &self.resolution.capture_extension
        };
        let final_path = resolve_unique_path(self.storage, dest_dir, &stem, extension).await?;
        self.write_artifact(&final_path, &merged).await?;

        let mut intermediates = Vec::new();
        for (_, data) in live {
            intermediates.extend(data.paths());
        }
        self.remove_intermediates(&final_path, &intermediates)
            .await?;
        Ok(final_path)
    }

    async fn write_artifact(&self, path: &Path, bytes: &[u8]) -> RecorderResult<()> {
        self.storage
            .create_binary(path, bytes)
            .await
            .map_err(|e| RecorderError::persistence(path, e))
    }

    /// Remove intermediate files; on any failure delete the just-written
    /// artifact and fail loudly, naming every surviving path.
    async fn remove_intermediates(
        &self,
        artifact: &Path,
        intermediates: &[PathBuf],
    ) -> RecorderResult<()> {
        let mut leftover = Vec::new();
        for path in intermediates {
            if let Err(e) = self.storage.remove(path).await {
                tracing::error!("could not remove intermediate {:?}: {}", path, e);
                leftover.push(path.clone());
            }
        }

        if leftover.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.storage.remove(artifact).await {
            tracing::error!("rollback of {:?} also failed: {}", artifact, e);
        }
        Err(RecorderError::FinalizeIntegrity {
            artifact: artifact.to_path_buf(),
            leftover,
        })
    }

    fn track_stem(&self, token: &str, summary: &TrackSummary, label_tracks: bool) -> String {
        let base = format!("{} {}", self.config.filename_prefix, token);
        if !label_tracks {
            return base;
        }
        if self.config.human_readable_track_names {
            let label = sanitize_file_name(&summary.state.source_name);
            format!("{base} {label}")
        } else {
            format!("{base} track{}", summary.state.track_number)
        }
    }
}
