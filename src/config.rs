//! Recorder configuration
//!
//! This module defines the configuration consumed (read-only) by the
//! recording session: output format, track layout, output mode, and
//! destination strategy.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webm,
    Ogg,
    M4a,
    Wav,
}

impl OutputFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Webm => "webm",
            OutputFormat::Ogg => "ogg",
            OutputFormat::M4a => "m4a",
            OutputFormat::Wav => "wav",
        }
    }

    /// Get the MIME type used to probe and record this format
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Webm => "audio/webm;codecs=opus",
            OutputFormat::Ogg => "audio/ogg;codecs=opus",
            OutputFormat::M4a => "audio/mp4",
            OutputFormat::Wav => "audio/wav",
        }
    }

    /// Whether this is an uncompressed PCM target that may need a compressed
    /// capture intermediate
    pub fn is_uncompressed(&self) -> bool {
        matches!(self, OutputFormat::Wav)
    }
}

/// How multiple tracks are turned into final artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// All tracks merged into one artifact
    Single,
    /// One artifact per non-empty track
    Multiple,
}

/// Where final artifacts are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum DestinationStrategy {
    /// A fixed folder path
    FixedFolder { path: PathBuf },
    /// Relative to the caller's active document, with an optional subfolder
    DocumentRelative { subfolder: Option<String> },
}

/// One configured capture source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackBinding {
    /// Device ID to capture from (None = backend default device)
    pub device_id: Option<String>,

    /// Human-readable label, used for file naming when enabled
    pub label: Option<String>,
}

/// Configuration for a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderConfig {
    /// Requested output format
    pub format: OutputFormat,

    /// Encoder bitrate in bits per second
    pub bitrate: u32,

    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// Whether multi-track capture is enabled
    pub multi_track: bool,

    /// Per-track device assignment (ignored unless `multi_track`)
    pub tracks: Vec<TrackBinding>,

    /// Maximum number of simultaneous tracks
    pub max_tracks: usize,

    /// Single merged artifact vs one artifact per track
    pub output_mode: OutputMode,

    /// Prefix for final file names
    pub filename_prefix: String,

    /// Where final artifacts go
    pub destination: DestinationStrategy,

    /// Name per-track artifacts after the source device instead of a
    /// track number
    pub human_readable_track_names: bool,

    /// Chunk emission interval in milliseconds
    #[serde(default = "default_timeslice_ms")]
    pub timeslice_ms: u64,
}

fn default_timeslice_ms() -> u64 {
    5000
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Webm,
            bitrate: 128_000,
            sample_rate: 44_100,
            multi_track: false,
            tracks: Vec::new(),
            max_tracks: 8,
            output_mode: OutputMode::Multiple,
            filename_prefix: "Recording".to_string(),
            destination: DestinationStrategy::FixedFolder {
                path: PathBuf::from("recordings"),
            },
            human_readable_track_names: false,
            timeslice_ms: default_timeslice_ms(),
        }
    }
}

impl RecorderConfig {
    /// Validate the configuration before a session starts
    pub fn validate(&self) -> Result<(), String> {
        if self.bitrate == 0 {
            return Err("bitrate must be non-zero".to_string());
        }
        if self.sample_rate == 0 {
            return Err("sample rate must be non-zero".to_string());
        }
        if self.max_tracks == 0 {
            return Err("max track count must be at least 1".to_string());
        }
        if self.multi_track && self.tracks.is_empty() {
            return Err("multi-track mode requires at least one track binding".to_string());
        }
        if self.tracks.len() > self.max_tracks {
            return Err(format!(
                "{} tracks configured but max track count is {}",
                self.tracks.len(),
                self.max_tracks
            ));
        }
        if self.timeslice_ms == 0 {
            return Err("timeslice must be non-zero".to_string());
        }
        Ok(())
    }

    /// The capture sources this configuration asks for, in track order.
    ///
    /// Single-track mode records one track from the backend default device.
    pub fn sources(&self) -> Vec<TrackBinding> {
        if self.multi_track {
            self.tracks.clone()
        } else {
            vec![TrackBinding::default()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RecorderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_too_many_tracks() {
        let config = RecorderConfig {
            multi_track: true,
            tracks: vec![TrackBinding::default(); 3],
            max_tracks: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_multi_track_without_bindings() {
        let config = RecorderConfig {
            multi_track: true,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_single_track_uses_default_device() {
        let config = RecorderConfig::default();
        let sources = config.sources();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].device_id.is_none());
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = RecorderConfig {
            format: OutputFormat::Wav,
            destination: DestinationStrategy::DocumentRelative {
                subfolder: Some("audio".to_string()),
            },
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"documentRelative\""));
        let back: RecorderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.format, OutputFormat::Wav);
        assert_eq!(back.destination, config.destination);
    }

    #[test]
    fn test_wav_is_uncompressed() {
        assert!(OutputFormat::Wav.is_uncompressed());
        assert!(!OutputFormat::Webm.is_uncompressed());
        assert_eq!(OutputFormat::Webm.extension(), "webm");
        assert_eq!(OutputFormat::M4a.mime_type(), "audio/mp4");
    }
}
