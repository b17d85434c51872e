//! Capability probing and capture-format resolution
//!
//! Probes fixed candidate format/sample-rate/bitrate lists against the media
//! backend, and resolves a requested output format to the container actually
//! recorded. Resolution never touches hardware, so `start()` can fail fast
//! on an unsupported format before any device is opened.

use serde::{Deserialize, Serialize};

use crate::backend::media::MediaBackend;
use crate::config::OutputFormat;
use crate::error::{RecorderError, RecorderResult};

/// Container/codec candidates probed for the capability report
pub const CANDIDATE_FORMATS: &[&str] = &[
    "audio/webm;codecs=opus",
    "audio/webm",
    "audio/ogg;codecs=opus",
    "audio/mp4",
    "audio/wav",
];

/// Sample-rate candidates probed for the capability report
pub const CANDIDATE_SAMPLE_RATES: &[u32] = &[8_000, 16_000, 22_050, 44_100, 48_000];

/// Bitrate candidates probed for the capability report
pub const CANDIDATE_BITRATES: &[u32] = &[64_000, 128_000, 192_000, 256_000];

/// Compressed intermediates scanned, in preference order, when the requested
/// format is an uncompressed target the backend cannot capture natively
pub const COMPRESSED_INTERMEDIATES: &[&str] = &[
    "audio/webm;codecs=opus",
    "audio/webm",
    "audio/ogg;codecs=opus",
    "audio/mp4",
];

/// Support probe result for one candidate MIME type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatSupport {
    pub mime_type: String,
    pub supported: bool,
}

/// Probed description of what the host can record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityReport {
    /// Per-candidate container/codec support
    pub formats: Vec<FormatSupport>,

    /// Candidate sample rates the backend accepts
    pub sample_rates: Vec<u32>,

    /// Candidate bitrates the backend accepts
    pub bitrates: Vec<u32>,

    /// Whether any candidate container is recordable at all
    pub recorder_available: bool,
}

/// A requested output format resolved to an actual capture format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatResolution {
    /// What the caller asked for
    pub requested: OutputFormat,

    /// MIME type handed to the recorder
    pub capture_mime: String,

    /// File extension of the captured container
    pub capture_extension: String,

    /// Whether finalize must decode and re-encode (capture != requested)
    pub transcode: bool,
}

impl FormatResolution {
    /// Whether the captured container already matches the requested format
    pub fn is_native(&self) -> bool {
        !self.transcode
    }
}

/// Probe fixed candidate lists against the media backend
pub fn detect_capabilities(media: &dyn MediaBackend) -> CapabilityReport {
    let formats: Vec<FormatSupport> = CANDIDATE_FORMATS
        .iter()
        .map(|mime| FormatSupport {
            mime_type: (*mime).to_string(),
            supported: media.is_format_supported(mime),
        })
        .collect();

    let recorder_available = formats.iter().any(|f| f.supported);

    CapabilityReport {
        formats,
        sample_rates: CANDIDATE_SAMPLE_RATES
            .iter()
            .copied()
            .filter(|rate| media.is_sample_rate_supported(*rate))
            .collect(),
        bitrates: CANDIDATE_BITRATES.to_vec(),
        recorder_available,
    }
}

/// Resolve a requested output format to the capture format actually recorded.
///
/// Natively supported formats capture as-is. An uncompressed target without
/// native support captures to the first supported compressed intermediate
/// and is transcoded at finalize. Anything else is a capability error naming
/// the format.
pub fn resolve_capture_format(
    media: &dyn MediaBackend,
    requested: OutputFormat,
) -> RecorderResult<FormatResolution> {
    if media.is_format_supported(requested.mime_type()) {
        return Ok(FormatResolution {
            requested,
            capture_mime: requested.mime_type().to_string(),
            capture_extension: requested.extension().to_string(),
            transcode: false,
        });
    }

    if requested.is_uncompressed() {
        for mime in COMPRESSED_INTERMEDIATES {
            if media.is_format_supported(mime) {
                tracing::debug!(
                    "capturing '{}' via compressed intermediate '{}'",
                    requested.extension(),
                    mime
                );
                return Ok(FormatResolution {
                    requested,
                    capture_mime: (*mime).to_string(),
                    capture_extension: extension_for_mime(mime).to_string(),
                    transcode: true,
                });
            }
        }
        return Err(RecorderError::Capability {
            format: requested.extension().to_string(),
            reason: "no compressed capture intermediate is supported".to_string(),
        });
    }

    Err(RecorderError::Capability {
        format: requested.extension().to_string(),
        reason: format!("recorder does not support '{}'", requested.mime_type()),
    })
}

/// Standalone feasibility check, used to fail fast before opening hardware
pub fn validate(media: &dyn MediaBackend, requested: OutputFormat) -> RecorderResult<()> {
    resolve_capture_format(media, requested).map(|_| ())
}

fn extension_for_mime(mime: &str) -> &'static str {
    let container = mime.split(';').next().unwrap_or(mime);
    match container {
        "audio/webm" => "webm",
        "audio/ogg" => "ogg",
        "audio/mp4" => "m4a",
        "audio/wav" => "wav",
        _ => "bin",
    }
}
