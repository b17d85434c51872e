//! Capture capability probing and format resolution

pub mod resolver;

pub use resolver::{
    detect_capabilities, resolve_capture_format, validate, CapabilityReport, FormatResolution,
    FormatSupport, CANDIDATE_BITRATES, CANDIDATE_FORMATS, CANDIDATE_SAMPLE_RATES,
    COMPRESSED_INTERMEDIATES,
};
