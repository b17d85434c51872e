//! Audio processing
//!
//! Pure PCM utilities: the planar sample buffer, the WAV byte-layout
//! encoder, and the offline multi-buffer mixdown.

pub mod mixer;
pub mod wav;

pub use mixer::mixdown;
pub use wav::{encode, header_info, WavHeaderInfo, WAV_HEADER_SIZE};

/// Decoded PCM audio: planar f32 samples, one `Vec` per channel.
///
/// All channels have the same length (the frame count).
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Planar channel data
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// A buffer of silence
    pub fn silent(sample_rate: u32, channel_count: usize, frames: usize) -> Self {
        Self {
            sample_rate,
            channels: vec![vec![0.0; frames]; channel_count],
        }
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }
}
