//! WAV encoding
//!
//! Canonical 44-byte RIFF/WAVE PCM header plus interleaved 16-bit samples.
//!
//! Header layout:
//! ```text
//! [0-3]    "RIFF"
//! [4-7]    file size - 8 (36 + data size)
//! [8-11]   "WAVE"
//! [12-15]  "fmt "
//! [16-19]  16 (PCM format chunk size)
//! [20-21]  1 (PCM format code)
//! [22-23]  channels
//! [24-27]  sample rate
//! [28-31]  byte rate = sample_rate * channels * 2
//! [32-33]  block align = channels * 2
//! [34-35]  16 (bits per sample)
//! [36-39]  "data"
//! [40-43]  data size
//! ```

use super::AudioBuffer;

/// Size of the standard WAV RIFF header in bytes
pub const WAV_HEADER_SIZE: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;

/// Derived header fields for a PCM payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeaderInfo {
    /// Always 44
    pub header_size: usize,

    /// Header plus payload
    pub total_size: usize,

    /// Bytes per second of audio
    pub byte_rate: u32,
}

/// Compute header fields for a payload of `data_length` bytes
pub fn header_info(channels: u16, sample_rate: u32, data_length: usize) -> WavHeaderInfo {
    WavHeaderInfo {
        header_size: WAV_HEADER_SIZE,
        total_size: data_length + WAV_HEADER_SIZE,
        byte_rate: sample_rate * channels as u32 * 2,
    }
}

/// Encode the first `sample_count` frames of a buffer as a complete WAV file.
///
/// `sample_count` is clamped to the buffer's frame count, so partial encodes
/// are allowed. Each float sample is clamped to [-1, 1] and scaled to i16
/// (negative x32768, positive x32767) before truncation.
pub fn encode(buffer: &AudioBuffer, sample_count: usize) -> Vec<u8> {
    let channels = buffer.channel_count().max(1) as u16;
    let frames = sample_count.min(buffer.frames());
    let data_size = frames * channels as usize * 2;

    let mut out = Vec::with_capacity(WAV_HEADER_SIZE + data_size);
    write_header(&mut out, channels, buffer.sample_rate, data_size as u32);

    // Interleave: frame-major, channel-minor
    for frame in 0..frames {
        for channel in &buffer.channels {
            let sample = sample_to_i16(channel[frame]);
            out.extend_from_slice(&sample.to_le_bytes());
        }
    }

    out
}

fn write_header(out: &mut Vec<u8>, channels: u16, sample_rate: u32, data_size: u32) {
    let info = header_info(channels, sample_rate, data_size as usize);
    let block_align = channels * 2;

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_size).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&info.byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
}

fn sample_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono(samples: Vec<f32>) -> AudioBuffer {
        AudioBuffer {
            sample_rate: 44_100,
            channels: vec![samples],
        }
    }

    #[test]
    fn test_encode_size_is_header_plus_samples() {
        let buffer = AudioBuffer::silent(44_100, 2, 100);
        let bytes = encode(&buffer, 100);
        assert_eq!(bytes.len(), 44 + 100 * 2 * 2);
    }

    #[test]
    fn test_partial_encode_clamps_to_buffer_length() {
        let buffer = mono(vec![0.0; 50]);
        assert_eq!(encode(&buffer, 20).len(), 44 + 20 * 2);
        assert_eq!(encode(&buffer, 500).len(), 44 + 50 * 2);
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode(&AudioBuffer::silent(48_000, 2, 10), 10);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(&bytes[36..40], b"data");

        // PCM format code 1, 16-bit
        assert_eq!(u16::from_le_bytes([bytes[20], bytes[21]]), 1);
        assert_eq!(u16::from_le_bytes([bytes[34], bytes[35]]), 16);

        let byte_rate = u32::from_le_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]);
        assert_eq!(byte_rate, 48_000 * 2 * 2);

        let block_align = u16::from_le_bytes([bytes[32], bytes[33]]);
        assert_eq!(block_align, 4);

        let data_size = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]);
        assert_eq!(data_size, 10 * 2 * 2);
    }

    #[test]
    fn test_clamp_positive_overdrive() {
        let loud = encode(&mono(vec![2.0]), 1);
        let full = encode(&mono(vec![1.0]), 1);
        assert_eq!(loud[44..], full[44..]);
        assert_eq!(i16::from_le_bytes([full[44], full[45]]), 32767);
    }

    #[test]
    fn test_clamp_negative_overdrive() {
        let loud = encode(&mono(vec![-2.0]), 1);
        let full = encode(&mono(vec![-1.0]), 1);
        assert_eq!(loud[44..], full[44..]);
        assert_eq!(i16::from_le_bytes([full[44], full[45]]), -32768);
    }

    #[test]
    fn test_header_info_fields() {
        let info = header_info(1, 44_100, 88_200);
        assert_eq!(info.header_size, 44);
        assert_eq!(info.total_size, 88_244);
        assert_eq!(info.byte_rate, 88_200);
    }
}
