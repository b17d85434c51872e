//! Offline mixdown
//!
//! Renders all decoded input buffers simultaneously into a fixed 2-channel
//! output sized to the longest input, at the first input's sample rate.
//! No offset or alignment compensation is applied; clipping is handled by
//! the encoder's clamp.

use super::AudioBuffer;

/// Mix all inputs into one stereo buffer.
///
/// Mono inputs feed both output channels at full gain; multi-channel inputs
/// map channel 0 to the left and channel 1 to the right. An empty input
/// slice yields an empty stereo buffer at 44100 Hz.
pub fn mixdown(inputs: &[AudioBuffer]) -> AudioBuffer {
    let sample_rate = inputs.first().map(|b| b.sample_rate).unwrap_or(44_100);
    let frames = inputs.iter().map(|b| b.frames()).max().unwrap_or(0);

    let mut left = vec![0.0f32; frames];
    let mut right = vec![0.0f32; frames];

    for input in inputs {
        match input.channel_count() {
            0 => {}
            1 => {
                for (i, &sample) in input.channels[0].iter().enumerate() {
                    left[i] += sample;
                    right[i] += sample;
                }
            }
            _ => {
                for (i, &sample) in input.channels[0].iter().enumerate() {
                    left[i] += sample;
                }
                for (i, &sample) in input.channels[1].iter().enumerate() {
                    right[i] += sample;
                }
            }
        }
    }

    AudioBuffer {
        sample_rate,
        channels: vec![left, right],
    }
}
