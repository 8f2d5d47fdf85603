//! Interleaved packet normalization.
//!
//! Converts a raw little-endian capture packet in any supported encoding into
//! mono 16-bit samples plus one RMS level per channel. All functions are pure
//! and work on byte slices so backends never need to reinterpret pointers as
//! wider types.

use crate::models::audio_models::{SampleEncoding, StreamFormat};

const I16_SCALE: f32 = 32_768.0;
const I32_SCALE: f64 = 2_147_483_648.0;

/// Mono downmix and per-channel levels of one capture packet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownmixedPacket {
    pub mono: Vec<i16>,
    pub channel_levels: Vec<f32>,
}

impl DownmixedPacket {
    /// A packet of `frames` silent frames.
    pub fn silence(frames: usize, channels: usize) -> Self {
        Self {
            mono: vec![0; frames],
            channel_levels: vec![0.0; channels],
        }
    }
}

/// Downmix an interleaved packet to mono PCM16 and per-channel RMS.
///
/// Trailing bytes that do not form a whole frame are ignored. Unknown
/// encodings are decoded as 16-bit PCM.
pub fn downmix_packet(data: &[u8], format: &StreamFormat) -> DownmixedPacket {
    let channels = format.channels.max(1) as usize;
    let sample_bytes = format.encoding.container_bytes();
    let block_align = sample_bytes * channels;
    let frames = data.len() / block_align;

    let mut mono = Vec::with_capacity(frames);
    let mut sum_sq = vec![0.0f64; channels];

    for frame in data.chunks_exact(block_align) {
        let mut acc = 0.0f64;
        for (ch, sample) in frame.chunks_exact(sample_bytes).enumerate() {
            let value = decode_sample(sample, format.encoding);
            acc += value;
            sum_sq[ch] += value * value;
        }
        let mixed = (acc / channels as f64).clamp(-1.0, 1.0);
        mono.push(to_i16(mixed as f32));
    }

    let channel_levels = sum_sq
        .into_iter()
        .map(|sum| {
            if frames == 0 {
                0.0
            } else {
                ((sum / frames as f64).sqrt() as f32).max(0.0)
            }
        })
        .collect();

    DownmixedPacket { mono, channel_levels }
}

/// Decode one sample container into [-1, 1].
fn decode_sample(bytes: &[u8], encoding: SampleEncoding) -> f64 {
    match encoding {
        SampleEncoding::Float32 => {
            let value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            if value.is_finite() {
                value as f64
            } else {
                0.0
            }
        }
        SampleEncoding::Pcm32 => {
            let value = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            value as f64 / I32_SCALE
        }
        SampleEncoding::Pcm16 | SampleEncoding::Unknown => {
            let value = i16::from_le_bytes([bytes[0], bytes[1]]);
            value as f64 / I16_SCALE as f64
        }
    }
}

/// Scale a normalized sample to PCM16 (x32767), clamping out-of-range input.
pub fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Normalize a PCM16 sample to [-1, 1).
pub fn from_i16(sample: i16) -> f32 {
    sample as f32 / I16_SCALE
}

/// Root-mean-square of normalized samples; 0 when there are none.
pub fn rms_level(samples: impl IntoIterator<Item = f32>) -> f32 {
    let (sum_sq, count) = samples
        .into_iter()
        .fold((0.0f64, 0usize), |(sum, n), s| (sum + (s as f64) * (s as f64), n + 1));
    if count == 0 {
        return 0.0;
    }
    (sum_sq / count as f64).sqrt() as f32
}

/// RMS of a PCM16 block after normalizing to [-1, 1).
pub fn rms_pcm16(samples: &[i16]) -> f32 {
    rms_level(samples.iter().map(|&s| from_i16(s)))
}
