use serde::{Deserialize, Serialize};

/// Default speaker-position names for the first eight channels of a mix
/// format, in WAVE channel-mask order.
const DEFAULT_CHANNEL_NAMES: [&str; 8] = ["FL", "FR", "FC", "LFE", "BL", "BR", "SL", "SR"];

/// An audio endpoint that can be captured from.
///
/// Render endpoints are exposed as loopback sources (the mix that device is
/// playing); capture endpoints are true inputs such as microphones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Opaque platform identifier. Empty selects the platform default.
    pub id: String,
    pub name: String,
    pub is_loopback: bool,
}

impl EndpointDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, is_loopback: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_loopback,
        }
    }

    /// The platform default render device, captured as loopback.
    pub fn default_loopback() -> Self {
        Self::new("", "Default Output (Loopback)", true)
    }

    /// The platform default capture device.
    pub fn default_input() -> Self {
        Self::new("", "Default Input", false)
    }

    pub fn is_default(&self) -> bool {
        self.id.is_empty()
    }
}

/// Sample encoding of a negotiated capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleEncoding {
    /// IEEE float, 32 bits per sample.
    Float32,
    /// Signed integer PCM in a 16-bit container.
    Pcm16,
    /// Signed integer PCM with 24 or 32 valid bits in a 32-bit container.
    Pcm32,
    /// Anything else. Decoded as 16-bit PCM on a best-effort basis.
    Unknown,
}

impl SampleEncoding {
    /// Size of one sample container in bytes.
    pub fn container_bytes(self) -> usize {
        match self {
            Self::Float32 | Self::Pcm32 => 4,
            Self::Pcm16 | Self::Unknown => 2,
        }
    }
}

/// Negotiated format of a capture stream, reported once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Container size as reported by the platform.
    pub bits_per_sample: u16,
    /// Meaningful bits within the container.
    pub valid_bits: u16,
    pub encoding: SampleEncoding,
}

impl StreamFormat {
    /// A format whose bit depth is implied by `encoding`'s container.
    pub fn new(sample_rate: u32, channels: u16, encoding: SampleEncoding) -> Self {
        let bits = (encoding.container_bytes() * 8) as u16;
        Self {
            sample_rate,
            channels,
            bits_per_sample: bits,
            valid_bits: bits,
            encoding,
        }
    }

    /// Build from a platform description, keeping the raw bit depths and
    /// classifying the encoding with [`classify`](Self::classify).
    pub fn from_platform(
        sample_rate: u32,
        channels: u16,
        is_float: bool,
        is_pcm: bool,
        bits_per_sample: u16,
        valid_bits: u16,
    ) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
            valid_bits: if valid_bits > 0 { valid_bits } else { bits_per_sample },
            encoding: Self::classify(is_float, is_pcm, bits_per_sample, valid_bits),
        }
    }

    /// Classify a platform format description.
    ///
    /// `valid_bits` is the number of meaningful bits when the platform reports
    /// it separately from the container size (0 when unknown).
    pub fn classify(is_float: bool, is_pcm: bool, bits_per_sample: u16, valid_bits: u16) -> SampleEncoding {
        let bits = if valid_bits > 0 { valid_bits } else { bits_per_sample };
        if is_float && bits_per_sample == 32 {
            SampleEncoding::Float32
        } else if is_pcm && bits == 16 {
            SampleEncoding::Pcm16
        } else if is_pcm && bits >= 24 && bits_per_sample == 32 {
            SampleEncoding::Pcm32
        } else {
            SampleEncoding::Unknown
        }
    }

    /// Bytes per interleaved frame.
    pub fn block_align(&self) -> usize {
        self.encoding.container_bytes() * self.channels.max(1) as usize
    }
}

/// Per-channel metering for the active capture format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelDiagnostics {
    pub count: usize,
    pub names: Vec<String>,
    pub levels: Vec<f32>,
}

impl ChannelDiagnostics {
    /// Fresh diagnostics for `count` channels with default names and zero levels.
    pub fn with_channels(count: usize) -> Self {
        let names = (0..count)
            .map(|i| match DEFAULT_CHANNEL_NAMES.get(i) {
                Some(name) => (*name).to_string(),
                None => format!("Ch{}", i + 1),
            })
            .collect();
        Self {
            count,
            names,
            levels: vec![0.0; count],
        }
    }
}

/// Display-oriented view of the magnitude spectrum.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpectrumSnapshot {
    pub bins: Vec<f32>,
    pub peaks: Vec<f32>,
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_fall_back_to_numbers() {
        let diag = ChannelDiagnostics::with_channels(10);
        assert_eq!(diag.count, 10);
        assert_eq!(diag.names[0], "FL");
        assert_eq!(diag.names[3], "LFE");
        assert_eq!(diag.names[7], "SR");
        assert_eq!(diag.names[8], "Ch9");
        assert_eq!(diag.names[9], "Ch10");
        assert_eq!(diag.levels, vec![0.0; 10]);
    }

    #[test]
    fn classify_formats() {
        assert_eq!(StreamFormat::classify(true, false, 32, 32), SampleEncoding::Float32);
        assert_eq!(StreamFormat::classify(false, true, 16, 0), SampleEncoding::Pcm16);
        assert_eq!(StreamFormat::classify(false, true, 32, 24), SampleEncoding::Pcm32);
        assert_eq!(StreamFormat::classify(false, true, 32, 0), SampleEncoding::Pcm32);
        // Packed 24-bit has no 32-bit container.
        assert_eq!(StreamFormat::classify(false, true, 24, 24), SampleEncoding::Unknown);
        assert_eq!(StreamFormat::classify(false, false, 8, 8), SampleEncoding::Unknown);
    }

    #[test]
    fn platform_formats_keep_their_bit_depths() {
        let format = StreamFormat::from_platform(48_000, 2, false, true, 32, 24);
        assert_eq!(format.encoding, SampleEncoding::Pcm32);
        assert_eq!((format.bits_per_sample, format.valid_bits), (32, 24));

        // Packed 24-bit degrades but still reports what the device uses.
        let packed = StreamFormat::from_platform(44_100, 2, false, true, 24, 0);
        assert_eq!(packed.encoding, SampleEncoding::Unknown);
        assert_eq!((packed.bits_per_sample, packed.valid_bits), (24, 24));

        let float = StreamFormat::new(48_000, 2, SampleEncoding::Float32);
        assert_eq!((float.bits_per_sample, float.valid_bits), (32, 32));
    }

    #[test]
    fn block_align_uses_container_size() {
        assert_eq!(StreamFormat::new(48_000, 2, SampleEncoding::Float32).block_align(), 8);
        assert_eq!(StreamFormat::new(44_100, 6, SampleEncoding::Pcm16).block_align(), 12);
        assert_eq!(StreamFormat::new(48_000, 0, SampleEncoding::Pcm32).block_align(), 4);
    }

    #[test]
    fn default_endpoints_have_empty_ids() {
        assert!(EndpointDescriptor::default_loopback().is_default());
        assert!(EndpointDescriptor::default_loopback().is_loopback);
        assert!(!EndpointDescriptor::default_input().is_loopback);
    }
}
