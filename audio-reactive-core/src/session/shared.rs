use std::sync::atomic::{AtomicU32, Ordering};

use log::{info, warn};
use parking_lot::Mutex;

use crate::analysis::spectrum::SpectrumAnalyzer;
use crate::models::audio_models::{ChannelDiagnostics, SampleEncoding, StreamFormat};
use crate::models::config::{self, AnalysisSettings};
use crate::processing::auto_level::AutoLevel;
use crate::processing::pcm;
use crate::traits::capture_provider::PacketSink;

/// Weight of the previous value in the per-channel meter EMA.
const CHANNEL_SMOOTHING: f32 = 0.7;

/// Sample rate assumed until a backend negotiates one.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Level-side state guarded by the ingest lock.
#[derive(Debug)]
pub(crate) struct IngestState {
    pub format: Option<StreamFormat>,
    pub channels: ChannelDiagnostics,
    pub auto_level: AutoLevel,
    pub gain: f32,
    pub smoothing: f32,
    pub auto_level_enabled: bool,
}

impl IngestState {
    fn new(settings: &AnalysisSettings) -> Self {
        Self {
            format: None,
            channels: ChannelDiagnostics::default(),
            auto_level: AutoLevel::new(),
            gain: settings.gain,
            smoothing: settings.smoothing,
            auto_level_enabled: settings.auto_level_enabled,
        }
    }

    /// Map an absolute RMS onto 0..1 through gain and auto-level.
    fn adjust(&mut self, rms: f32) -> f32 {
        let value = rms * self.gain;
        if self.auto_level_enabled {
            self.auto_level.update(value)
        } else {
            value.min(1.0)
        }
    }
}

/// State shared between the capture thread and every reader.
///
/// Three regions: the level is a lock-free `f32` bit pattern, the ingest lock
/// covers the level pipeline and channel meters, the spectrum lock covers the
/// analyzer. Neither lock is held while taking the other.
#[derive(Debug)]
pub(crate) struct SharedSignals {
    level: AtomicU32,
    pub ingest: Mutex<IngestState>,
    pub spectrum: Mutex<SpectrumAnalyzer>,
}

impl SharedSignals {
    pub fn new(settings: &AnalysisSettings) -> Self {
        let settings = settings.sanitized();
        Self {
            level: AtomicU32::new(0.0f32.to_bits()),
            ingest: Mutex::new(IngestState::new(&settings)),
            spectrum: Mutex::new(SpectrumAnalyzer::new(&settings, DEFAULT_SAMPLE_RATE)),
        }
    }

    pub fn level(&self) -> f32 {
        f32::from_bits(self.level.load(Ordering::Acquire))
    }

    fn store_level(&self, level: f32) {
        self.level.store(level.to_bits(), Ordering::Release);
    }

    /// Level pipeline plus spectrum analysis for one block of mono PCM16.
    pub fn process_pcm16(&self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }

        let rms = pcm::rms_pcm16(samples);

        let smoothing = {
            let mut ingest = self.ingest.lock();
            let adjusted = ingest.adjust(rms);
            let alpha = ingest.smoothing;
            let smoothed = alpha * self.level() + (1.0 - alpha) * adjusted;
            self.store_level(if smoothed.is_finite() { smoothed.clamp(0.0, 1.0) } else { 0.0 });
            alpha
        };

        self.spectrum.lock().push_pcm16(samples, smoothing);
    }

    /// Fold one packet's per-channel RMS into the channel meters.
    fn update_channels(&self, channel_levels: &[f32]) {
        let mut ingest = self.ingest.lock();
        if ingest.channels.count != channel_levels.len() {
            ingest.channels = ChannelDiagnostics::with_channels(channel_levels.len());
        }

        let gain = ingest.gain;
        let enabled = ingest.auto_level_enabled;
        let normalized: Vec<f32> = channel_levels
            .iter()
            .map(|&rms| {
                let value = rms * gain;
                if enabled {
                    ingest.auto_level.normalize(value)
                } else {
                    value.clamp(0.0, 1.0)
                }
            })
            .collect();

        for (meter, fresh) in ingest.channels.levels.iter_mut().zip(normalized) {
            let next = CHANNEL_SMOOTHING * *meter + (1.0 - CHANNEL_SMOOTHING) * fresh;
            *meter = if next.is_finite() { next.clamp(0.0, 1.0) } else { 0.0 };
        }
    }

    /// Zero the level, the spectrum outputs and the channel meters.
    pub fn clear(&self) {
        self.store_level(0.0);
        self.spectrum.lock().clear_signals();
        self.ingest.lock().channels.levels.fill(0.0);
    }

    pub fn reset_auto_level(&self) {
        self.ingest.lock().auto_level.reset();
    }

    pub fn settings(&self) -> AnalysisSettings {
        let (gain, smoothing, auto_level_enabled) = {
            let ingest = self.ingest.lock();
            (ingest.gain, ingest.smoothing, ingest.auto_level_enabled)
        };
        let spectrum = self.spectrum.lock();
        let (bass_upper_hz, mid_upper_hz) = spectrum.crossovers();
        let (visualizer_min_hz, visualizer_max_hz) = spectrum.visualizer_range();
        AnalysisSettings {
            gain,
            smoothing,
            bands_count: spectrum.bands_count(),
            fft_size: spectrum.fft_size(),
            bass_upper_hz,
            mid_upper_hz,
            auto_level_enabled,
            visualizer_min_hz,
            visualizer_max_hz,
        }
    }

    pub fn set_gain(&self, gain: f32) {
        self.ingest.lock().gain = config::clamp_gain(gain);
    }

    pub fn set_smoothing(&self, smoothing: f32) {
        self.ingest.lock().smoothing = config::clamp_smoothing(smoothing);
    }

    pub fn set_auto_level_enabled(&self, enabled: bool) {
        let mut ingest = self.ingest.lock();
        if ingest.auto_level_enabled != enabled {
            ingest.auto_level_enabled = enabled;
            ingest.auto_level.reset();
        }
    }
}

impl PacketSink for SharedSignals {
    fn on_format(&self, format: &StreamFormat) {
        info!(
            "capture format: {} Hz, {} channels, {}-bit ({} valid) {:?}",
            format.sample_rate, format.channels, format.bits_per_sample, format.valid_bits, format.encoding
        );
        if format.encoding == SampleEncoding::Unknown {
            warn!("unrecognized sample encoding, decoding as 16-bit PCM");
        }

        {
            let mut ingest = self.ingest.lock();
            ingest.format = Some(*format);
            let count = format.channels as usize;
            if ingest.channels.count != count {
                ingest.channels = ChannelDiagnostics::with_channels(count);
            }
        }

        if format.sample_rate > 0 {
            self.spectrum.lock().set_sample_rate(format.sample_rate);
        }
    }

    /// Channel meters are normalized after the mono update, so both use the
    /// same auto-level peak and floor.
    fn on_packet(&self, mono: &[i16], channel_levels: &[f32]) {
        self.process_pcm16(mono);
        if !channel_levels.is_empty() {
            self.update_channels(channel_levels);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tone(len: usize, amplitude: f32) -> Vec<i16> {
        (0..len)
            .map(|i| pcm::to_i16(amplitude * (i as f32 * 0.05).sin()))
            .collect()
    }

    #[test]
    fn level_without_auto_level_tracks_rms_times_gain() {
        let shared = SharedSignals::new(&AnalysisSettings {
            smoothing: 0.0,
            auto_level_enabled: false,
            ..Default::default()
        });
        let full = vec![i16::MAX; 256];
        shared.process_pcm16(&full);
        assert_abs_diff_eq!(shared.level(), 1.0, epsilon = 1e-3);

        shared.set_gain(0.5);
        shared.process_pcm16(&full);
        assert_abs_diff_eq!(shared.level(), 0.5, epsilon = 1e-3);
    }

    #[test]
    fn smoothing_blends_with_previous_level() {
        let shared = SharedSignals::new(&AnalysisSettings {
            smoothing: 0.5,
            auto_level_enabled: false,
            ..Default::default()
        });
        shared.process_pcm16(&vec![i16::MAX; 128]);
        assert_abs_diff_eq!(shared.level(), 0.5, epsilon = 1e-3);
        shared.process_pcm16(&vec![0; 128]);
        assert_abs_diff_eq!(shared.level(), 0.25, epsilon = 1e-3);
    }

    #[test]
    fn empty_block_is_ignored() {
        let shared = SharedSignals::new(&AnalysisSettings::default());
        shared.process_pcm16(&[]);
        assert_eq!(shared.level(), 0.0);
    }

    #[test]
    fn format_rebuilds_channel_diagnostics() {
        let shared = SharedSignals::new(&AnalysisSettings::default());
        shared.on_format(&StreamFormat::new(44_100, 6, SampleEncoding::Float32));

        let ingest = shared.ingest.lock();
        assert_eq!(ingest.channels.count, 6);
        assert_eq!(ingest.channels.names[2], "FC");
        drop(ingest);
        assert_eq!(shared.spectrum.lock().sample_rate(), 44_100);
    }

    #[test]
    fn channel_meters_smooth_toward_input() {
        let shared = SharedSignals::new(&AnalysisSettings {
            auto_level_enabled: false,
            ..Default::default()
        });
        let mono = tone(64, 0.5);
        shared.on_packet(&mono, &[1.0, 0.0]);
        {
            let ingest = shared.ingest.lock();
            assert_eq!(ingest.channels.count, 2);
            assert_abs_diff_eq!(ingest.channels.levels[0], 0.3, epsilon = 1e-6);
            assert_eq!(ingest.channels.levels[1], 0.0);
        }
        shared.on_packet(&mono, &[1.0, 0.0]);
        let ingest = shared.ingest.lock();
        assert_abs_diff_eq!(ingest.channels.levels[0], 0.51, epsilon = 1e-6);
    }

    #[test]
    fn channel_meters_share_this_packets_auto_level() {
        let shared = SharedSignals::new(&AnalysisSettings::default());
        // Mono RMS 0.5 lifts the peak to 0.5 and the floor to ~0.0256.
        shared.on_packet(&vec![16_384; 480], &[0.25]);

        let ingest = shared.ingest.lock();
        assert_abs_diff_eq!(ingest.auto_level.peak, 0.5, epsilon = 1e-6);
        let expected = ingest.auto_level.normalize(0.25) * 0.3;
        assert_abs_diff_eq!(ingest.channels.levels[0], expected, epsilon = 1e-6);
        assert!(ingest.channels.levels[0] < 0.2, "meter = {}", ingest.channels.levels[0]);
    }

    #[test]
    fn clear_zeroes_everything() {
        let shared = SharedSignals::new(&AnalysisSettings::default());
        shared.on_packet(&tone(4096, 0.8), &[0.5, 0.5]);
        assert!(shared.level() > 0.0);

        shared.clear();
        assert_eq!(shared.level(), 0.0);
        assert!(shared.spectrum.lock().bands().iter().all(|&v| v == 0.0));
        assert!(shared.ingest.lock().channels.levels.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn settings_reflect_setters() {
        let shared = SharedSignals::new(&AnalysisSettings::default());
        shared.set_gain(1000.0);
        shared.set_smoothing(-3.0);
        shared.set_auto_level_enabled(false);
        let settings = shared.settings();
        assert_eq!(settings.gain, config::MAX_GAIN);
        assert_eq!(settings.smoothing, 0.0);
        assert!(!settings.auto_level_enabled);
        assert_eq!(settings.bands_count, 16);
        assert_eq!(settings.fft_size, 1024);
    }
}
