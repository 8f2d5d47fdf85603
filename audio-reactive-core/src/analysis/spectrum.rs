use log::debug;

use crate::models::audio_models::SpectrumSnapshot;
use crate::models::config::{self, AnalysisSettings};
use crate::processing::pcm;
use crate::processing::sample_buffer::SampleBuffer;

use super::bands::{self, LogFrequencyScale};
use super::fft::FftWorkingSet;
use super::onset::OnsetDetector;
use super::visualizer::VisualizerResampler;

/// Windowed-FFT band analyzer.
///
/// Owns the rolling sample buffer and everything derived from it. Each time
/// a full window is buffered it computes one analysis frame (bands,
/// bass/mid/treble, onset, visualizer) and keeps half a window as overlap.
/// All of this happens on the thread that pushes samples, which is the
/// capture thread in a live session.
#[derive(Debug)]
pub struct SpectrumAnalyzer {
    sample_rate: u32,
    buffer: SampleBuffer,
    fft: FftWorkingSet,
    bands: Vec<f32>,
    frame_bands: Vec<f32>,
    bass_upper_hz: f32,
    mid_upper_hz: f32,
    bass: f32,
    mid: f32,
    treble: f32,
    onset: OnsetDetector,
    visualizer: VisualizerResampler,
    scratch: Vec<f32>,
}

impl SpectrumAnalyzer {
    pub fn new(settings: &AnalysisSettings, sample_rate: u32) -> Self {
        let settings = settings.sanitized();
        Self {
            sample_rate: sample_rate.max(1),
            buffer: SampleBuffer::with_capacity(settings.fft_size * 2),
            fft: FftWorkingSet::new(settings.fft_size),
            bands: vec![0.0; settings.bands_count],
            frame_bands: vec![0.0; settings.bands_count],
            bass_upper_hz: settings.bass_upper_hz,
            mid_upper_hz: settings.mid_upper_hz,
            bass: 0.0,
            mid: 0.0,
            treble: 0.0,
            onset: OnsetDetector::new(),
            visualizer: VisualizerResampler::new(settings.visualizer_min_hz, settings.visualizer_max_hz),
            scratch: Vec::new(),
        }
    }

    /// Append normalized mono samples, running one analysis frame whenever a
    /// full window is available. Returns the number of frames computed.
    pub fn push_samples(&mut self, samples: &[f32], smoothing: f32) -> usize {
        let size = self.fft.size();
        let hop = (size / 2).max(1);
        let mut computed = 0;
        let mut rest = samples;

        // Feed in hop-sized pieces so a long batch yields every overlapped
        // frame instead of only the last one.
        while !rest.is_empty() {
            let need = size.saturating_sub(self.buffer.len()).max(1);
            let take = need.min(rest.len());
            self.buffer.extend(&rest[..take]);
            rest = &rest[take..];

            if self.buffer.has_window(size) {
                self.compute(smoothing);
                self.buffer.retain_latest(hop);
                computed += 1;
            }
        }
        computed
    }

    /// [`push_samples`](Self::push_samples) for PCM16 input.
    pub fn push_pcm16(&mut self, samples: &[i16], smoothing: f32) -> usize {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.extend(samples.iter().map(|&s| pcm::from_i16(s)));
        let computed = self.push_samples(&scratch, smoothing);
        self.scratch = scratch;
        computed
    }

    fn compute(&mut self, smoothing: f32) {
        let size = self.fft.size();
        let Some(window) = self.buffer.latest(size) else {
            return;
        };

        let scale = self.scale();
        let bin_hz = self.sample_rate as f32 / size as f32;
        let alpha = config::clamp_smoothing(smoothing);

        let magnitudes = self.fft.magnitudes(window);

        bands::map_log_bands(magnitudes, bin_hz, &scale, &mut self.frame_bands);
        if self.bands.len() != self.frame_bands.len() {
            self.bands = vec![0.0; self.frame_bands.len()];
        }
        for (band, &fresh) in self.bands.iter_mut().zip(&self.frame_bands) {
            *band = (alpha * *band + (1.0 - alpha) * fresh).clamp(0.0, 1.0);
        }

        let (bass, mid, treble) = bands::aggregate(&self.bands, &scale, self.bass_upper_hz, self.mid_upper_hz);
        self.bass = bass;
        self.mid = mid;
        self.treble = treble;

        self.onset.update(magnitudes);
        self.visualizer.update(magnitudes, bin_hz);
    }

    /// Analysis frequency axis for the current sample rate and FFT size.
    pub fn scale(&self) -> LogFrequencyScale {
        LogFrequencyScale::for_analysis(self.sample_rate, self.fft.size())
    }

    /// Change the FFT size (already coerced). Discards the window, previous
    /// magnitudes, bands and buffered samples. Returns whether it changed.
    pub fn set_fft_size(&mut self, size: usize) -> bool {
        if size == self.fft.size() {
            return false;
        }
        debug!("fft size {} -> {}", self.fft.size(), size);
        self.fft.resize(size);
        self.discard_geometry();
        true
    }

    /// Change the band count (already coerced). Same reset as an FFT resize.
    pub fn set_bands_count(&mut self, count: usize) -> bool {
        if count == self.bands.len() {
            return false;
        }
        debug!("band count {} -> {}", self.bands.len(), count);
        self.bands = vec![0.0; count];
        self.frame_bands = vec![0.0; count];
        self.discard_geometry();
        true
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) -> bool {
        if sample_rate == 0 || sample_rate == self.sample_rate {
            return false;
        }
        debug!("sample rate {} -> {}", self.sample_rate, sample_rate);
        self.sample_rate = sample_rate;
        self.buffer.clear();
        self.onset.clear_history();
        true
    }

    pub fn set_crossovers(&mut self, bass_upper_hz: f32, mid_upper_hz: f32) {
        self.bass_upper_hz = bass_upper_hz;
        self.mid_upper_hz = mid_upper_hz;
    }

    pub fn set_visualizer_range(&mut self, min_hz: f32, max_hz: f32) {
        self.visualizer.set_range(min_hz, max_hz);
    }

    fn discard_geometry(&mut self) {
        self.bands.fill(0.0);
        self.frame_bands.fill(0.0);
        self.onset.clear_history();
        self.buffer.clear();
    }

    /// Zero every published signal and drop buffered audio. Used when
    /// capture stops so readers fall back to silence.
    pub fn clear_signals(&mut self) {
        self.bands.fill(0.0);
        self.frame_bands.fill(0.0);
        self.bass = 0.0;
        self.mid = 0.0;
        self.treble = 0.0;
        self.onset.reset();
        self.visualizer.clear();
        self.buffer.clear();
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn fft_size(&self) -> usize {
        self.fft.size()
    }

    pub fn bands(&self) -> &[f32] {
        &self.bands
    }

    pub fn bands_count(&self) -> usize {
        self.bands.len()
    }

    pub fn crossovers(&self) -> (f32, f32) {
        (self.bass_upper_hz, self.mid_upper_hz)
    }

    pub fn visualizer_range(&self) -> (f32, f32) {
        self.visualizer.requested_range()
    }

    pub fn bass(&self) -> f32 {
        self.bass
    }

    pub fn mid(&self) -> f32 {
        self.mid
    }

    pub fn treble(&self) -> f32 {
        self.treble
    }

    pub fn onset(&self) -> f32 {
        self.onset.level()
    }

    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    pub fn band_energy_hz(&self, low_hz: f32, high_hz: f32) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        bands::band_energy(&self.bands, &self.scale(), low_hz, high_hz)
    }

    pub fn spectrum_snapshot(&self, target_bins: usize) -> SpectrumSnapshot {
        self.visualizer.snapshot(target_bins)
    }
}
