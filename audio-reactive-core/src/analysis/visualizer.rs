use crate::models::audio_models::SpectrumSnapshot;

use super::bands::{bin_range, compand, LogFrequencyScale};

/// Native resolution of the visualizer buffer.
pub const VISUALIZER_BINS: usize = 256;
const PEAK_DECAY: f32 = 0.92;
const PEAK_FLOOR: f32 = 1e-4;

/// Fixed-resolution log-frequency view of the magnitude spectrum with
/// per-bin peak hold, independent of the analysis band count.
#[derive(Debug, Clone)]
pub struct VisualizerResampler {
    bins: Vec<f32>,
    peaks: Vec<f32>,
    requested_min_hz: f32,
    requested_max_hz: f32,
    min_hz: f32,
    max_hz: f32,
}

impl VisualizerResampler {
    pub fn new(requested_min_hz: f32, requested_max_hz: f32) -> Self {
        Self {
            bins: vec![0.0; VISUALIZER_BINS],
            peaks: vec![0.0; VISUALIZER_BINS],
            requested_min_hz,
            requested_max_hz,
            min_hz: 0.0,
            max_hz: 0.0,
        }
    }

    pub fn set_range(&mut self, min_hz: f32, max_hz: f32) {
        self.requested_min_hz = min_hz;
        self.requested_max_hz = max_hz;
    }

    pub fn requested_range(&self) -> (f32, f32) {
        (self.requested_min_hz, self.requested_max_hz)
    }

    /// Resample one magnitude spectrum (`magnitudes[k]` at `k · bin_hz`).
    pub fn update(&mut self, magnitudes: &[f32], bin_hz: f32) {
        if magnitudes.len() < 2 || !(bin_hz > 0.0) {
            return;
        }

        let nyquist = bin_hz * magnitudes.len() as f32;
        let low = self.requested_min_hz.max(bin_hz);
        let high = self.requested_max_hz.max(low + bin_hz).min(nyquist).max(low + bin_hz);
        let scale = LogFrequencyScale::new(low, high);
        self.min_hz = scale.min_hz;
        self.max_hz = scale.max_hz;

        for (i, (bin, peak)) in self.bins.iter_mut().zip(self.peaks.iter_mut()).enumerate() {
            let (f0, f1) = scale.band_edges(i, VISUALIZER_BINS);
            let (start, end) = bin_range(f0, f1, bin_hz, magnitudes.len());
            let slice = &magnitudes[start..end];
            let mean = slice.iter().sum::<f32>() / slice.len() as f32;
            let value = compand(mean).clamp(0.0, 1.0);

            *bin = value;
            *peak = value.max(*peak * PEAK_DECAY).max(PEAK_FLOOR);
        }
    }

    /// Zero the display while keeping the requested range.
    pub fn clear(&mut self) {
        self.bins.fill(0.0);
        self.peaks.fill(0.0);
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    pub fn peaks(&self) -> &[f32] {
        &self.peaks
    }

    /// Nearest-bucket resample of bins and peaks to `target_bins` entries.
    pub fn snapshot(&self, target_bins: usize) -> SpectrumSnapshot {
        SpectrumSnapshot {
            bins: resample_nearest(&self.bins, target_bins),
            peaks: resample_nearest(&self.peaks, target_bins),
            min_frequency_hz: self.min_hz,
            max_frequency_hz: self.max_hz,
        }
    }
}

/// `out[i] = source[floor((i + 0.5) / target · len)]`.
pub fn resample_nearest(source: &[f32], target: usize) -> Vec<f32> {
    if source.is_empty() {
        return vec![0.0; target];
    }
    let len = source.len();
    (0..target)
        .map(|i| {
            let idx = ((i as f64 + 0.5) / target as f64 * len as f64).floor() as usize;
            source[idx.min(len - 1)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum_with_tone(bin: usize, value: f32) -> Vec<f32> {
        let mut mags = vec![0.0f32; 512];
        mags[bin] = value;
        mags
    }

    #[test]
    fn update_fills_fixed_resolution() {
        let mut vis = VisualizerResampler::new(20.0, 20_000.0);
        vis.update(&spectrum_with_tone(20, 0.5), 46.875);

        assert_eq!(vis.bins().len(), VISUALIZER_BINS);
        assert!(vis.bins().iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(vis.bins().iter().any(|&v| v > 0.5));
        // Low edge is lifted to one FFT bin.
        let snap = vis.snapshot(VISUALIZER_BINS);
        assert_eq!(snap.min_frequency_hz, 46.875);
        assert_eq!(snap.max_frequency_hz, 20_000.0);
    }

    #[test]
    fn max_is_capped_at_nyquist() {
        let mut vis = VisualizerResampler::new(20.0, 96_000.0);
        vis.update(&spectrum_with_tone(20, 0.5), 46.875);
        assert_eq!(vis.snapshot(8).max_frequency_hz, 24_000.0);
    }

    #[test]
    fn peaks_hold_then_decay_to_floor() {
        let mut vis = VisualizerResampler::new(20.0, 20_000.0);
        vis.update(&spectrum_with_tone(20, 0.8), 46.875);
        let held: Vec<f32> = vis.peaks().to_vec();

        vis.update(&vec![0.0; 512], 46.875);
        for (now, before) in vis.peaks().iter().zip(&held) {
            if *before > PEAK_FLOOR / PEAK_DECAY {
                assert!((now - before * PEAK_DECAY).abs() < 1e-6);
            }
        }

        for _ in 0..500 {
            vis.update(&vec![0.0; 512], 46.875);
        }
        assert!(vis.peaks().iter().all(|&p| p == PEAK_FLOOR));
        assert!(vis.bins().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn native_resolution_snapshot_is_identity() {
        let mut vis = VisualizerResampler::new(20.0, 20_000.0);
        vis.update(&spectrum_with_tone(100, 0.3), 46.875);
        let snap = vis.snapshot(VISUALIZER_BINS);
        assert_eq!(snap.bins, vis.bins());
        assert_eq!(snap.peaks, vis.peaks());
    }

    #[test]
    fn snapshot_honours_requested_size() {
        let vis = VisualizerResampler::new(20.0, 20_000.0);
        for n in [1, 7, 64, 255, 256, 257, 1000] {
            let snap = vis.snapshot(n);
            assert_eq!(snap.bins.len(), n);
            assert_eq!(snap.peaks.len(), n);
        }
        assert!(vis.snapshot(0).bins.is_empty());
    }

    #[test]
    fn nearest_resample_picks_bucket_centres() {
        let source = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(resample_nearest(&source, 2), vec![1.0, 3.0]);
        assert_eq!(resample_nearest(&source, 8), vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        assert_eq!(resample_nearest(&[], 3), vec![0.0; 3]);
    }
}
