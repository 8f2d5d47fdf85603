use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// FFT plan, Hann window and scratch buffers for one window size.
///
/// The window is built lazily on first use after every resize, so a stale
/// window can never be applied at the wrong length.
pub struct FftWorkingSet {
    size: usize,
    plan: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl FftWorkingSet {
    /// `size` must be a power of two.
    pub fn new(size: usize) -> Self {
        debug_assert!(size.is_power_of_two());
        let plan = plan_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); plan.get_inplace_scratch_len()];
        Self {
            size,
            plan,
            window: Vec::new(),
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch,
            magnitudes: vec![0.0; size / 2],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of usable magnitude bins (`size / 2`).
    pub fn bins(&self) -> usize {
        self.size / 2
    }

    /// Re-plan for a new window size. Clears the window.
    pub fn resize(&mut self, size: usize) {
        debug_assert!(size.is_power_of_two());
        if size == self.size {
            return;
        }
        self.size = size;
        self.plan = plan_forward(size);
        self.window.clear();
        self.buffer = vec![Complex::new(0.0, 0.0); size];
        self.scratch = vec![Complex::new(0.0, 0.0); self.plan.get_inplace_scratch_len()];
        self.magnitudes = vec![0.0; size / 2];
    }

    /// Window `samples` (exactly `size` long), transform, and return the
    /// normalized magnitudes `|X_k| / (size/2)` for `k < size/2`.
    pub fn magnitudes(&mut self, samples: &[f32]) -> &[f32] {
        debug_assert_eq!(samples.len(), self.size);
        self.ensure_window();

        for ((slot, &sample), &w) in self.buffer.iter_mut().zip(samples).zip(&self.window) {
            *slot = Complex::new(sample * w, 0.0);
        }

        self.plan.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = (self.size as f32 * 0.5).max(1.0);
        for (mag, bin) in self.magnitudes.iter_mut().zip(&self.buffer) {
            let m = bin.norm() / scale;
            *mag = if m.is_finite() { m } else { 0.0 };
        }
        &self.magnitudes
    }

    fn ensure_window(&mut self) {
        if self.window.len() == self.size {
            return;
        }
        self.window = hann_window(self.size);
    }
}

// `FftPlanner` is not `Send`, so plans are built without keeping it.
fn plan_forward(size: usize) -> Arc<dyn Fft<f32>> {
    FftPlanner::new().plan_fft_forward(size)
}

/// Symmetric Hann window: `0.5·(1 − cos(2πi/(N−1)))`.
pub fn hann_window(len: usize) -> Vec<f32> {
    if len <= 1 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f32;
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / denom).cos()))
        .collect()
}

impl fmt::Debug for FftWorkingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftWorkingSet")
            .field("size", &self.size)
            .field("window_ready", &(self.window.len() == self.size))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn hann_window_shape() {
        let w = hann_window(8);
        assert_eq!(w.len(), 8);
        assert_abs_diff_eq!(w[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(w[7], 0.0, epsilon = 1e-6);
        assert!(w[3] > 0.9 && w[4] > 0.9);
        assert_eq!(hann_window(1), vec![1.0]);
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let size = 1024;
        let mut fft = FftWorkingSet::new(size);
        let k = 40;
        let samples: Vec<f32> = (0..size)
            .map(|i| (2.0 * PI * k as f32 * i as f32 / size as f32).sin())
            .collect();

        let mags = fft.magnitudes(&samples);

        assert_eq!(mags.len(), size / 2);
        let peak = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, k);
        // Hann coherent gain is 0.5.
        assert_abs_diff_eq!(mags[k], 0.5, epsilon = 0.01);
    }

    #[test]
    fn resize_replans_and_clears_window() {
        let mut fft = FftWorkingSet::new(512);
        fft.magnitudes(&vec![0.0; 512]);
        fft.resize(2048);

        assert_eq!(fft.size(), 2048);
        assert_eq!(fft.bins(), 1024);
        assert_eq!(format!("{fft:?}"), "FftWorkingSet { size: 2048, window_ready: false }");
        assert_eq!(fft.magnitudes(&vec![0.25; 2048]).len(), 1024);
    }
}
