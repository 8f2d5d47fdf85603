//! Log-frequency band geometry.
//!
//! Band `b` of `n` covers `[f_min·R^(b/n), f_min·R^((b+1)/n))` with
//! `R = f_max / f_min`. The same mapping is used to build the band spectrum,
//! to place the bass/mid/treble crossovers and to answer arbitrary Hz-range
//! queries, so all three agree on which band a frequency belongs to.

/// Guard for log/ratio denominators.
const EPSILON: f32 = 1e-6;

/// `log10(1 + 9v)`: maps 0..1 onto 0..1 while lifting quiet content.
pub fn compand(value: f32) -> f32 {
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    (1.0 + 9.0 * value).log10()
}

/// A logarithmic frequency axis between two positive bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogFrequencyScale {
    pub min_hz: f32,
    pub max_hz: f32,
}

impl LogFrequencyScale {
    pub fn new(min_hz: f32, max_hz: f32) -> Self {
        let min_hz = if min_hz.is_finite() { min_hz.max(EPSILON) } else { 1.0 };
        let max_hz = if max_hz.is_finite() && max_hz > min_hz {
            max_hz
        } else {
            min_hz * 2.0
        };
        Self { min_hz, max_hz }
    }

    /// The analysis axis: one FFT bin (at least 1 Hz) up to Nyquist.
    pub fn for_analysis(sample_rate: u32, fft_size: usize) -> Self {
        let fs = sample_rate.max(1) as f32;
        let bin_hz = fs / fft_size.max(1) as f32;
        Self::new(bin_hz.max(1.0), fs * 0.5)
    }

    /// Frequency at normalized position `t` (0 = min, 1 = max).
    pub fn frequency_at(&self, t: f32) -> f32 {
        self.min_hz * (self.max_hz / self.min_hz).powf(t)
    }

    /// Lower and upper edge of band `band` out of `count`.
    pub fn band_edges(&self, band: usize, count: usize) -> (f32, f32) {
        let count = count.max(1) as f32;
        (
            self.frequency_at(band as f32 / count),
            self.frequency_at((band + 1) as f32 / count),
        )
    }

    /// Normalized log position of `hz` on this axis (unclamped).
    pub fn position(&self, hz: f32) -> f32 {
        let span = (self.max_hz / self.min_hz).ln().max(EPSILON);
        (hz.max(EPSILON) / self.min_hz).ln() / span
    }

    /// Index of the band containing `hz`, clamped to `0..=count`.
    ///
    /// `count` itself is returned for frequencies at or above `max_hz`, which
    /// lets callers use the result as an exclusive range end.
    pub fn band_index(&self, hz: f32, count: usize) -> usize {
        let index = (self.position(hz) * count as f32).floor();
        if index.is_nan() || index <= 0.0 {
            0
        } else {
            (index as usize).min(count)
        }
    }
}

/// Map a magnitude spectrum onto `out.len()` log bands.
///
/// `magnitudes[k]` is the magnitude at `k · bin_hz`; bin 0 (DC) is never
/// used. Each band is the mean of the bins whose centre falls inside it, with
/// at least one bin always contributing. The result is companded and then
/// normalized so the loudest band of this frame is exactly 1 (unless the
/// whole frame is silent).
pub fn map_log_bands(magnitudes: &[f32], bin_hz: f32, scale: &LogFrequencyScale, out: &mut [f32]) {
    let count = out.len();
    if count == 0 {
        return;
    }
    if magnitudes.len() < 2 || !(bin_hz > 0.0) {
        out.fill(0.0);
        return;
    }

    for (band, slot) in out.iter_mut().enumerate() {
        let (low, high) = scale.band_edges(band, count);
        let (start, end) = bin_range(low, high, bin_hz, magnitudes.len());
        let bins = &magnitudes[start..end];
        let mean = bins.iter().sum::<f32>() / bins.len() as f32;
        *slot = compand(mean);
    }

    let max = out.iter().copied().fold(EPSILON, f32::max);
    for value in out.iter_mut() {
        *value = (*value / max).min(1.0);
    }
}

/// FFT bin index range `[start, end)` whose centres fall in `[low_hz, high_hz)`.
///
/// A range narrower than the bin spacing gets the single bin closest to its
/// geometric centre. Never empty, never includes DC, never exceeds `len`.
/// Requires `len >= 2`.
pub fn bin_range(low_hz: f32, high_hz: f32, bin_hz: f32, len: usize) -> (usize, usize) {
    debug_assert!(len >= 2);
    let last = len.saturating_sub(1).max(1);
    let start = ((low_hz / bin_hz).ceil().max(1.0) as usize).min(len);
    let end = ((high_hz / bin_hz).ceil().max(0.0) as usize).min(len);
    if end > start {
        return (start, end);
    }
    let centre = (low_hz.max(0.0) * high_hz.max(0.0)).sqrt() / bin_hz;
    let nearest = (centre.round().max(1.0) as usize).min(last);
    (nearest, nearest + 1)
}

/// Bass/mid/treble means of `bands` split at two crossover frequencies.
///
/// Bass and mid always cover at least one band each; treble may be empty (0).
pub fn aggregate(bands: &[f32], scale: &LogFrequencyScale, bass_upper_hz: f32, mid_upper_hz: f32) -> (f32, f32, f32) {
    let count = bands.len();
    if count < 2 {
        let v = bands.first().copied().unwrap_or(0.0);
        return (v, v, 0.0);
    }

    let bass_end = scale.band_index(bass_upper_hz, count).clamp(1, count - 1);
    let mid_end = scale.band_index(mid_upper_hz, count).clamp(bass_end + 1, count);

    (
        mean(&bands[..bass_end]),
        mean(&bands[bass_end..mid_end]),
        mean(&bands[mid_end..]),
    )
}

/// Mean band value over an arbitrary `[low_hz, high_hz)` range.
///
/// Both ends are clamped onto the axis and mapped to band indices in
/// `0..count`. A range that collapses onto one band is widened to include the
/// next one when there is one.
pub fn band_energy(bands: &[f32], scale: &LogFrequencyScale, low_hz: f32, high_hz: f32) -> f32 {
    let count = bands.len();
    if count == 0 {
        return 0.0;
    }
    let low_hz = if low_hz.is_finite() { low_hz } else { scale.min_hz };
    let mut high_hz = if high_hz.is_finite() { high_hz } else { scale.max_hz };
    if high_hz <= low_hz {
        high_hz = low_hz + 1.0;
    }

    let index = |hz: f32| {
        let hz = hz.clamp(scale.min_hz, scale.max_hz);
        scale.band_index(hz, count).min(count - 1)
    };
    let mut first = index(low_hz);
    let mut last = index(high_hz);
    if last < first {
        std::mem::swap(&mut first, &mut last);
    }
    if last == first {
        last = (first + 1).min(count - 1);
    }

    mean(&bands[first..=last]).clamp(0.0, 1.0)
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}
