use serde::{Deserialize, Serialize};

pub const MIN_GAIN: f32 = 0.05;
pub const MAX_GAIN: f32 = 40.0;
pub const MAX_SMOOTHING: f32 = 0.99;
pub const BAND_COUNTS: [usize; 3] = [8, 16, 32];
pub const MIN_FFT_SIZE: usize = 512;
pub const MAX_FFT_SIZE: usize = 8192;
/// Lowest accepted bass crossover.
pub const MIN_CROSSOVER_HZ: f32 = 20.0;

/// Tunable analysis parameters.
///
/// This is the value the (external) settings layer reads and writes as part
/// of its own document. Every field is clamped rather than rejected; see
/// [`AnalysisSettings::sanitized`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisSettings {
    /// Linear gain applied to the RMS level, 0.05..=40.
    pub gain: f32,

    /// EMA coefficient shared by the level and the band spectrum, 0..=0.99.
    pub smoothing: f32,

    /// Number of log-spaced analysis bands: 8, 16 or 32.
    pub bands_count: usize,

    /// FFT window length, a power of two in 512..=8192.
    pub fft_size: usize,

    /// Upper edge of the bass aggregate in Hz.
    pub bass_upper_hz: f32,

    /// Upper edge of the mid aggregate in Hz, strictly above `bass_upper_hz`.
    pub mid_upper_hz: f32,

    /// Adaptive peak/floor normalization of the level.
    pub auto_level_enabled: bool,

    /// Requested lower bound of the visualizer spectrum.
    pub visualizer_min_hz: f32,

    /// Requested upper bound of the visualizer spectrum.
    pub visualizer_max_hz: f32,
}

impl AnalysisSettings {
    /// Returns a copy with every field clamped into its documented range.
    pub fn sanitized(&self) -> Self {
        let (bass_upper_hz, mid_upper_hz) = clamp_crossovers(self.bass_upper_hz, self.mid_upper_hz);
        let (visualizer_min_hz, visualizer_max_hz) =
            clamp_visualizer_range(self.visualizer_min_hz, self.visualizer_max_hz);
        Self {
            gain: clamp_gain(self.gain),
            smoothing: clamp_smoothing(self.smoothing),
            bands_count: coerce_bands_count(self.bands_count),
            fft_size: coerce_fft_size(self.fft_size),
            bass_upper_hz,
            mid_upper_hz,
            auto_level_enabled: self.auto_level_enabled,
            visualizer_min_hz,
            visualizer_max_hz,
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            gain: 1.0,
            smoothing: 0.8,
            bands_count: 16,
            fft_size: 1024,
            bass_upper_hz: 200.0,
            mid_upper_hz: 2000.0,
            auto_level_enabled: true,
            visualizer_min_hz: 20.0,
            visualizer_max_hz: 20_000.0,
        }
    }
}

pub fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        return 1.0;
    }
    gain.clamp(MIN_GAIN, MAX_GAIN)
}

pub fn clamp_smoothing(smoothing: f32) -> f32 {
    if smoothing.is_nan() {
        return 0.0;
    }
    smoothing.clamp(0.0, MAX_SMOOTHING)
}

/// Snap to the nearest supported band count; ties go to the larger count.
pub fn coerce_bands_count(bands: usize) -> usize {
    let mut best = BAND_COUNTS[0];
    for &candidate in &BAND_COUNTS {
        if candidate.abs_diff(bands) <= best.abs_diff(bands) {
            best = candidate;
        }
    }
    best
}

/// Clamp to 512..=8192 and pick whichever neighbouring power of two is
/// numerically closer. Exact ties resolve to the lower power.
pub fn coerce_fft_size(size: usize) -> usize {
    let n = size.clamp(MIN_FFT_SIZE, MAX_FFT_SIZE);
    let next = n.next_power_of_two();
    let prev = (next >> 1).max(MIN_FFT_SIZE);
    let chosen = if next - n < n - prev { next } else { prev };
    chosen.clamp(MIN_FFT_SIZE, MAX_FFT_SIZE)
}

pub fn clamp_crossovers(bass_upper_hz: f32, mid_upper_hz: f32) -> (f32, f32) {
    let bass = if bass_upper_hz.is_finite() {
        bass_upper_hz.max(MIN_CROSSOVER_HZ)
    } else {
        MIN_CROSSOVER_HZ
    };
    let mid = if mid_upper_hz.is_finite() && mid_upper_hz > bass {
        mid_upper_hz
    } else {
        bass + 1.0
    };
    (bass, mid)
}

pub fn clamp_visualizer_range(min_hz: f32, max_hz: f32) -> (f32, f32) {
    let min = if min_hz.is_finite() { min_hz.max(1.0) } else { 20.0 };
    let max = if max_hz.is_finite() && max_hz > min { max_hz } else { min + 1.0 };
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fft_size_picks_closest_power_of_two() {
        assert_eq!(coerce_fft_size(0), 512);
        assert_eq!(coerce_fft_size(512), 512);
        assert_eq!(coerce_fft_size(700), 512);
        assert_eq!(coerce_fft_size(768), 512);
        assert_eq!(coerce_fft_size(769), 1024);
        assert_eq!(coerce_fft_size(1024), 1024);
        assert_eq!(coerce_fft_size(3000), 2048);
        assert_eq!(coerce_fft_size(3100), 4096);
        assert_eq!(coerce_fft_size(8192), 8192);
        assert_eq!(coerce_fft_size(100_000), 8192);
    }

    #[test]
    fn fft_size_always_power_of_two_in_range() {
        for n in (512..=8192).step_by(37) {
            let size = coerce_fft_size(n);
            assert!(size.is_power_of_two());
            assert!((512..=8192).contains(&size));
            let lower = n.next_power_of_two() >> 1;
            let upper = n.next_power_of_two();
            let best = [lower.max(512), upper.min(8192)]
                .into_iter()
                .map(|p| p.abs_diff(n))
                .min()
                .unwrap();
            assert_eq!(size.abs_diff(n), best, "n = {n}");
        }
    }

    #[test]
    fn bands_snap_to_supported_counts() {
        assert_eq!(coerce_bands_count(0), 8);
        assert_eq!(coerce_bands_count(8), 8);
        assert_eq!(coerce_bands_count(12), 16);
        assert_eq!(coerce_bands_count(16), 16);
        assert_eq!(coerce_bands_count(23), 16);
        assert_eq!(coerce_bands_count(24), 32);
        assert_eq!(coerce_bands_count(1000), 32);
    }

    #[test]
    fn gain_and_smoothing_clamp() {
        assert_eq!(clamp_gain(0.0), MIN_GAIN);
        assert_eq!(clamp_gain(100.0), MAX_GAIN);
        assert_eq!(clamp_gain(f32::NAN), 1.0);
        assert_eq!(clamp_smoothing(-1.0), 0.0);
        assert_eq!(clamp_smoothing(1.0), MAX_SMOOTHING);
    }

    #[test]
    fn crossovers_stay_strictly_increasing() {
        assert_eq!(clamp_crossovers(5.0, 2000.0), (20.0, 2000.0));
        assert_eq!(clamp_crossovers(300.0, 300.0), (300.0, 301.0));
        assert_eq!(clamp_crossovers(300.0, 100.0), (300.0, 301.0));
    }

    #[test]
    fn settings_round_trip_through_json() {
        let settings = AnalysisSettings {
            gain: 2.5,
            bands_count: 32,
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"bandsCount\":32"));
        assert!(json.contains("\"autoLevelEnabled\":true"));
        let parsed: AnalysisSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let parsed: AnalysisSettings = serde_json::from_str(r#"{"gain": 3.0}"#).unwrap();
        assert_eq!(parsed.gain, 3.0);
        assert_eq!(parsed.bands_count, 16);
        assert_eq!(parsed.fft_size, 1024);
    }

    #[test]
    fn sanitized_clamps_everything() {
        let raw = AnalysisSettings {
            gain: 99.0,
            smoothing: 5.0,
            bands_count: 10,
            fft_size: 1500,
            bass_upper_hz: 1.0,
            mid_upper_hz: 0.0,
            auto_level_enabled: false,
            visualizer_min_hz: -5.0,
            visualizer_max_hz: 0.0,
        };
        let clean = raw.sanitized();
        assert_eq!(clean.gain, MAX_GAIN);
        assert_eq!(clean.smoothing, MAX_SMOOTHING);
        assert_eq!(clean.bands_count, 8);
        assert_eq!(clean.fft_size, 1024);
        assert_eq!(clean.bass_upper_hz, 20.0);
        assert_eq!(clean.mid_upper_hz, 21.0);
        assert!(!clean.auto_level_enabled);
        assert!(clean.visualizer_max_hz > clean.visualizer_min_hz);
    }
}
