use super::bands::compand;

/// Weight of the previous onset value in its fixed EMA.
const ONSET_RETAIN: f32 = 0.6;

/// Spectral-flux onset strength.
///
/// Sums the positive frame-to-frame magnitude changes, compands the sum like
/// the band spectrum and smooths it with a fixed 0.6/0.4 EMA that is
/// independent of the user smoothing control.
#[derive(Debug, Default, Clone)]
pub struct OnsetDetector {
    previous: Vec<f32>,
    level: f32,
}

impl OnsetDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current smoothed onset strength in 0..=1.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Feed one unsmoothed magnitude spectrum and return the updated strength.
    pub fn update(&mut self, magnitudes: &[f32]) -> f32 {
        if self.previous.len() != magnitudes.len() {
            self.previous = vec![0.0; magnitudes.len()];
        }

        let flux: f32 = magnitudes
            .iter()
            .zip(&self.previous)
            .map(|(&current, &prev)| (current - prev).max(0.0))
            .sum();
        self.previous.copy_from_slice(magnitudes);

        let novelty = compand(flux).min(1.0);
        self.level = (ONSET_RETAIN * self.level + (1.0 - ONSET_RETAIN) * novelty).clamp(0.0, 1.0);
        self.level
    }

    /// Forget the previous spectrum (e.g. after a resize).
    pub fn clear_history(&mut self) {
        self.previous.clear();
    }

    pub fn reset(&mut self) {
        self.previous.clear();
        self.level = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn steady_spectrum_has_no_flux() {
        let mut onset = OnsetDetector::new();
        let frame = vec![0.2f32; 64];
        onset.update(&frame);
        for _ in 0..40 {
            onset.update(&frame);
        }
        assert!(onset.level() < 1e-6);
    }

    #[test]
    fn rising_energy_drives_onset() {
        let mut onset = OnsetDetector::new();
        onset.update(&vec![0.0f32; 64]);
        let level = onset.update(&vec![0.5f32; 64]);
        // flux = 32 -> companded past 1 -> 0.4 after one frame
        assert_abs_diff_eq!(level, 0.4, epsilon = 1e-6);
        let level = onset.update(&vec![1.0f32; 64]);
        assert_abs_diff_eq!(level, 0.64, epsilon = 1e-6);
    }

    #[test]
    fn falling_energy_is_ignored() {
        let mut onset = OnsetDetector::new();
        onset.update(&vec![1.0f32; 16]);
        let before = onset.level();
        let after = onset.update(&vec![0.0f32; 16]);
        assert!(after < before);
        assert_abs_diff_eq!(after, before * 0.6, epsilon = 1e-6);
    }

    #[test]
    fn length_change_restarts_history() {
        let mut onset = OnsetDetector::new();
        onset.update(&vec![1.0f32; 16]);
        onset.clear_history();
        let level = onset.update(&vec![1.0f32; 32]);
        assert!(level > 0.0);
        onset.reset();
        assert_eq!(onset.level(), 0.0);
    }
}
