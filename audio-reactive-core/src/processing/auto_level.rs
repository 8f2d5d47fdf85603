/// Adaptive peak/floor tracker that maps an absolute loudness onto 0..1.
///
/// The peak jumps to any louder value and otherwise decays geometrically
/// toward `min_peak`. The floor follows the signal asymmetrically: it sinks
/// slowly during quiet passages and climbs quickly when the signal gets
/// louder, so short gaps do not stretch the normalized range.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoLevel {
    pub peak: f32,
    pub floor: f32,
    pub min_peak: f32,
    pub peak_decay: f32,
    pub floor_decay: f32,
    pub floor_rise: f32,
    pub min_range: f32,
}

/// Lowest value the floor may reach.
pub const FLOOR_EPSILON: f32 = 1e-6;
/// The floor never exceeds this fraction of the peak.
pub const FLOOR_PEAK_RATIO: f32 = 0.9;

impl Default for AutoLevel {
    fn default() -> Self {
        Self {
            peak: 0.0025,
            floor: 0.0006,
            min_peak: 0.0006,
            peak_decay: 0.995,
            floor_decay: 0.9995,
            floor_rise: 0.05,
            min_range: 0.01,
        }
    }
}

impl AutoLevel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the initial tracking state, keeping the tuning constants.
    pub fn reset(&mut self) {
        let initial = Self::default();
        self.peak = initial.peak.max(self.min_peak);
        self.floor = initial.floor;
        self.enforce_invariants();
    }

    /// Track `value` and return it normalized into 0..=1.
    pub fn update(&mut self, value: f32) -> f32 {
        let value = sanitize(value);

        if value > self.peak {
            self.peak = value;
        } else {
            self.peak = (self.peak * self.peak_decay).max(self.min_peak);
        }

        if value < self.floor {
            self.floor = self.floor * self.floor_decay + value * (1.0 - self.floor_decay);
        } else {
            self.floor += (value - self.floor) * self.floor_rise;
        }

        self.enforce_invariants();
        self.normalize(value)
    }

    /// Normalize through the current peak/floor without updating them.
    pub fn normalize(&self, value: f32) -> f32 {
        let value = sanitize(value);
        let range = (self.peak - self.floor).max(self.min_range).max(FLOOR_EPSILON);
        ((value - self.floor) / range).clamp(0.0, 1.0)
    }

    fn enforce_invariants(&mut self) {
        self.peak = self.peak.max(self.min_peak);
        self.floor = self.floor.min(FLOOR_PEAK_RATIO * self.peak).max(FLOOR_EPSILON);
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_invariants(level: &AutoLevel) {
        assert!(level.peak >= level.min_peak);
        assert!(level.floor >= FLOOR_EPSILON);
        assert!(level.floor <= FLOOR_PEAK_RATIO * level.peak + 1e-9);
    }

    #[test]
    fn peak_snaps_to_louder_values() {
        let mut level = AutoLevel::new();
        let out = level.update(0.5);

        assert_eq!(level.peak, 0.5);
        assert!(out > 0.9);
        assert_invariants(&level);
    }

    #[test]
    fn peak_decays_toward_minimum() {
        let mut level = AutoLevel::new();
        level.update(0.5);
        for _ in 0..5000 {
            level.update(0.0);
        }

        assert_abs_diff_eq!(level.peak, level.min_peak, epsilon = 1e-6);
        assert_invariants(&level);
    }

    #[test]
    fn floor_rises_faster_than_it_falls() {
        let mut rising = AutoLevel::new();
        rising.peak = 1.0;
        rising.floor = 0.1;
        rising.update(0.5);
        let rise = rising.floor - 0.1;

        let mut falling = AutoLevel::new();
        falling.peak = 1.0;
        falling.floor = 0.5;
        falling.update(0.1);
        let fall = 0.5 - falling.floor;

        assert!(rise > 0.0 && fall > 0.0);
        assert!(rise > fall * 10.0);
    }

    #[test]
    fn silence_normalizes_to_zero() {
        let mut level = AutoLevel::new();
        for _ in 0..100 {
            assert_eq!(level.update(0.0), 0.0);
        }
    }

    #[test]
    fn output_stays_in_unit_range() {
        let mut level = AutoLevel::new();
        let inputs = [0.0, 1e-9, 0.3, 40.0, 0.001, f32::NAN, f32::INFINITY, -3.0, 0.02];
        for _ in 0..50 {
            for &v in &inputs {
                let out = level.update(v);
                assert!((0.0..=1.0).contains(&out), "{v} -> {out}");
                assert_invariants(&level);
            }
        }
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut level = AutoLevel::new();
        level.update(2.0);
        level.reset();
        assert_eq!(level, AutoLevel::default());
    }

    #[test]
    fn normalize_uses_min_range() {
        let level = AutoLevel {
            peak: 0.0010,
            floor: 0.0005,
            ..AutoLevel::default()
        };
        // Range 0.0005 < min_range 0.01
        assert_abs_diff_eq!(level.normalize(0.0055), 0.5, epsilon = 1e-4);
    }
}
