//! Text rendering of one tick of signals.

use std::fmt::Write;

const BAR_GLYPHS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One glyph per value in 0..=1; out-of-range values are clamped.
pub fn spark_bars(values: &[f32]) -> String {
    values
        .iter()
        .map(|&v| {
            let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
            BAR_GLYPHS[(v * (BAR_GLYPHS.len() - 1) as f32).round() as usize]
        })
        .collect()
}

/// Horizontal meter of `width` cells.
pub fn meter(value: f32, width: usize) -> String {
    let value = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
    let filled = (value * width as f32).round() as usize;
    let mut out = String::with_capacity(width);
    out.extend(std::iter::repeat('#').take(filled));
    out.extend(std::iter::repeat('.').take(width - filled));
    out
}

/// Scalar readout of the per-tick signals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Readout {
    pub level: f32,
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub onset: f32,
}

pub fn status_line(readout: &Readout, bands: &[f32]) -> String {
    let mut line = String::new();
    let _ = write!(
        line,
        "lvl [{}] {:.2}  b {:.2} m {:.2} t {:.2}  onset {:.2}  |{}|",
        meter(readout.level, 20),
        readout.level,
        readout.bass,
        readout.mid,
        readout.treble,
        readout.onset,
        spark_bars(bands)
    );
    line
}
