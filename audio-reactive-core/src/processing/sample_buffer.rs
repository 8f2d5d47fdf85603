/// Rolling mono sample buffer feeding the spectrum analyzer.
///
/// Samples are appended as they arrive. Once at least one FFT window is
/// available the analyzer reads the most recent `window` samples and the
/// buffer is trimmed from the front, keeping half a window as overlap for the
/// next analysis frame.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    samples: Vec<f32>,
}

impl SampleBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn extend(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }

    /// Whether a full window of `size` samples is available.
    pub fn has_window(&self, size: usize) -> bool {
        size > 0 && self.samples.len() >= size
    }

    /// The most recent `size` samples, or `None` if fewer are buffered.
    pub fn latest(&self, size: usize) -> Option<&[f32]> {
        if !self.has_window(size) {
            return None;
        }
        Some(&self.samples[self.samples.len() - size..])
    }

    /// Drop everything except the most recent `keep` samples (at least one).
    pub fn retain_latest(&mut self, keep: usize) {
        let keep = keep.max(1);
        if self.samples.len() > keep {
            let excess = self.samples.len() - keep;
            self.samples.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
