use std::fmt;
use std::sync::Arc;

use crate::models::audio_models::{ChannelDiagnostics, SpectrumSnapshot};

use super::shared::SharedSignals;

/// Read-only handle onto a session's live signals.
///
/// Cloning is cheap and clones observe the same session. Every accessor takes
/// at most one short lock (the level takes none), so readers can poll at
/// frame rate from any thread without stalling the capture thread.
#[derive(Clone)]
pub struct SignalReader {
    shared: Arc<SharedSignals>,
}

impl SignalReader {
    pub(crate) fn new(shared: Arc<SharedSignals>) -> Self {
        Self { shared }
    }

    /// Smoothed loudness in 0..=1.
    pub fn level(&self) -> f32 {
        self.shared.level()
    }

    /// Copy of the band spectrum.
    pub fn bands(&self) -> Vec<f32> {
        self.shared.spectrum.lock().bands().to_vec()
    }

    /// Copy the band spectrum into `out`, reusing its allocation.
    pub fn bands_into(&self, out: &mut Vec<f32>) {
        let spectrum = self.shared.spectrum.lock();
        out.clear();
        out.extend_from_slice(spectrum.bands());
    }

    pub fn bands_count(&self) -> usize {
        self.shared.spectrum.lock().bands_count()
    }

    pub fn bass_level(&self) -> f32 {
        self.shared.spectrum.lock().bass()
    }

    pub fn mid_level(&self) -> f32 {
        self.shared.spectrum.lock().mid()
    }

    pub fn treble_level(&self) -> f32 {
        self.shared.spectrum.lock().treble()
    }

    pub fn onset_level(&self) -> f32 {
        self.shared.spectrum.lock().onset()
    }

    /// Mean band value over `[low_hz, high_hz]`, in 0..=1.
    pub fn band_energy_hz(&self, low_hz: f32, high_hz: f32) -> f32 {
        self.shared.spectrum.lock().band_energy_hz(low_hz, high_hz)
    }

    pub fn channel_diagnostics(&self) -> ChannelDiagnostics {
        self.shared.ingest.lock().channels.clone()
    }

    /// Visualizer spectrum resampled to `target_bins` buckets.
    pub fn spectrum_snapshot(&self, target_bins: usize) -> SpectrumSnapshot {
        self.shared.spectrum.lock().spectrum_snapshot(target_bins)
    }

    pub fn fft_size(&self) -> usize {
        self.shared.spectrum.lock().fft_size()
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.spectrum.lock().sample_rate()
    }
}

impl fmt::Debug for SignalReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalReader").field("level", &self.level()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::AnalysisSettings;
    use crate::processing::pcm;

    fn reader() -> SignalReader {
        SignalReader::new(Arc::new(SharedSignals::new(&AnalysisSettings::default())))
    }

    #[test]
    fn fresh_reader_reports_silence() {
        let r = reader();
        assert_eq!(r.level(), 0.0);
        assert_eq!(r.bands(), vec![0.0; 16]);
        assert_eq!(r.bands_count(), 16);
        assert_eq!((r.bass_level(), r.mid_level(), r.treble_level(), r.onset_level()), (0.0, 0.0, 0.0, 0.0));
        assert_eq!(r.fft_size(), 1024);
        assert_eq!(r.sample_rate(), 48_000);
        assert_eq!(r.channel_diagnostics().count, 0);
        assert_eq!(r.spectrum_snapshot(256).bins.len(), 256);
    }

    #[test]
    fn clones_share_state() {
        let r = reader();
        let clone = r.clone();
        let samples: Vec<i16> = (0..2048).map(|i| pcm::to_i16(0.7 * (i as f32 * 0.1).sin())).collect();
        r.shared.process_pcm16(&samples);

        assert!(clone.level() > 0.0);
        assert_eq!(clone.bands(), r.bands());
    }

    #[test]
    fn bands_into_reuses_buffer() {
        let r = reader();
        let mut out = vec![9.0; 40];
        r.bands_into(&mut out);
        assert_eq!(out.len(), 16);
        assert!(out.iter().all(|&v| v == 0.0));
    }
}
