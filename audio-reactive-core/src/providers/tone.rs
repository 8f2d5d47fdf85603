//! Synthetic capture backend.
//!
//! Generates an interleaved float sine on a dedicated thread and pushes it
//! through the same packet normalization a hardware backend uses. Useful on
//! hosts without a platform backend and for exercising the threaded pipeline
//! in tests.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info};
use parking_lot::Mutex;

use crate::models::audio_models::{EndpointDescriptor, SampleEncoding, StreamFormat};
use crate::models::error::CaptureError;
use crate::processing::pcm;
use crate::traits::capture_provider::{CaptureBackend, PacketSink};

/// Endpoint id reported by [`ToneCapture::enumerate`].
pub const TONE_ENDPOINT_ID: &str = "synthetic-tone";

/// Generation parameters, fixed when the capture thread starts.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneSettings {
    pub frequency_hz: f64,
    pub amplitude: f32,
    pub sample_rate: u32,
    pub channels: u16,
    pub packet_duration: Duration,
    /// Sleep between packets so output runs at wall-clock rate.
    pub paced: bool,
    /// Stop on its own after this many packets.
    pub packet_limit: Option<usize>,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            frequency_hz: 440.0,
            amplitude: 0.5,
            sample_rate: 48_000,
            channels: 2,
            packet_duration: Duration::from_millis(10),
            paced: true,
            packet_limit: None,
        }
    }
}

/// Sine generator implementing [`CaptureBackend`].
pub struct ToneCapture {
    settings: ToneSettings,
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ToneCapture {
    pub fn new(frequency_hz: f64) -> Self {
        Self::with_settings(ToneSettings {
            frequency_hz,
            ..Default::default()
        })
    }

    pub fn with_settings(settings: ToneSettings) -> Self {
        Self {
            settings,
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &ToneSettings {
        &self.settings
    }

    pub fn endpoint(&self) -> EndpointDescriptor {
        EndpointDescriptor::new(
            TONE_ENDPOINT_ID,
            format!("Test Tone ({:.0} Hz)", self.settings.frequency_hz),
            false,
        )
    }
}

impl CaptureBackend for ToneCapture {
    fn enumerate(&mut self) -> Result<Vec<EndpointDescriptor>, CaptureError> {
        Ok(vec![self.endpoint()])
    }

    fn start(&mut self, endpoint: &EndpointDescriptor, sink: Arc<dyn PacketSink>) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRunning);
        }
        // A previous run may have ended on its own; reap it first.
        self.stop();

        if self.settings.sample_rate == 0 || self.settings.channels == 0 {
            return Err(CaptureError::UnsupportedFormat(format!(
                "{} Hz, {} channels",
                self.settings.sample_rate, self.settings.channels
            )));
        }

        info!("starting tone capture on '{}'", endpoint.name);
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let settings = self.settings.clone();

        let handle = thread::Builder::new()
            .name("tone-capture".into())
            .spawn(move || {
                if let Err(e) = tone_loop(&running, &settings, sink.as_ref()) {
                    error!("tone capture error: {}", e);
                }
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::ThreadSpawn(e.to_string())
            })?;

        *self.capture_handle.lock() = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            let _ = handle.join();
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for ToneCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn tone_loop(running: &AtomicBool, settings: &ToneSettings, sink: &dyn PacketSink) -> Result<(), CaptureError> {
    let format = StreamFormat::new(settings.sample_rate, settings.channels, SampleEncoding::Float32);
    let frames = ((settings.sample_rate as f64 * settings.packet_duration.as_secs_f64()).round() as usize).max(1);
    let channels = settings.channels as usize;
    let step = TAU * settings.frequency_hz / settings.sample_rate as f64;

    sink.on_format(&format);

    let mut phase = 0.0f64;
    let mut bytes = Vec::with_capacity(frames * format.block_align());
    let mut delivered = 0usize;
    let mut next_deadline = Instant::now();

    while running.load(Ordering::SeqCst) {
        if settings.packet_limit.is_some_and(|limit| delivered >= limit) {
            break;
        }

        bytes.clear();
        for _ in 0..frames {
            let value = (settings.amplitude as f64 * phase.sin()) as f32;
            for _ in 0..channels {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
            phase = (phase + step) % TAU;
        }

        let packet = pcm::downmix_packet(&bytes, &format);
        sink.on_packet(&packet.mono, &packet.channel_levels);
        delivered += 1;

        if settings.paced {
            next_deadline += settings.packet_duration;
            let now = Instant::now();
            if next_deadline > now {
                thread::sleep(next_deadline - now);
            } else {
                next_deadline = now;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingSink {
        formats: AtomicUsize,
        packets: AtomicUsize,
        samples: AtomicUsize,
        peak: Mutex<i16>,
    }

    impl PacketSink for CountingSink {
        fn on_format(&self, format: &StreamFormat) {
            assert_eq!(format.encoding, SampleEncoding::Float32);
            self.formats.fetch_add(1, Ordering::SeqCst);
        }

        fn on_packet(&self, mono: &[i16], channel_levels: &[f32]) {
            assert_eq!(channel_levels.len(), 2);
            self.packets.fetch_add(1, Ordering::SeqCst);
            self.samples.fetch_add(mono.len(), Ordering::SeqCst);
            let mut peak = self.peak.lock();
            *peak = mono.iter().map(|s| s.saturating_abs()).fold(*peak, i16::max);
        }
    }

    fn limited(packets: usize) -> ToneCapture {
        ToneCapture::with_settings(ToneSettings {
            paced: false,
            packet_limit: Some(packets),
            ..Default::default()
        })
    }

    #[test]
    fn delivers_format_then_packets() {
        let mut tone = limited(5);
        let sink = Arc::new(CountingSink::default());
        let endpoint = tone.endpoint();

        tone.start(&endpoint, sink.clone()).unwrap();
        // Packet limit ends the thread; stop() joins it.
        tone.stop();

        assert_eq!(sink.formats.load(Ordering::SeqCst), 1);
        assert_eq!(sink.packets.load(Ordering::SeqCst), 5);
        assert_eq!(sink.samples.load(Ordering::SeqCst), 5 * 480);
        // amplitude 0.5 -> about half scale
        let peak = *sink.peak.lock();
        assert!(peak > 15_000 && peak < 17_000, "peak = {peak}");
        assert!(!tone.is_running());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut tone = ToneCapture::new(1000.0);
        tone.stop();
        tone.stop();
        assert!(!tone.is_running());

        let sink = Arc::new(CountingSink::default());
        tone.start(&tone.endpoint(), sink).unwrap();
        assert!(tone.is_running());
        tone.stop();
        tone.stop();
        assert!(!tone.is_running());
    }

    #[test]
    fn second_start_is_rejected_while_running() {
        let mut tone = ToneCapture::new(1000.0);
        let sink = Arc::new(CountingSink::default());
        let endpoint = tone.endpoint();
        tone.start(&endpoint, sink.clone()).unwrap();
        assert_eq!(tone.start(&endpoint, sink), Err(CaptureError::AlreadyRunning));
        tone.stop();
    }

    #[test]
    fn empty_format_is_rejected() {
        let mut tone = ToneCapture::with_settings(ToneSettings {
            channels: 0,
            ..Default::default()
        });
        let sink = Arc::new(CountingSink::default());
        let result = tone.start(&tone.endpoint(), sink.clone());

        assert!(matches!(result, Err(CaptureError::UnsupportedFormat(_))));
        assert!(!tone.is_running());
        assert_eq!(sink.formats.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn enumerate_lists_one_input() {
        let mut tone = ToneCapture::new(440.0);
        let endpoints = tone.enumerate().unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].id, TONE_ENDPOINT_ID);
        assert!(!endpoints[0].is_loopback);
        assert_eq!(endpoints[0].name, "Test Tone (440 Hz)");
    }
}
