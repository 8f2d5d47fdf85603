use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::models::audio_models::EndpointDescriptor;
use crate::models::config::{self, AnalysisSettings};
use crate::models::error::CaptureError;
use crate::traits::capture_delegate::LevelListener;
use crate::traits::capture_provider::{CaptureBackend, PacketSink};

use super::reader::SignalReader;
use super::shared::SharedSignals;

/// Interval between level notifications (~30 Hz).
pub const LEVEL_TICK: Duration = Duration::from_millis(33);

type Listeners = Arc<RwLock<Vec<Arc<dyn LevelListener>>>>;

/// Device and thread control, guarded by the session control lock.
struct Control<B> {
    backend: B,
    endpoints: Vec<EndpointDescriptor>,
    selected_index: Option<usize>,
    active: Option<EndpointDescriptor>,
    ticker_running: Arc<AtomicBool>,
    ticker_handle: Option<thread::JoinHandle<()>>,
}

/// Owner of one capture backend and the analysis state it feeds.
///
/// The session is explicitly constructed by the host and can be shared across
/// threads. Data flow:
/// ```text
/// [CaptureBackend thread] → PacketSink → level / auto-level ─┐
///                                      → SpectrumAnalyzer ───┴→ SignalReader (any thread)
///                                                               level-ticker → LevelListener
/// ```
///
/// Capture failures never surface as errors from `start`; they are logged,
/// forwarded to [`LevelListener::on_error`], and leave the signals at zero.
pub struct AudioAnalysisSession<B: CaptureBackend> {
    shared: Arc<SharedSignals>,
    listeners: Listeners,
    control: Mutex<Control<B>>,
}

impl<B: CaptureBackend> AudioAnalysisSession<B> {
    pub fn new(backend: B) -> Self {
        Self::with_settings(backend, &AnalysisSettings::default())
    }

    pub fn with_settings(backend: B, settings: &AnalysisSettings) -> Self {
        Self {
            shared: Arc::new(SharedSignals::new(settings)),
            listeners: Arc::new(RwLock::new(Vec::new())),
            control: Mutex::new(Control {
                backend,
                endpoints: Vec::new(),
                selected_index: None,
                active: None,
                ticker_running: Arc::new(AtomicBool::new(false)),
                ticker_handle: None,
            }),
        }
    }

    /// A read-only handle onto the live signals.
    pub fn signals(&self) -> SignalReader {
        SignalReader::new(Arc::clone(&self.shared))
    }

    pub fn add_level_listener(&self, listener: Arc<dyn LevelListener>) {
        self.listeners.write().push(listener);
    }

    // --- Endpoints ---

    /// Re-enumerate endpoints, replacing the cached list. A failure is
    /// reported to listeners and leaves the list empty.
    pub fn enumerate(&self) -> Vec<EndpointDescriptor> {
        let mut control = self.control.lock();
        let result = control.backend.enumerate();
        let endpoints = match result {
            Ok(endpoints) => endpoints,
            Err(e) => {
                warn!("endpoint enumeration failed: {}", e);
                drop(control);
                self.notify_error(&e);
                control = self.control.lock();
                Vec::new()
            }
        };

        if control.selected_index.is_some_and(|i| i >= endpoints.len()) {
            control.selected_index = None;
        }
        info!("enumerated {} audio endpoints", endpoints.len());
        control.endpoints = endpoints.clone();
        endpoints
    }

    /// The list from the last [`enumerate`](Self::enumerate).
    pub fn endpoints(&self) -> Vec<EndpointDescriptor> {
        self.control.lock().endpoints.clone()
    }

    /// The first listed endpoint (the first loopback source when the platform
    /// has one), or `None` when nothing was enumerated.
    pub fn default_endpoint_index(&self) -> Option<usize> {
        if self.control.lock().endpoints.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.control.lock().selected_index
    }

    /// The endpoint the running capture was started on.
    pub fn active_endpoint(&self) -> Option<EndpointDescriptor> {
        self.control.lock().active.clone()
    }

    /// Select an enumerated endpoint. Restarts capture on it when running.
    /// Out-of-range indices are ignored.
    pub fn select_endpoint(&self, index: usize) {
        let mut control = self.control.lock();
        let Some(endpoint) = control.endpoints.get(index).cloned() else {
            warn!("ignoring endpoint index {} ({} enumerated)", index, control.endpoints.len());
            return;
        };

        info!("selected endpoint '{}'", endpoint.name);
        control.selected_index = Some(index);
        if control.active.is_some() {
            let ticker = self.stop_locked(&mut control);
            let result = self.start_locked(&mut control, endpoint);
            drop(control);
            join_ticker(ticker);
            if let Err(e) = result {
                self.notify_error(&e);
            }
        }
    }

    // --- Capture ---

    /// Start capturing from the selected endpoint (or the default one),
    /// enumerating first if needed. Does nothing while a capture is live; a
    /// run whose capture thread died is torn down and restarted.
    pub fn start(&self) {
        let needs_enumeration = self.control.lock().endpoints.is_empty();
        if needs_enumeration {
            self.enumerate();
        }

        let mut control = self.control.lock();
        if is_live(&control) {
            return;
        }
        let stale = self.reap_dead_run(&mut control);
        let index = control.selected_index.unwrap_or(0);
        let Some(endpoint) = control.endpoints.get(index).cloned() else {
            drop(control);
            join_ticker(stale);
            warn!("no capture endpoint available");
            self.notify_error(&CaptureError::DeviceNotAvailable);
            return;
        };
        control.selected_index = Some(index);

        let result = self.start_locked(&mut control, endpoint);
        drop(control);
        join_ticker(stale);
        if let Err(e) = result {
            self.notify_error(&e);
        }
    }

    /// Start capturing from an explicit endpoint, bypassing the cached list.
    /// Does nothing when already running.
    pub fn start_endpoint(&self, endpoint: &EndpointDescriptor) {
        let mut control = self.control.lock();
        if is_live(&control) {
            return;
        }
        let stale = self.reap_dead_run(&mut control);
        let result = self.start_locked(&mut control, endpoint.clone());
        drop(control);
        join_ticker(stale);
        if let Err(e) = result {
            self.notify_error(&e);
        }
    }

    /// Stop capture, join the capture and ticker threads and zero the
    /// signals. Safe to call at any time, any number of times.
    pub fn stop(&self) {
        let ticker = {
            let mut control = self.control.lock();
            self.stop_locked(&mut control)
        };
        join_ticker(ticker);
    }

    /// Whether the backend's capture thread is alive.
    pub fn is_running(&self) -> bool {
        self.control.lock().backend.is_running()
    }

    /// Tears down a run whose capture thread ended on its own. Returns its
    /// ticker for joining once the control lock is released.
    fn reap_dead_run(&self, control: &mut Control<B>) -> Option<thread::JoinHandle<()>> {
        if control.active.is_none() {
            return None;
        }
        debug!("capture thread ended on its own, restarting");
        self.stop_locked(control)
    }

    fn start_locked(&self, control: &mut Control<B>, endpoint: EndpointDescriptor) -> Result<(), CaptureError> {
        info!(
            "starting capture on '{}' ({})",
            endpoint.name,
            if endpoint.is_loopback { "loopback" } else { "input" }
        );
        self.shared.reset_auto_level();

        let sink: Arc<dyn PacketSink> = self.shared.clone();
        control.backend.start(&endpoint, sink).map_err(|e| {
            error!("failed to start capture on '{}': {}", endpoint.name, e);
            e
        })?;
        control.active = Some(endpoint);

        // Fresh flag per run so a ticker still being joined from a previous
        // run cannot observe this one.
        let running = Arc::new(AtomicBool::new(true));
        control.ticker_running = Arc::clone(&running);
        let shared = Arc::clone(&self.shared);
        let listeners = Arc::clone(&self.listeners);

        let handle = thread::Builder::new()
            .name("level-ticker".into())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    thread::sleep(LEVEL_TICK);
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    let level = shared.level();
                    let current: Vec<Arc<dyn LevelListener>> = listeners.read().clone();
                    for listener in &current {
                        listener.on_level(level);
                    }
                }
            });

        match handle {
            Ok(handle) => control.ticker_handle = Some(handle),
            Err(e) => {
                // Capture keeps running; only the push notifications are lost.
                control.ticker_running.store(false, Ordering::SeqCst);
                error!("failed to spawn level ticker: {}", e);
                return Err(CaptureError::ThreadSpawn(e.to_string()));
            }
        }
        Ok(())
    }

    /// Stops the backend and signals the ticker. The returned ticker handle
    /// must be joined after the control lock is released, since a listener
    /// may call back into the session.
    fn stop_locked(&self, control: &mut Control<B>) -> Option<thread::JoinHandle<()>> {
        control.backend.stop();
        control.ticker_running.store(false, Ordering::SeqCst);

        if let Some(endpoint) = control.active.take() {
            info!("stopped capture on '{}'", endpoint.name);
        }
        self.shared.clear();
        self.shared.reset_auto_level();
        control.ticker_handle.take()
    }

    fn notify_error(&self, error: &CaptureError) {
        let current: Vec<Arc<dyn LevelListener>> = self.listeners.read().clone();
        for listener in &current {
            listener.on_error(error);
        }
    }

    // --- Tuning ---

    /// Linear gain on the RMS level, clamped to 0.05..=40.
    pub fn set_gain(&self, gain: f32) {
        self.shared.set_gain(gain);
    }

    /// EMA coefficient for level and bands, clamped to 0..=0.99.
    pub fn set_smoothing(&self, smoothing: f32) {
        self.shared.set_smoothing(smoothing);
    }

    /// Snap to 8, 16 or 32 bands. Changing the count discards analysis state.
    pub fn set_bands_count(&self, bands: usize) {
        let count = config::coerce_bands_count(bands);
        self.shared.spectrum.lock().set_bands_count(count);
    }

    pub fn set_crossovers(&self, bass_upper_hz: f32, mid_upper_hz: f32) {
        let (bass, mid) = config::clamp_crossovers(bass_upper_hz, mid_upper_hz);
        self.shared.spectrum.lock().set_crossovers(bass, mid);
    }

    /// Coerce to the closest power of two in 512..=8192. Changing the size
    /// discards analysis state.
    pub fn set_fft_size(&self, size: usize) {
        let size = config::coerce_fft_size(size);
        self.shared.spectrum.lock().set_fft_size(size);
    }

    /// Toggling resets the auto-level tracker.
    pub fn set_auto_level_enabled(&self, enabled: bool) {
        self.shared.set_auto_level_enabled(enabled);
    }

    pub fn reset_auto_level(&self) {
        self.shared.reset_auto_level();
    }

    /// Override the analysis sample rate for hosts feeding PCM directly.
    /// Zero is ignored. A backend's negotiated format replaces it.
    pub fn set_sample_rate(&self, sample_rate: u32) {
        if sample_rate == 0 {
            debug!("ignoring zero sample rate");
            return;
        }
        self.shared.spectrum.lock().set_sample_rate(sample_rate);
    }

    pub fn set_visualizer_range(&self, min_hz: f32, max_hz: f32) {
        let (min, max) = config::clamp_visualizer_range(min_hz, max_hz);
        self.shared.spectrum.lock().set_visualizer_range(min, max);
    }

    /// Apply every field of `settings`, clamped the same way as the setters.
    pub fn apply_settings(&self, settings: &AnalysisSettings) {
        let settings = settings.sanitized();
        self.set_gain(settings.gain);
        self.set_smoothing(settings.smoothing);
        self.set_auto_level_enabled(settings.auto_level_enabled);

        let mut spectrum = self.shared.spectrum.lock();
        spectrum.set_bands_count(settings.bands_count);
        spectrum.set_fft_size(settings.fft_size);
        spectrum.set_crossovers(settings.bass_upper_hz, settings.mid_upper_hz);
        spectrum.set_visualizer_range(settings.visualizer_min_hz, settings.visualizer_max_hz);
    }

    /// Current values of every tunable.
    pub fn settings(&self) -> AnalysisSettings {
        self.shared.settings()
    }

    // --- Ingestion ---

    /// Push mono PCM16 through the level and spectrum pipeline on the
    /// calling thread, exactly as a backend packet would be.
    pub fn feed_pcm16(&self, samples: &[i16]) {
        self.shared.process_pcm16(samples);
    }
}

impl<B: CaptureBackend> Drop for AudioAnalysisSession<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_live<B: CaptureBackend>(control: &Control<B>) -> bool {
    control.active.is_some() && control.backend.is_running()
}

/// Join a stopped ticker. A listener that stops or restarts capture runs on
/// the ticker itself; that thread has already seen its flag cleared and exits
/// after the current tick, so it is not joined.
fn join_ticker(handle: Option<thread::JoinHandle<()>>) {
    let Some(handle) = handle else {
        return;
    };
    if handle.thread().id() == thread::current().id() {
        return;
    }
    let _ = handle.join();
}
