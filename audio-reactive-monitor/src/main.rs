mod display;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use log::info;
use parking_lot::Mutex;
use thiserror::Error;

use audio_reactive_core::{
    AnalysisSettings, AudioAnalysisSession, CaptureBackend, CaptureError, LevelListener, SignalReader, ToneCapture,
};

use display::Readout;

/// Level ticks between printed status lines (~10 Hz).
const PRINT_EVERY_TICKS: u32 = 3;

#[derive(Debug, Error)]
enum MonitorError {
    #[error("failed to read settings file {path}: {source}")]
    ReadSettings {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    ParseSettings {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("endpoint index {index} out of range ({available} available)")]
    EndpointIndex { index: usize, available: usize },

    #[error("capture failed: {0}")]
    Capture(CaptureError),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Capture audio and print the live analysis signals", long_about = None)]
struct Cli {
    /// JSON file with analysis settings (camelCase keys, missing keys keep defaults).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Level gain, 0.05..=40.
    #[arg(long)]
    gain: Option<f32>,

    /// Level and band smoothing, 0..=0.99.
    #[arg(long)]
    smoothing: Option<f32>,

    /// Band count: 8, 16 or 32.
    #[arg(long)]
    bands: Option<usize>,

    /// FFT size, rounded to a power of two in 512..=8192.
    #[arg(long)]
    fft: Option<usize>,

    /// Endpoint index as printed by --list.
    #[arg(short, long)]
    endpoint: Option<usize>,

    /// Analyse a synthetic sine at this frequency instead of a device.
    #[arg(long)]
    tone: Option<f64>,

    /// Stop after this many seconds. Runs until capture ends when omitted.
    #[arg(short, long)]
    seconds: Option<f64>,

    /// List capture endpoints and exit.
    #[arg(short, long)]
    list: bool,
}

fn main() -> Result<(), MonitorError> {
    init_logging();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    match cli.tone {
        Some(frequency) => run(ToneCapture::new(frequency), &cli, &settings),
        None => run_platform(&cli, &settings),
    }
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[cfg(target_os = "windows")]
fn run_platform(cli: &Cli, settings: &AnalysisSettings) -> Result<(), MonitorError> {
    run(audio_reactive_windows::WasapiCapture::new(), cli, settings)
}

#[cfg(not(target_os = "windows"))]
fn run_platform(cli: &Cli, settings: &AnalysisSettings) -> Result<(), MonitorError> {
    log::warn!("no capture backend for this platform, using a 440 Hz test tone");
    run(ToneCapture::new(440.0), cli, settings)
}

/// Settings file (if any) overlaid with command-line flags.
fn load_settings(cli: &Cli) -> Result<AnalysisSettings, MonitorError> {
    let mut settings = match &cli.settings {
        Some(path) => read_settings_file(path)?,
        None => AnalysisSettings::default(),
    };

    if let Some(gain) = cli.gain {
        settings.gain = gain;
    }
    if let Some(smoothing) = cli.smoothing {
        settings.smoothing = smoothing;
    }
    if let Some(bands) = cli.bands {
        settings.bands_count = bands;
    }
    if let Some(fft) = cli.fft {
        settings.fft_size = fft;
    }
    Ok(settings.sanitized())
}

fn read_settings_file(path: &Path) -> Result<AnalysisSettings, MonitorError> {
    let text = std::fs::read_to_string(path).map_err(|source| MonitorError::ReadSettings {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| MonitorError::ParseSettings {
        path: path.to_path_buf(),
        source,
    })
}

/// Prints a status line every few level ticks and remembers the last error.
struct ConsoleListener {
    signals: SignalReader,
    ticks: AtomicU32,
    bands: Mutex<Vec<f32>>,
    last_error: Mutex<Option<CaptureError>>,
    failed: AtomicBool,
}

impl ConsoleListener {
    fn new(signals: SignalReader) -> Self {
        Self {
            signals,
            ticks: AtomicU32::new(0),
            bands: Mutex::new(Vec::new()),
            last_error: Mutex::new(None),
            failed: AtomicBool::new(false),
        }
    }
}

impl LevelListener for ConsoleListener {
    fn on_level(&self, level: f32) {
        if self.ticks.fetch_add(1, Ordering::Relaxed) % PRINT_EVERY_TICKS != 0 {
            return;
        }
        let readout = Readout {
            level,
            bass: self.signals.bass_level(),
            mid: self.signals.mid_level(),
            treble: self.signals.treble_level(),
            onset: self.signals.onset_level(),
        };
        let mut bands = self.bands.lock();
        self.signals.bands_into(&mut bands);

        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r{}", display::status_line(&readout, &bands));
        let _ = out.flush();
    }

    fn on_error(&self, error: &CaptureError) {
        *self.last_error.lock() = Some(error.clone());
        self.failed.store(true, Ordering::SeqCst);
    }
}

fn run<B: CaptureBackend>(backend: B, cli: &Cli, settings: &AnalysisSettings) -> Result<(), MonitorError> {
    let session = AudioAnalysisSession::with_settings(backend, settings);
    let endpoints = session.enumerate();

    if cli.list {
        for (i, endpoint) in endpoints.iter().enumerate() {
            let kind = if endpoint.is_loopback { "loopback" } else { "input" };
            println!("[{i}] {} ({kind})  {}", endpoint.name, endpoint.id);
        }
        return Ok(());
    }

    if let Some(index) = cli.endpoint {
        if index >= endpoints.len() {
            return Err(MonitorError::EndpointIndex {
                index,
                available: endpoints.len(),
            });
        }
        session.select_endpoint(index);
    }

    let listener = Arc::new(ConsoleListener::new(session.signals()));
    session.add_level_listener(listener.clone());

    info!(
        "analysis: {} bands, FFT {}, gain {:.2}, smoothing {:.2}",
        settings.bands_count, settings.fft_size, settings.gain, settings.smoothing
    );
    session.start();

    let deadline = cli.seconds.map(|s| Instant::now() + Duration::from_secs_f64(s.max(0.0)));
    while session.is_running() && !listener.failed.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        thread::sleep(Duration::from_millis(100));
    }
    session.stop();
    println!();

    if let Some(error) = listener.last_error.lock().take() {
        return Err(MonitorError::Capture(error));
    }
    if let Some(endpoint) = session.endpoints().get(session.selected_index().unwrap_or(0)) {
        info!("stopped monitoring '{}'", endpoint.name);
    }
    Ok(())
}
