//! # audio-reactive-core
//!
//! Platform-agnostic audio analysis core.
//!
//! Turns a live mono PCM stream into the signals audio-reactive effects sample
//! every frame: a smoothed 0..1 level, an N-band log-frequency spectrum,
//! bass/mid/treble aggregates, a spectral-onset strength and a 256-bin
//! visualizer spectrum. Platform backends (Windows WASAPI) implement the
//! `CaptureBackend` trait and plug into the generic `AudioAnalysisSession`.
//!
//! ## Architecture
//!
//! ```text
//! audio-reactive-core (this crate)
//! ├── traits/      ← CaptureBackend, PacketSink, LevelListener
//! ├── models/      ← CaptureError, EndpointDescriptor, StreamFormat, AnalysisSettings, etc.
//! ├── processing/  ← packet downmix, auto-level, rolling sample buffer
//! ├── analysis/    ← FFT, log bands, onset, visualizer, SpectrumAnalyzer
//! ├── session/     ← AudioAnalysisSession (generic orchestrator), SignalReader
//! └── providers/   ← ToneCapture (synthetic backend)
//! ```

pub mod analysis;
pub mod models;
pub mod processing;
pub mod providers;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use analysis::spectrum::SpectrumAnalyzer;
pub use analysis::visualizer::VISUALIZER_BINS;
pub use models::audio_models::{ChannelDiagnostics, EndpointDescriptor, SampleEncoding, SpectrumSnapshot, StreamFormat};
pub use models::config::AnalysisSettings;
pub use models::error::CaptureError;
pub use processing::auto_level::AutoLevel;
pub use providers::tone::{ToneCapture, ToneSettings};
pub use session::manager::AudioAnalysisSession;
pub use session::reader::SignalReader;
pub use traits::capture_delegate::LevelListener;
pub use traits::capture_provider::{CaptureBackend, PacketSink};
