//! # audio-reactive-windows
//!
//! Windows WASAPI backend for audio-reactive-core.
//!
//! Provides:
//! - `WasapiCapture`: loopback capture on render endpoints and direct
//!   capture on input endpoints, as a `CaptureBackend`
//! - `DeviceEnumerator`: endpoint enumeration via the MMDevice API
//!
//! ## Platform Requirements
//! - Windows 10+
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use audio_reactive_core::AudioAnalysisSession;
//! use audio_reactive_windows::WasapiCapture;
//!
//! let session = AudioAnalysisSession::new(WasapiCapture::new());
//! session.enumerate();
//! session.start();
//! let signals = session.signals();
//! ```

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod wasapi_capture;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use wasapi_capture::WasapiCapture;
