use thiserror::Error;

/// Errors that can occur while enumerating or capturing audio.
///
/// None of these are fatal to the analysis pipeline: the session manager logs
/// them, forwards them to listeners and keeps serving the last known signals.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device not available")]
    DeviceNotAvailable,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to spawn capture thread: {0}")]
    ThreadSpawn(String),

    #[error("capture already running")]
    AlreadyRunning,

    #[error("unknown error: {0}")]
    Unknown(String),
}
