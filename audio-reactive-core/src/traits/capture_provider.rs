use std::sync::Arc;

use crate::models::audio_models::{EndpointDescriptor, StreamFormat};
use crate::models::error::CaptureError;

/// Receiver for normalized capture output.
///
/// Both methods are called from the backend's capture thread. Implementations
/// must return quickly; the session's implementation runs the whole analysis
/// pipeline inline and is bounded by one FFT per half window.
pub trait PacketSink: Send + Sync {
    /// The stream was negotiated. Called once per capture run, before the
    /// first packet.
    fn on_format(&self, format: &StreamFormat);

    /// One packet of mono PCM16 plus the RMS of each source channel.
    fn on_packet(&self, mono: &[i16], channel_levels: &[f32]);
}

/// Interface for platform-specific capture backends.
///
/// Implemented by:
/// - `WasapiCapture` (Windows, in `audio-reactive-windows`)
/// - [`ToneCapture`](crate::providers::tone::ToneCapture) (synthetic, any platform)
pub trait CaptureBackend: Send {
    /// List capturable endpoints: render devices (as loopback) first, then
    /// capture devices.
    fn enumerate(&mut self) -> Result<Vec<EndpointDescriptor>, CaptureError>;

    /// Spawn the capture thread for `endpoint`, delivering packets to `sink`.
    ///
    /// Device failures after the thread is running are logged on that thread
    /// and end it; only setup that can fail synchronously (spawning) is
    /// reported here.
    fn start(&mut self, endpoint: &EndpointDescriptor, sink: Arc<dyn PacketSink>) -> Result<(), CaptureError>;

    /// Signal the capture thread and join it. Safe to call repeatedly and
    /// without a prior `start`.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}
