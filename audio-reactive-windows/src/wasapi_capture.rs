//! WASAPI capture backend for loopback and input endpoints.
//!
//! Render endpoints are opened with `AUDCLNT_STREAMFLAGS_LOOPBACK` to capture
//! the mix that device is playing; capture endpoints (microphones, line-in)
//! are opened directly. Both run in shared mode on the device mix format.
//!
//! ## Notes
//! - No entitlements or consent prompts for unpackaged desktop apps
//! - DRM-protected audio is silenced in loopback
//! - Packets flagged silent are delivered as zeros

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info};
use parking_lot::Mutex;
use windows::core::PCWSTR;
use windows::Win32::Media::Audio::*;
use windows::Win32::Media::KernelStreaming::{KSDATAFORMAT_SUBTYPE_PCM, WAVE_FORMAT_EXTENSIBLE};
use windows::Win32::Media::Multimedia::{KSDATAFORMAT_SUBTYPE_IEEE_FLOAT, WAVE_FORMAT_IEEE_FLOAT};
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use audio_reactive_core::models::audio_models::{EndpointDescriptor, StreamFormat};
use audio_reactive_core::models::error::CaptureError;
use audio_reactive_core::processing::pcm::{self, DownmixedPacket};
use audio_reactive_core::traits::capture_provider::{CaptureBackend, PacketSink};

use crate::com::ComScope;
use crate::device_enumerator::DeviceEnumerator;

/// Sleep when the endpoint has no packet ready.
const IDLE_POLL: Duration = Duration::from_millis(5);
/// Shared-mode buffer duration: 100ms in 100-nanosecond units.
const BUFFER_DURATION: i64 = 1_000_000;

/// WASAPI implementation of [`CaptureBackend`].
///
/// Each `start` spawns a dedicated capture thread that owns every COM object
/// it creates; the struct itself only holds the stop flag and join handle.
pub struct WasapiCapture {
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl WasapiCapture {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }
}

impl Default for WasapiCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for WasapiCapture {
    fn enumerate(&mut self) -> Result<Vec<EndpointDescriptor>, CaptureError> {
        let _com = ComScope::enter_mta()?;
        let enumerator = DeviceEnumerator::new()?;
        enumerator.list_endpoints()
    }

    fn start(&mut self, endpoint: &EndpointDescriptor, sink: Arc<dyn PacketSink>) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRunning);
        }
        // Reap a thread that ended on its own (device removed, format error).
        self.stop();

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let endpoint = endpoint.clone();

        let handle = thread::Builder::new()
            .name("wasapi-capture".into())
            .spawn(move || {
                if let Err(e) = capture_loop(&running, &endpoint, sink.as_ref()) {
                    error!("capture error on '{}': {}", endpoint.name, e);
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

impl Drop for WasapiCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Classify the device mix format, looking through `WAVEFORMATEXTENSIBLE`.
///
/// # Safety
/// `format` must point to a valid format block returned by `GetMixFormat`.
unsafe fn stream_format(format: *const WAVEFORMATEX) -> StreamFormat {
    let base = std::ptr::read_unaligned(format);
    let tag = base.wFormatTag as u32;
    let bits = base.wBitsPerSample;

    let (is_float, is_pcm, valid_bits) = if tag == WAVE_FORMAT_EXTENSIBLE && base.cbSize >= 22 {
        let ext = std::ptr::read_unaligned(format as *const WAVEFORMATEXTENSIBLE);
        let sub_format = ext.SubFormat;
        let valid = ext.Samples.wValidBitsPerSample;
        (
            sub_format == KSDATAFORMAT_SUBTYPE_IEEE_FLOAT,
            sub_format == KSDATAFORMAT_SUBTYPE_PCM,
            valid,
        )
    } else {
        (tag == WAVE_FORMAT_IEEE_FLOAT, tag == WAVE_FORMAT_PCM, 0)
    };

    StreamFormat::from_platform(base.nSamplesPerSec, base.nChannels, is_float, is_pcm, bits, valid_bits)
}

/// Main capture loop running on a dedicated thread.
///
/// Sequence:
/// 1. Enter the COM MTA
/// 2. Resolve the endpoint (default or by ID)
/// 3. Activate IAudioClient and read the mix format
/// 4. Initialize in shared mode (LOOPBACK for render endpoints)
/// 5. Get IAudioCaptureClient
/// 6. Register with MMCSS
/// 7. Start, drain packets, sleep briefly when none are ready
fn capture_loop(running: &AtomicBool, endpoint: &EndpointDescriptor, sink: &dyn PacketSink) -> Result<(), CaptureError> {
    let _com = ComScope::enter_mta()?;
    let device = DeviceEnumerator::new()?.device(endpoint)?;

    unsafe {
        let audio_client: IAudioClient = device
            .Activate(CLSCTX_ALL, None)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("Activate failed: {}", e)))?;

        let mix_format_ptr = audio_client
            .GetMixFormat()
            .map_err(|e| CaptureError::ConfigurationFailed(format!("GetMixFormat failed: {}", e)))?;
        let format = stream_format(mix_format_ptr);
        let native_block_align = std::ptr::read_unaligned(mix_format_ptr).nBlockAlign as usize;

        let stream_flags = if endpoint.is_loopback {
            AUDCLNT_STREAMFLAGS_LOOPBACK | AUDCLNT_STREAMFLAGS_NOPERSIST
        } else {
            AUDCLNT_STREAMFLAGS_NOPERSIST
        };

        let initialized = audio_client.Initialize(
            AUDCLNT_SHAREMODE_SHARED,
            stream_flags,
            BUFFER_DURATION,
            0,
            mix_format_ptr,
            None,
        );
        CoTaskMemFree(Some(mix_format_ptr as *const _));
        initialized.map_err(|e| CaptureError::ConfigurationFailed(format!("IAudioClient::Initialize failed: {}", e)))?;

        let capture_client: IAudioCaptureClient = audio_client
            .GetService()
            .map_err(|e| CaptureError::ConfigurationFailed(format!("GetService failed: {}", e)))?;

        // MMCSS registration for real-time priority
        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        let mmcss_handle = AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index).ok();

        audio_client
            .Start()
            .map_err(|e| CaptureError::Unknown(format!("IAudioClient::Start failed: {}", e)))?;

        info!(
            "capturing '{}' at {} Hz, {} channels",
            endpoint.name, format.sample_rate, format.channels
        );
        sink.on_format(&format);

        // Never read past the native frame, never decode more than a frame's
        // worth of containers.
        let frame_bytes = format.block_align().min(native_block_align.max(1));
        let result = drain_packets(running, &capture_client, &format, frame_bytes, sink);

        let _ = audio_client.Stop();
        if let Some(handle) = mmcss_handle {
            let _ = AvRevertMmThreadCharacteristics(handle);
        }
        result
    }
}

/// Poll the capture client until `running` clears.
///
/// # Safety
/// Must run on the thread that owns `capture_client`.
unsafe fn drain_packets(
    running: &AtomicBool,
    capture_client: &IAudioCaptureClient,
    format: &StreamFormat,
    frame_bytes: usize,
    sink: &dyn PacketSink,
) -> Result<(), CaptureError> {
    while running.load(Ordering::SeqCst) {
        let mut packet_length = capture_client
            .GetNextPacketSize()
            .map_err(|e| CaptureError::Unknown(format!("GetNextPacketSize failed: {}", e)))?;

        if packet_length == 0 {
            thread::sleep(IDLE_POLL);
            continue;
        }

        while packet_length > 0 {
            let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
            let mut num_frames: u32 = 0;
            let mut flags: u32 = 0;

            capture_client
                .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                .map_err(|e| CaptureError::Unknown(format!("GetBuffer failed: {}", e)))?;

            if num_frames > 0 {
                let frames = num_frames as usize;
                let packet = if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 || buffer_ptr.is_null() {
                    DownmixedPacket::silence(frames, format.channels as usize)
                } else {
                    let bytes = std::slice::from_raw_parts(buffer_ptr as *const u8, frames * frame_bytes);
                    pcm::downmix_packet(bytes, format)
                };
                sink.on_packet(&packet.mono, &packet.channel_levels);
            }

            capture_client
                .ReleaseBuffer(num_frames)
                .map_err(|e| CaptureError::Unknown(format!("ReleaseBuffer failed: {}", e)))?;

            packet_length = capture_client
                .GetNextPacketSize()
                .map_err(|e| CaptureError::Unknown(format!("GetNextPacketSize failed: {}", e)))?;
        }
    }
    Ok(())
}
