//! Windows audio endpoint enumeration via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to list render endpoints (exposed as loopback
//! sources) and capture endpoints with their friendly names, and to resolve
//! an [`EndpointDescriptor`] back to an `IMMDevice`.

use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use audio_reactive_core::models::audio_models::EndpointDescriptor;
use audio_reactive_core::models::error::CaptureError;

/// Display-name suffix for render endpoints captured as loopback.
pub const LOOPBACK_SUFFIX: &str = " (Loopback)";

/// Audio endpoint enumerator using the Windows MMDevice API.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Create a new device enumerator.
    ///
    /// Requires COM to be initialized on the calling thread.
    pub fn new() -> Result<Self, CaptureError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(|e| CaptureError::Unknown(format!("failed to create enumerator: {}", e)))?;
            Ok(Self { enumerator })
        }
    }

    /// Active render endpoints as loopback sources, then active capture
    /// endpoints.
    pub fn list_endpoints(&self) -> Result<Vec<EndpointDescriptor>, CaptureError> {
        let mut endpoints = self.list_devices(eRender)?;
        endpoints.extend(self.list_devices(eCapture)?);
        Ok(endpoints)
    }

    /// Resolve an endpoint to a device. An empty id selects the default
    /// multimedia device of the matching direction.
    pub fn device(&self, endpoint: &EndpointDescriptor) -> Result<IMMDevice, CaptureError> {
        unsafe {
            if endpoint.is_default() {
                let flow = if endpoint.is_loopback { eRender } else { eCapture };
                return self
                    .enumerator
                    .GetDefaultAudioEndpoint(flow, eMultimedia)
                    .map_err(|_| CaptureError::DeviceNotAvailable);
            }

            let wide_id: Vec<u16> = endpoint.id.encode_utf16().chain(std::iter::once(0)).collect();
            self.enumerator
                .GetDevice(PCWSTR(wide_id.as_ptr()))
                .map_err(|_| CaptureError::DeviceNotAvailable)
        }
    }

    fn list_devices(&self, data_flow: EDataFlow) -> Result<Vec<EndpointDescriptor>, CaptureError> {
        let is_loopback = data_flow == eRender;
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(data_flow, DEVICE_STATE_ACTIVE)
                .map_err(|e| CaptureError::Unknown(format!("EnumAudioEndpoints failed: {}", e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| CaptureError::Unknown(format!("GetCount failed: {}", e)))?;

            let mut devices = Vec::with_capacity(count as usize);
            for i in 0..count {
                let Ok(device) = collection.Item(i) else {
                    continue;
                };
                let Some(id) = device_id(&device) else {
                    continue;
                };

                let mut name = friendly_name(&device).unwrap_or_else(|| "(Unknown)".to_string());
                if is_loopback {
                    name.push_str(LOOPBACK_SUFFIX);
                }
                devices.push(EndpointDescriptor::new(id, name, is_loopback));
            }

            Ok(devices)
        }
    }
}

/// Read and free the endpoint id string.
fn device_id(device: &IMMDevice) -> Option<String> {
    unsafe {
        let raw: PWSTR = device.GetId().ok()?;
        let id = raw.to_string().ok();
        CoTaskMemFree(Some(raw.0 as *const _));
        id
    }
}

/// Read the PKEY_Device_FriendlyName property from a device.
fn friendly_name(device: &IMMDevice) -> Option<String> {
    unsafe {
        let store = device.OpenPropertyStore(STGM_READ).ok()?;
        let value = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
        if value.is_empty() {
            return None;
        }
        Some(value.to_string())
    }
}
