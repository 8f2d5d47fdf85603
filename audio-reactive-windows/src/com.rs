//! Per-thread COM apartment handling.

use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

use audio_reactive_core::models::error::CaptureError;

/// RAII guard for `CoInitializeEx(COINIT_MULTITHREADED)` on the current
/// thread. Calls `CoUninitialize` on drop only when initialization succeeded.
pub struct ComScope {
    uninitialize: bool,
}

impl ComScope {
    /// Join the multithreaded apartment. A thread already in an STA keeps its
    /// apartment; COM is still usable there, so that is not an error.
    pub fn enter_mta() -> Result<Self, CaptureError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            return Ok(Self { uninitialize: false });
        }
        hr.ok()
            .map_err(|e| CaptureError::Unknown(format!("CoInitializeEx failed: {}", e)))?;
        Ok(Self { uninitialize: true })
    }
}

impl Drop for ComScope {
    fn drop(&mut self) {
        if self.uninitialize {
            unsafe {
                CoUninitialize();
            }
        }
    }
}
