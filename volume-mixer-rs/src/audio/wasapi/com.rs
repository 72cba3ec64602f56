//! COM apartment and string helpers.

use crate::audio::device::AudioError;
use windows::core::PWSTR;
use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::{
    CoInitializeEx, CoTaskMemFree, CoUninitialize, COINIT_MULTITHREADED,
};

/// COM initialization guard that uninitializes COM on drop.
///
/// Backend calls run on the refresh timer thread as well as on host
/// threads, so a thread that already joined another apartment is accepted
/// as-is and left alone on drop.
pub struct ComGuard {
    initialized: bool,
}

impl ComGuard {
    /// Initialize COM for the current thread.
    pub fn new() -> Result<Self, AudioError> {
        unsafe {
            let hr = CoInitializeEx(None, COINIT_MULTITHREADED);
            if hr == RPC_E_CHANGED_MODE {
                return Ok(Self { initialized: false });
            }
            hr.ok().map_err(AudioError::ComInitFailed)?;
        }
        Ok(Self { initialized: true })
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Null-terminated UTF-16 copy of a string.
pub fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Take ownership of a COM-allocated string, converting and freeing it.
pub unsafe fn take_co_string(value: PWSTR) -> Result<String, AudioError> {
    let converted = value
        .to_string()
        .map_err(|e| AudioError::StringConversion(e.to_string()));
    CoTaskMemFree(Some(value.0 as *const _));
    converted
}
