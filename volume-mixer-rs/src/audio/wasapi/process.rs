//! Process ID to process name resolution.

use crate::audio::device::AudioError;
use std::path::Path;
use windows::core::PWSTR;
use windows::Win32::Foundation::CloseHandle;
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION,
};

const MAX_IMAGE_PATH: usize = 32_768;

/// Executable file stem for a process, e.g. `Spotify` for `...\Spotify.exe`.
pub fn process_name(pid: u32) -> Result<String, AudioError> {
    let path = unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid)
            .map_err(|_| AudioError::ProcessUnavailable { pid })?;

        let mut buffer = vec![0u16; MAX_IMAGE_PATH];
        let mut size = buffer.len() as u32;
        let result = QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_WIN32,
            PWSTR(buffer.as_mut_ptr()),
            &mut size,
        );
        let _ = CloseHandle(handle);
        result.map_err(|_| AudioError::ProcessUnavailable { pid })?;

        String::from_utf16_lossy(&buffer[..size as usize])
    };

    Path::new(&path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .ok_or(AudioError::ProcessUnavailable { pid })
}
