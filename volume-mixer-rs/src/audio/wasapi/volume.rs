//! Session volume control using ISimpleAudioVolume.

use crate::audio::backend::SessionControl;
use crate::audio::device::AudioError;
use windows::core::Interface;
use windows::Win32::Media::Audio::{IAudioSessionControl, IAudioSessionControl2, ISimpleAudioVolume};

/// Volume controller for one audio session.
pub struct SessionVolume {
    control: IAudioSessionControl2,
    simple_volume: ISimpleAudioVolume,
}

impl SessionVolume {
    /// Wrap a session control from a session enumerator.
    pub fn new(session: &IAudioSessionControl) -> Result<Self, AudioError> {
        let control: IAudioSessionControl2 = session
            .cast()
            .map_err(|_| AudioError::SessionUnavailable)?;
        let simple_volume: ISimpleAudioVolume = session
            .cast()
            .map_err(|_| AudioError::SessionUnavailable)?;

        Ok(Self {
            control,
            simple_volume,
        })
    }
}

impl SessionControl for SessionVolume {
    fn process_id(&self) -> Result<u32, AudioError> {
        unsafe { self.control.GetProcessId().map_err(AudioError::WindowsError) }
    }

    /// Get the current volume level (0.0 to 1.0).
    fn volume(&self) -> Result<f32, AudioError> {
        unsafe {
            self.simple_volume
                .GetMasterVolume()
                .map_err(AudioError::WindowsError)
        }
    }

    /// Set the volume level (0.0 to 1.0).
    fn set_volume(&self, level: f32) -> Result<(), AudioError> {
        let level = level.clamp(0.0, 1.0);
        unsafe {
            self.simple_volume
                .SetMasterVolume(level, std::ptr::null())
                .map_err(AudioError::WindowsError)
        }
    }

    fn is_muted(&self) -> Result<bool, AudioError> {
        unsafe {
            let muted = self
                .simple_volume
                .GetMute()
                .map_err(AudioError::WindowsError)?;
            Ok(muted.as_bool())
        }
    }

    fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
        unsafe {
            self.simple_volume
                .SetMute(muted, std::ptr::null())
                .map_err(AudioError::WindowsError)
        }
    }
}
