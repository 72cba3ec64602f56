//! Audio device and session data models.
//!
//! Everything here is a plain value type. Native handles never leave the
//! backend; callers only ever see these snapshots.

use serde::Serialize;
use thiserror::Error;

/// An audio endpoint as seen at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    /// Unique Windows device ID (opaque string from IMMDevice::GetId)
    pub id: String,

    /// Human-readable device name (from device properties)
    pub name: String,

    /// Render (playback) or capture (recording)
    pub flow: DataFlow,

    /// Device state at the time of enumeration
    pub state: DeviceState,
}

impl Endpoint {
    /// Create an active endpoint.
    pub fn new(id: impl Into<String>, name: impl Into<String>, flow: DataFlow) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            flow,
            state: DeviceState::Active,
        }
    }
}

/// Direction of an audio endpoint (maps to Windows EDataFlow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFlow {
    /// Speakers, headphones, virtual outputs
    Render,

    /// Microphones, line-in, virtual inputs
    Capture,
}

impl std::fmt::Display for DataFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataFlow::Render => write!(f, "render"),
            DataFlow::Capture => write!(f, "capture"),
        }
    }
}

/// Audio device role (maps to Windows ERole enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum DeviceRole {
    /// Used by games, system sounds, most general applications
    Console = 0,

    /// Used by music players, video players
    Multimedia = 1,

    /// Used by Teams, Zoom, Discord, and other VoIP applications
    Communications = 2,
}

impl DeviceRole {
    /// Every role, in the order default switches are applied.
    pub const ALL: [DeviceRole; 3] = [
        DeviceRole::Console,
        DeviceRole::Multimedia,
        DeviceRole::Communications,
    ];
}

/// Windows device state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceState {
    /// Device is active and available for use
    Active,

    /// Device is disabled in Windows Sound settings
    Disabled,

    /// Device is not present (driver issue)
    NotPresent,

    /// Device is unplugged (for pluggable devices)
    Unplugged,
}

impl DeviceState {
    /// Convert a raw DEVICE_STATE_* bit value.
    pub fn from_raw(state: u32) -> Self {
        match state {
            1 => DeviceState::Active,
            2 => DeviceState::Disabled,
            8 => DeviceState::Unplugged,
            _ => DeviceState::NotPresent,
        }
    }
}

/// Volume and mute state of one application, read from its first session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Process name without extension, as Task Manager shows it
    pub process_name: String,

    /// Session volume as percentage (0-100)
    pub volume_percent: u8,

    /// Session mute state
    pub muted: bool,
}

impl SessionSnapshot {
    /// Build a snapshot from a raw volume scalar (0.0 to 1.0).
    pub fn from_scalar(process_name: impl Into<String>, volume: f32, muted: bool) -> Self {
        Self {
            process_name: process_name.into(),
            volume_percent: scalar_to_percent(volume),
            muted,
        }
    }
}

/// Volume scalar (0.0 to 1.0) as a rounded percentage.
pub fn scalar_to_percent(volume: f32) -> u8 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Audio backend error types.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("No default device available")]
    NoDefaultDevice,

    #[error("Session is no longer available")]
    SessionUnavailable,

    #[error("Process {pid} could not be resolved")]
    ProcessUnavailable { pid: u32 },

    #[error("Audio backend is not supported on this platform")]
    Unsupported,

    #[cfg(windows)]
    #[error("COM initialization failed: {0}")]
    ComInitFailed(#[source] windows::core::Error),

    #[cfg(windows)]
    #[error("Failed to enumerate devices: {0}")]
    EnumerationFailed(#[source] windows::core::Error),

    #[cfg(windows)]
    #[error("Failed to set default device: {0}")]
    SetDefaultFailed(#[source] windows::core::Error),

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsError(#[source] windows::core::Error),

    #[error("String conversion error: {0}")]
    StringConversion(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_to_percent_rounds() {
        assert_eq!(scalar_to_percent(0.0), 0);
        assert_eq!(scalar_to_percent(0.694), 69);
        assert_eq!(scalar_to_percent(0.696), 70);
        assert_eq!(scalar_to_percent(1.0), 100);
    }

    #[test]
    fn test_scalar_to_percent_clamps_out_of_range() {
        assert_eq!(scalar_to_percent(-0.2), 0);
        assert_eq!(scalar_to_percent(1.3), 100);
    }

    #[test]
    fn test_device_state_from_raw() {
        assert_eq!(DeviceState::from_raw(1), DeviceState::Active);
        assert_eq!(DeviceState::from_raw(2), DeviceState::Disabled);
        assert_eq!(DeviceState::from_raw(4), DeviceState::NotPresent);
        assert_eq!(DeviceState::from_raw(8), DeviceState::Unplugged);
    }

    #[test]
    fn test_role_order() {
        assert_eq!(
            DeviceRole::ALL,
            [
                DeviceRole::Console,
                DeviceRole::Multimedia,
                DeviceRole::Communications
            ]
        );
    }
}
