//! Windows Core Audio backend.
//!
//! No COM object outlives a call: each operation initializes COM, creates
//! its own MMDeviceEnumerator and releases everything before returning.
//! This keeps the backend usable from any thread.

mod com;
mod policy_config;
mod process;
mod volume;

pub use com::ComGuard;
pub use policy_config::PolicyConfig;

use super::backend::{AudioBackend, SessionControl, SessionVisitor};
use super::device::{AudioError, DataFlow, DeviceRole, DeviceState, Endpoint};
use com::{take_co_string, to_wide};
use std::ops::ControlFlow;
use tracing::debug;
use volume::SessionVolume;
use windows::core::PCWSTR;
use windows::Win32::Devices::Properties::DEVPKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::{
    eCapture, eCommunications, eConsole, eMultimedia, eRender, EDataFlow, ERole,
    IAudioSessionManager2, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator,
    DEVICE_STATE_ACTIVE,
};
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_ALL, STGM};
use windows::Win32::UI::Shell::PropertiesSystem::{IPropertyStore, PROPERTYKEY};

/// Audio backend over the MMDevice and audio session APIs.
#[derive(Debug, Default)]
pub struct WasapiBackend;

impl WasapiBackend {
    pub fn new() -> Self {
        Self
    }

    fn enumerator() -> Result<IMMDeviceEnumerator, AudioError> {
        unsafe {
            CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(AudioError::EnumerationFailed)
        }
    }

    fn device(enumerator: &IMMDeviceEnumerator, device_id: &str) -> Result<IMMDevice, AudioError> {
        let device_id_wide = to_wide(device_id);
        unsafe {
            enumerator
                .GetDevice(PCWSTR::from_raw(device_id_wide.as_ptr()))
                .map_err(|_| AudioError::DeviceNotFound {
                    device_id: device_id.to_string(),
                })
        }
    }

    /// Convert an IMMDevice to an Endpoint.
    fn to_endpoint(device: &IMMDevice, flow: DataFlow) -> Result<Endpoint, AudioError> {
        unsafe {
            let id = take_co_string(device.GetId().map_err(AudioError::EnumerationFailed)?)?;

            let props: IPropertyStore = device
                .OpenPropertyStore(STGM(0))
                .map_err(AudioError::EnumerationFailed)?;
            let name = Self::device_name(&props).unwrap_or_else(|| "Unknown".to_string());

            let state = device
                .GetState()
                .map(|s| DeviceState::from_raw(s.0))
                .unwrap_or(DeviceState::NotPresent);

            Ok(Endpoint {
                id,
                name,
                flow,
                state,
            })
        }
    }

    /// Get the friendly name of a device from its property store.
    fn device_name(props: &IPropertyStore) -> Option<String> {
        unsafe {
            // Convert DEVPROPKEY to PROPERTYKEY
            let key = PROPERTYKEY {
                fmtid: DEVPKEY_Device_FriendlyName.fmtid,
                pid: DEVPKEY_Device_FriendlyName.pid,
            };

            let prop = props.GetValue(&key).ok()?;
            let s = prop.to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        }
    }
}

fn data_flow(flow: DataFlow) -> EDataFlow {
    match flow {
        DataFlow::Render => eRender,
        DataFlow::Capture => eCapture,
    }
}

fn role(role: DeviceRole) -> ERole {
    match role {
        DeviceRole::Console => eConsole,
        DeviceRole::Multimedia => eMultimedia,
        DeviceRole::Communications => eCommunications,
    }
}

impl AudioBackend for WasapiBackend {
    fn active_endpoints(&self, flow: DataFlow) -> Result<Vec<Endpoint>, AudioError> {
        let _com = ComGuard::new()?;
        let enumerator = Self::enumerator()?;

        unsafe {
            let collection = enumerator
                .EnumAudioEndpoints(data_flow(flow), DEVICE_STATE_ACTIVE)
                .map_err(AudioError::EnumerationFailed)?;
            let count = collection
                .GetCount()
                .map_err(AudioError::EnumerationFailed)?;

            let mut devices = Vec::with_capacity(count as usize);
            for i in 0..count {
                let endpoint = collection
                    .Item(i)
                    .map_err(AudioError::EnumerationFailed)
                    .and_then(|device| Self::to_endpoint(&device, flow));
                match endpoint {
                    Ok(endpoint) => devices.push(endpoint),
                    Err(e) => debug!("Skipping {} device {}: {}", flow, i, e),
                }
            }

            Ok(devices)
        }
    }

    fn default_endpoint(&self, flow: DataFlow, device_role: DeviceRole) -> Result<Endpoint, AudioError> {
        let _com = ComGuard::new()?;
        let enumerator = Self::enumerator()?;

        let device = unsafe {
            enumerator
                .GetDefaultAudioEndpoint(data_flow(flow), role(device_role))
                .map_err(|_| AudioError::NoDefaultDevice)?
        };
        Self::to_endpoint(&device, flow)
    }

    fn visit_sessions(
        &self,
        endpoint_id: &str,
        visitor: &mut SessionVisitor<'_>,
    ) -> Result<(), AudioError> {
        let _com = ComGuard::new()?;
        let enumerator = Self::enumerator()?;
        let device = Self::device(&enumerator, endpoint_id)?;

        unsafe {
            let manager: IAudioSessionManager2 = device
                .Activate(CLSCTX_ALL, None)
                .map_err(AudioError::WindowsError)?;
            let sessions = manager
                .GetSessionEnumerator()
                .map_err(AudioError::WindowsError)?;
            let count = sessions.GetCount().map_err(AudioError::WindowsError)?;

            for i in 0..count {
                let session = match sessions
                    .GetSession(i)
                    .map_err(AudioError::WindowsError)
                    .and_then(|control| SessionVolume::new(&control))
                {
                    Ok(session) => session,
                    Err(e) => {
                        debug!("Error reading session {}: {}", i, e);
                        continue;
                    }
                };

                if let ControlFlow::Break(()) = visitor(&session as &dyn SessionControl) {
                    break;
                }
            }
        }

        Ok(())
    }

    fn process_name(&self, pid: u32) -> Result<String, AudioError> {
        process::process_name(pid)
    }

    fn set_default_endpoint(&self, endpoint_id: &str, device_role: DeviceRole) -> Result<(), AudioError> {
        let _com = ComGuard::new()?;
        let policy = PolicyConfig::new()?;
        policy.set_default_device(endpoint_id, device_role)
    }
}
