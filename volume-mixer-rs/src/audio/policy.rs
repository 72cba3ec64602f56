//! Default endpoint switching.
//!
//! The OS policy interface behind this is undocumented, so every call is
//! best effort and failures are reported as `false`.

use super::backend::AudioBackend;
use super::device::{DataFlow, DeviceRole};
use super::enumerator::DeviceEnumerator;
use std::sync::Arc;
use tracing::{info, warn};

/// Pick the device a toggle should switch to.
///
/// Switches to `second` when the current default is `first` or neither
/// configured device, and back to `first` when it is `second`.
pub fn toggle_target<'a>(current: Option<&str>, first: &'a str, second: &'a str) -> &'a str {
    if current == Some(first) || current != Some(second) {
        second
    } else {
        first
    }
}

/// Result of a switch request that checks device availability first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The policy call was made; `applied` is false if the OS rejected it
    Switched { device_id: String, applied: bool },

    /// The target is not in the active device list; nothing was changed
    Unavailable { device_id: String },

    /// No device was configured
    NotConfigured,

    /// The engine was shut down; nothing was changed
    ShutDown,
}

/// Sets the system default render or capture device.
#[derive(Clone)]
pub struct DefaultEndpointSwitcher {
    backend: Arc<dyn AudioBackend>,
    enumerator: DeviceEnumerator,
}

impl DefaultEndpointSwitcher {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            enumerator: DeviceEnumerator::new(backend.clone()),
            backend,
        }
    }

    /// Make a device the default for Multimedia, or for all roles.
    ///
    /// With `all_roles` every role is attempted even after a failure and
    /// nothing is rolled back. Returns true only if every attempt succeeded.
    pub fn set_default(&self, flow: DataFlow, device_id: &str, all_roles: bool) -> bool {
        if device_id.is_empty() {
            return false;
        }

        let roles: &[DeviceRole] = if all_roles {
            &DeviceRole::ALL
        } else {
            &[DeviceRole::Multimedia]
        };

        let mut ok = true;
        for &role in roles {
            if let Err(e) = self.backend.set_default_endpoint(device_id, role) {
                warn!(
                    "Failed to set default {} device for {:?}: {}",
                    flow, role, e
                );
                ok = false;
            }
        }

        if ok {
            info!("Default {} device set to {}", flow, device_id);
        }
        ok
    }

    /// Switch to a fixed device if it is currently active.
    pub fn switch_to(
        &self,
        flow: DataFlow,
        device_id: &str,
        device_name: &str,
        all_roles: bool,
    ) -> SwitchOutcome {
        if device_id.is_empty() {
            return SwitchOutcome::NotConfigured;
        }
        if !self.enumerator.is_active(flow, device_id) {
            warn!("Device '{}' is not available", device_name);
            return SwitchOutcome::Unavailable {
                device_id: device_id.to_string(),
            };
        }

        SwitchOutcome::Switched {
            device_id: device_id.to_string(),
            applied: self.set_default(flow, device_id, all_roles),
        }
    }

    /// Toggle the default between two devices.
    ///
    /// Names are only used for the warning when the target is unavailable.
    pub fn toggle(
        &self,
        flow: DataFlow,
        first: (&str, &str),
        second: (&str, &str),
        all_roles: bool,
    ) -> SwitchOutcome {
        let current = self
            .enumerator
            .get_default(flow, DeviceRole::Multimedia)
            .map(|d| d.id);
        let current = current.as_deref();

        let target = toggle_target(current, first.0, second.0);
        if !target.is_empty() && self.enumerator.is_active(flow, target) {
            return SwitchOutcome::Switched {
                device_id: target.to_string(),
                applied: self.set_default(flow, target, all_roles),
            };
        }

        let name = if target == second.0 { second.1 } else { first.1 };
        warn!("Device '{}' is not available for toggle", name);
        SwitchOutcome::Unavailable {
            device_id: target.to_string(),
        }
    }
}
