//! Endpoint enumeration.
//!
//! Lists active devices and resolves defaults per role. Failures become
//! empty results; nothing here returns an error to the caller.

use super::backend::AudioBackend;
use super::device::{DataFlow, DeviceRole, Endpoint};
use std::sync::Arc;
use tracing::{debug, warn};

/// Device enumerator over an audio backend.
#[derive(Clone)]
pub struct DeviceEnumerator {
    backend: Arc<dyn AudioBackend>,
}

impl DeviceEnumerator {
    /// Create a new DeviceEnumerator.
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self { backend }
    }

    /// Get all active devices for a direction. Empty on failure.
    pub fn list_active(&self, flow: DataFlow) -> Vec<Endpoint> {
        match self.backend.active_endpoints(flow) {
            Ok(devices) => {
                debug!("Found {} active {} devices", devices.len(), flow);
                devices
            }
            Err(e) => {
                warn!("Failed to enumerate {} devices: {}", flow, e);
                Vec::new()
            }
        }
    }

    /// Get the default device for a direction and role.
    pub fn get_default(&self, flow: DataFlow, role: DeviceRole) -> Option<Endpoint> {
        match self.backend.default_endpoint(flow, role) {
            Ok(device) => Some(device),
            Err(e) => {
                debug!("No default {} device for {:?}: {}", flow, role, e);
                None
            }
        }
    }

    /// Check whether a device ID is currently in the active list.
    pub fn is_active(&self, flow: DataFlow, device_id: &str) -> bool {
        !device_id.is_empty() && self.list_active(flow).iter().any(|d| d.id == device_id)
    }

    /// Names of active devices, joined for display.
    pub fn active_names(&self, flow: DataFlow) -> String {
        self.list_active(flow)
            .into_iter()
            .map(|d| d.name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
