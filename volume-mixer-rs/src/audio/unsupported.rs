//! Backend for platforms without Windows Core Audio.
//!
//! Enumeration reports nothing and every mutation fails, so the engine
//! degrades to publishing no variables.

use super::backend::{AudioBackend, SessionVisitor};
use super::device::{AudioError, DataFlow, DeviceRole, Endpoint};

#[derive(Debug, Default)]
pub struct UnsupportedBackend;

impl UnsupportedBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for UnsupportedBackend {
    fn active_endpoints(&self, _flow: DataFlow) -> Result<Vec<Endpoint>, AudioError> {
        Ok(Vec::new())
    }

    fn default_endpoint(&self, _flow: DataFlow, _role: DeviceRole) -> Result<Endpoint, AudioError> {
        Err(AudioError::NoDefaultDevice)
    }

    fn visit_sessions(
        &self,
        endpoint_id: &str,
        _visitor: &mut SessionVisitor<'_>,
    ) -> Result<(), AudioError> {
        Err(AudioError::DeviceNotFound {
            device_id: endpoint_id.to_string(),
        })
    }

    fn process_name(&self, pid: u32) -> Result<String, AudioError> {
        Err(AudioError::ProcessUnavailable { pid })
    }

    fn set_default_endpoint(&self, _endpoint_id: &str, _role: DeviceRole) -> Result<(), AudioError> {
        Err(AudioError::Unsupported)
    }
}
