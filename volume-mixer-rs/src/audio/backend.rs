//! Platform seam between the engine and the OS audio subsystem.
//!
//! A backend acquires native objects, hands out borrowed views for the
//! duration of a single call and releases everything before returning.

use super::device::{AudioError, DataFlow, DeviceRole, Endpoint};
use std::ops::ControlFlow;

/// Borrowed view of one audio session, valid only inside a visitor call.
pub trait SessionControl {
    /// Process ID that owns the session (0 for the system sounds session).
    fn process_id(&self) -> Result<u32, AudioError>;

    /// Current session volume (0.0 to 1.0).
    fn volume(&self) -> Result<f32, AudioError>;

    /// Set the session volume (0.0 to 1.0).
    fn set_volume(&self, level: f32) -> Result<(), AudioError>;

    /// Current session mute state.
    fn is_muted(&self) -> Result<bool, AudioError>;

    /// Set the session mute state.
    fn set_mute(&self, muted: bool) -> Result<(), AudioError>;
}

/// Visitor over the sessions of one endpoint.
pub type SessionVisitor<'a> = dyn FnMut(&dyn SessionControl) -> ControlFlow<()> + 'a;

/// Operations the engine needs from the OS audio subsystem.
pub trait AudioBackend: Send + Sync {
    /// All endpoints in the active state for the given direction.
    fn active_endpoints(&self, flow: DataFlow) -> Result<Vec<Endpoint>, AudioError>;

    /// The OS default endpoint for a direction and role.
    fn default_endpoint(&self, flow: DataFlow, role: DeviceRole) -> Result<Endpoint, AudioError>;

    /// Visit every session on an endpoint until the visitor breaks.
    ///
    /// Sessions that cannot be opened are skipped by the backend.
    fn visit_sessions(
        &self,
        endpoint_id: &str,
        visitor: &mut SessionVisitor<'_>,
    ) -> Result<(), AudioError>;

    /// Process name (file stem of the executable) for a process ID.
    fn process_name(&self, pid: u32) -> Result<String, AudioError>;

    /// Make an endpoint the default for one role.
    fn set_default_endpoint(&self, endpoint_id: &str, role: DeviceRole) -> Result<(), AudioError>;
}
