//! Scripted in-memory backend used by unit tests.

use super::backend::{AudioBackend, SessionControl, SessionVisitor};
use super::device::{AudioError, DataFlow, DeviceRole, Endpoint};
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct FakeSession {
    pid: u32,
    volume: Mutex<f32>,
    muted: Mutex<bool>,
    broken: bool,
}

impl FakeSession {
    pub fn volume(&self) -> f32 {
        *self.volume.lock().unwrap()
    }

    pub fn muted(&self) -> bool {
        *self.muted.lock().unwrap()
    }
}

impl SessionControl for FakeSession {
    fn process_id(&self) -> Result<u32, AudioError> {
        if self.broken {
            return Err(AudioError::SessionUnavailable);
        }
        Ok(self.pid)
    }

    fn volume(&self) -> Result<f32, AudioError> {
        Ok(*self.volume.lock().unwrap())
    }

    fn set_volume(&self, level: f32) -> Result<(), AudioError> {
        *self.volume.lock().unwrap() = level;
        Ok(())
    }

    fn is_muted(&self) -> Result<bool, AudioError> {
        Ok(*self.muted.lock().unwrap())
    }

    fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
        *self.muted.lock().unwrap() = muted;
        Ok(())
    }
}

#[derive(Default)]
struct State {
    endpoints: Vec<Endpoint>,
    defaults: HashMap<(DataFlow, DeviceRole), String>,
    sessions: HashMap<String, Vec<Arc<FakeSession>>>,
    processes: HashMap<u32, String>,
    failing_roles: HashSet<DeviceRole>,
    fail_enumeration: bool,
    set_default_calls: Vec<(String, DeviceRole)>,
}

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    enumerations: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an active endpoint; the first per direction becomes every role's default.
    pub fn with_endpoint(self, id: &str, name: &str, flow: DataFlow) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.endpoints.push(Endpoint::new(id, name, flow));
            for role in DeviceRole::ALL {
                state.defaults.entry((flow, role)).or_insert_with(|| id.to_string());
            }
        }
        self
    }

    /// Add a session owned by `pid` on `endpoint_id`, registering its process name.
    pub fn with_session(
        self,
        endpoint_id: &str,
        pid: u32,
        process: &str,
        volume: f32,
        muted: bool,
    ) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state
                .sessions
                .entry(endpoint_id.to_string())
                .or_default()
                .push(Arc::new(FakeSession {
                    pid,
                    volume: Mutex::new(volume),
                    muted: Mutex::new(muted),
                    broken: false,
                }));
            if pid != 0 && !process.is_empty() {
                state.processes.insert(pid, process.to_string());
            }
        }
        self
    }

    /// Add a session whose process ID cannot be read.
    pub fn with_broken_session(self, endpoint_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .sessions
            .entry(endpoint_id.to_string())
            .or_default()
            .push(Arc::new(FakeSession {
                pid: 0,
                volume: Mutex::new(0.0),
                muted: Mutex::new(false),
                broken: true,
            }));
        self
    }

    pub fn with_default(self, flow: DataFlow, role: DeviceRole, id: &str) -> Self {
        self.set_default(flow, role, id);
        self
    }

    pub fn with_failing_role(self, role: DeviceRole) -> Self {
        self.state.lock().unwrap().failing_roles.insert(role);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn set_default(&self, flow: DataFlow, role: DeviceRole, id: &str) {
        self.state
            .lock()
            .unwrap()
            .defaults
            .insert((flow, role), id.to_string());
    }

    pub fn clear_default(&self, flow: DataFlow, role: DeviceRole) {
        self.state.lock().unwrap().defaults.remove(&(flow, role));
    }

    pub fn set_fail_enumeration(&self, fail: bool) {
        self.state.lock().unwrap().fail_enumeration = fail;
    }

    pub fn default_id(&self, flow: DataFlow, role: DeviceRole) -> Option<String> {
        self.state.lock().unwrap().defaults.get(&(flow, role)).cloned()
    }

    pub fn session(&self, endpoint_id: &str, pid: u32) -> Arc<FakeSession> {
        self.state.lock().unwrap().sessions[endpoint_id]
            .iter()
            .find(|s| s.pid == pid)
            .cloned()
            .expect("session not scripted")
    }

    pub fn set_default_calls(&self) -> Vec<(String, DeviceRole)> {
        self.state.lock().unwrap().set_default_calls.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        InFlight(&self.in_flight)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AudioBackend for FakeBackend {
    fn active_endpoints(&self, flow: DataFlow) -> Result<Vec<Endpoint>, AudioError> {
        let _guard = self.enter();
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.fail_enumeration {
            return Err(AudioError::Unsupported);
        }
        Ok(state
            .endpoints
            .iter()
            .filter(|e| e.flow == flow)
            .cloned()
            .collect())
    }

    fn default_endpoint(&self, flow: DataFlow, role: DeviceRole) -> Result<Endpoint, AudioError> {
        let _guard = self.enter();
        let state = self.state.lock().unwrap();
        let id = state
            .defaults
            .get(&(flow, role))
            .ok_or(AudioError::NoDefaultDevice)?;
        state
            .endpoints
            .iter()
            .find(|e| &e.id == id)
            .cloned()
            .ok_or_else(|| AudioError::DeviceNotFound {
                device_id: id.clone(),
            })
    }

    fn visit_sessions(
        &self,
        endpoint_id: &str,
        visitor: &mut SessionVisitor<'_>,
    ) -> Result<(), AudioError> {
        let sessions = {
            let state = self.state.lock().unwrap();
            if state.fail_enumeration {
                return Err(AudioError::Unsupported);
            }
            state.sessions.get(endpoint_id).cloned().unwrap_or_default()
        };
        for session in sessions {
            if let ControlFlow::Break(()) = visitor(session.as_ref()) {
                break;
            }
        }
        Ok(())
    }

    fn process_name(&self, pid: u32) -> Result<String, AudioError> {
        self.state
            .lock()
            .unwrap()
            .processes
            .get(&pid)
            .cloned()
            .ok_or(AudioError::ProcessUnavailable { pid })
    }

    fn set_default_endpoint(&self, endpoint_id: &str, role: DeviceRole) -> Result<(), AudioError> {
        let mut state = self.state.lock().unwrap();
        state
            .set_default_calls
            .push((endpoint_id.to_string(), role));
        if state.failing_roles.contains(&role) {
            return Err(AudioError::Unsupported);
        }
        let flow = state
            .endpoints
            .iter()
            .find(|e| e.id == endpoint_id)
            .map(|e| e.flow)
            .ok_or_else(|| AudioError::DeviceNotFound {
                device_id: endpoint_id.to_string(),
            })?;
        state.defaults.insert((flow, role), endpoint_id.to_string());
        Ok(())
    }
}
