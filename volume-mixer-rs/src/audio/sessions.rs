//! Per-application audio sessions.
//!
//! The resolver walks every session on every active playback device and
//! maps it to the owning process name. The mutator finds one session on
//! the current default playback device and changes it in place.

use super::backend::{AudioBackend, SessionControl};
use super::device::{AudioError, DataFlow, DeviceRole, SessionSnapshot};
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Case-insensitive process name comparison.
pub fn names_match(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Maps audio sessions to process names.
#[derive(Clone)]
pub struct SessionResolver {
    backend: Arc<dyn AudioBackend>,
}

impl SessionResolver {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self { backend }
    }

    /// Names of all processes with a session on any active playback device.
    ///
    /// Deduplicated case-insensitively (first spelling wins) and sorted.
    pub fn list_active_app_names(&self) -> Vec<String> {
        let mut names: HashMap<String, String> = HashMap::new();

        self.for_each_named_session(|name, _| {
            debug!("Found app: {}", name);
            names.entry(name.to_lowercase()).or_insert(name);
        });

        let mut names: Vec<(String, String)> = names.into_iter().collect();
        names.sort();
        debug!("Total apps found: {}", names.len());
        names.into_iter().map(|(_, name)| name).collect()
    }

    /// Volume and mute state of every process with a session.
    ///
    /// The first readable session per process name wins.
    pub fn snapshot_sessions(&self) -> Vec<SessionSnapshot> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut result = Vec::new();

        self.for_each_named_session(|name, session| {
            let key = name.to_lowercase();
            if seen.contains(&key) {
                return;
            }
            match read_levels(session) {
                Ok((volume, muted)) => {
                    seen.insert(key);
                    result.push(SessionSnapshot::from_scalar(name, volume, muted));
                }
                Err(e) => debug!("Could not read levels for {}: {}", name, e),
            }
        });

        result
    }

    /// Process name owning a session, or None for system/exited/inaccessible ones.
    pub(crate) fn session_process_name(&self, session: &dyn SessionControl) -> Option<String> {
        let pid = match session.process_id() {
            Ok(0) => return None,
            Ok(pid) => pid,
            Err(e) => {
                debug!("Error reading session: {}", e);
                return None;
            }
        };

        match self.backend.process_name(pid) {
            Ok(name) if !name.trim().is_empty() => Some(name),
            Ok(_) => None,
            Err(e) => {
                debug!("Could not get process for PID {}: {}", pid, e);
                None
            }
        }
    }

    fn for_each_named_session(&self, mut f: impl FnMut(String, &dyn SessionControl)) {
        let devices = match self.backend.active_endpoints(DataFlow::Render) {
            Ok(devices) => devices,
            Err(e) => {
                error!("Error enumerating devices: {}", e);
                return;
            }
        };
        debug!("Found {} active audio devices", devices.len());

        for device in &devices {
            debug!("Scanning device: {}", device.name);
            let result = self
                .backend
                .visit_sessions(&device.id, &mut |session: &dyn SessionControl| {
                    if let Some(name) = self.session_process_name(session) {
                        f(name, session);
                    }
                    ControlFlow::Continue(())
                });

            if let Err(e) = result {
                warn!("Error scanning device {}: {}", device.name, e);
            }
        }
    }
}

fn read_levels(session: &dyn SessionControl) -> Result<(f32, bool), AudioError> {
    Ok((session.volume()?, session.is_muted()?))
}

/// Applies volume and mute changes to the session of a named process.
#[derive(Clone)]
pub struct SessionMutator {
    backend: Arc<dyn AudioBackend>,
    resolver: SessionResolver,
}

impl SessionMutator {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            resolver: SessionResolver::new(backend.clone()),
            backend,
        }
    }

    /// Set an application's volume (0 to 100). Returns false if no session matched.
    pub fn set_volume(&self, process_name: &str, percent: f32) -> bool {
        if !percent.is_finite() {
            return false;
        }
        let level = (percent / 100.0).clamp(0.0, 1.0);
        self.mutate(process_name, |session| session.set_volume(level))
    }

    /// Change an application's volume by a number of percentage points.
    pub fn adjust_volume(&self, process_name: &str, delta_percent: f32) -> bool {
        if !delta_percent.is_finite() {
            return false;
        }
        self.mutate(process_name, |session| {
            let current = session.volume()?;
            session.set_volume((current + delta_percent / 100.0).clamp(0.0, 1.0))
        })
    }

    /// Flip an application's mute state.
    pub fn toggle_mute(&self, process_name: &str) -> bool {
        self.mutate(process_name, |session| {
            let muted = session.is_muted()?;
            session.set_mute(!muted)
        })
    }

    fn mutate(
        &self,
        process_name: &str,
        mut apply: impl FnMut(&dyn SessionControl) -> Result<(), AudioError>,
    ) -> bool {
        if process_name.trim().is_empty() {
            return false;
        }

        let device = match self
            .backend
            .default_endpoint(DataFlow::Render, DeviceRole::Multimedia)
        {
            Ok(device) => device,
            Err(e) => {
                warn!("No default playback device for {}: {}", process_name, e);
                return false;
            }
        };

        let mut applied = false;
        let result = self
            .backend
            .visit_sessions(&device.id, &mut |session: &dyn SessionControl| {
                match self.resolver.session_process_name(session) {
                    Some(name) if names_match(&name, process_name) => match apply(session) {
                        Ok(()) => {
                            applied = true;
                            ControlFlow::Break(())
                        }
                        Err(e) => {
                            warn!("Failed to update session of {}: {}", name, e);
                            ControlFlow::Continue(())
                        }
                    },
                    _ => ControlFlow::Continue(()),
                }
            });

        if let Err(e) = result {
            warn!("Error scanning sessions on {}: {}", device.name, e);
        }
        if !applied {
            info!("No session found for {} on {}", process_name, device.name);
        }
        applied
    }
}
