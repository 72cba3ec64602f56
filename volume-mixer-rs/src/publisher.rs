//! Snapshot publishing and app tracking.
//!
//! A refresh cycle reads default devices and, when any control needs them,
//! per-application session levels, and writes them to the variable sink.
//! Cycles are single-flight: a trigger that arrives while one is running is
//! dropped.

use crate::audio::{
    AudioBackend, DataFlow, DeviceEnumerator, DeviceRole, SessionResolver, SessionSnapshot,
};
use crate::variables::{self, VariableSink};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// What happened to a refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The cycle ran to completion
    Completed,

    /// Another cycle was already running; this request was dropped
    Skipped,

    /// The cycle panicked part-way; whatever was published before stays
    Failed,
}

#[derive(Debug)]
struct TrackedApp {
    name: String,
    ref_count: usize,
}

/// Reference counts of applications that configured controls refer to.
///
/// Names compare case-insensitively; the spelling of the first reference is
/// kept for display.
#[derive(Debug, Default)]
pub struct AppTracker {
    apps: Mutex<HashMap<String, TrackedApp>>,
}

impl AppTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move one reference from `previous` to `app`.
    ///
    /// Nothing changes when both name the same app. Returns the apps whose
    /// count dropped to zero.
    pub fn retarget(&self, app: Option<&str>, previous: Option<&str>) -> Vec<String> {
        let app = app.map(str::trim).filter(|a| !a.is_empty());
        let previous = previous.map(str::trim).filter(|p| !p.is_empty());

        if let (Some(a), Some(p)) = (app, previous) {
            if a.to_lowercase() == p.to_lowercase() {
                return Vec::new();
            }
        }

        let mut apps = self.lock();
        let mut released = Vec::new();
        if let Some(previous) = previous {
            released.extend(Self::decrement(&mut apps, previous));
        }
        if let Some(app) = app {
            Self::increment(&mut apps, app);
        }
        released
    }

    /// Add one reference to an app.
    pub fn track(&self, app: &str) {
        self.retarget(Some(app), None);
    }

    /// Drop one reference. Returns the app name if it is no longer tracked.
    pub fn untrack(&self, app: &str) -> Option<String> {
        self.retarget(None, Some(app)).pop()
    }

    pub fn ref_count(&self, app: &str) -> usize {
        self.lock()
            .get(&app.trim().to_lowercase())
            .map(|t| t.ref_count)
            .unwrap_or(0)
    }

    /// Names of all tracked apps.
    pub fn tracked(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().values().map(|t| t.name.clone()).collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn increment(apps: &mut HashMap<String, TrackedApp>, app: &str) {
        apps.entry(app.to_lowercase())
            .or_insert_with(|| TrackedApp {
                name: app.to_string(),
                ref_count: 0,
            })
            .ref_count += 1;
    }

    fn decrement(apps: &mut HashMap<String, TrackedApp>, app: &str) -> Option<String> {
        let key = app.to_lowercase();
        let tracked = apps.get_mut(&key)?;
        tracked.ref_count = tracked.ref_count.saturating_sub(1);
        if tracked.ref_count == 0 {
            return apps.remove(&key).map(|t| t.name);
        }
        None
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TrackedApp>> {
        self.apps.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Clears the in-flight flag when a cycle ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Gathers device and session state and publishes it as variables.
pub struct SnapshotPublisher {
    enumerator: DeviceEnumerator,
    resolver: SessionResolver,
    tracker: AppTracker,
    sink: Arc<dyn VariableSink>,
    in_flight: AtomicBool,
    // Held while per-app variables are written or deleted
    app_vars: Mutex<()>,
}

impl SnapshotPublisher {
    pub fn new(backend: Arc<dyn AudioBackend>, sink: Arc<dyn VariableSink>) -> Self {
        Self {
            enumerator: DeviceEnumerator::new(backend.clone()),
            resolver: SessionResolver::new(backend),
            tracker: AppTracker::new(),
            sink,
            in_flight: AtomicBool::new(false),
            app_vars: Mutex::new(()),
        }
    }

    pub fn tracker(&self) -> &AppTracker {
        &self.tracker
    }

    /// Reconfigure a control from `previous` to `app` and drop the variables
    /// of any app that is no longer referenced.
    pub fn track_app(&self, app: Option<&str>, previous: Option<&str>) {
        let _vars = self.lock_app_vars();
        let released = self.tracker.retarget(app, previous);
        for name in released {
            self.remove_app_variables(&name);
        }
    }

    /// Drop one reference to an app.
    pub fn untrack_app(&self, app: Option<&str>) {
        self.track_app(None, app);
    }

    /// Run one refresh cycle unless one is already running.
    pub fn refresh(&self) -> RefreshOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Refresh already running, dropping request");
            return RefreshOutcome::Skipped;
        }
        let _guard = InFlightGuard(&self.in_flight);

        match panic::catch_unwind(AssertUnwindSafe(|| self.publish())) {
            Ok(()) => RefreshOutcome::Completed,
            Err(_) => {
                warn!("Error updating variables: refresh cycle panicked");
                RefreshOutcome::Failed
            }
        }
    }

    fn publish(&self) {
        self.publish_default(DataFlow::Render, DeviceRole::Multimedia, variables::DEFAULT_DEVICE);
        self.publish_default(DataFlow::Render, DeviceRole::Communications, variables::COMM_DEVICE);
        self.publish_default(DataFlow::Capture, DeviceRole::Multimedia, variables::DEFAULT_MIC);
        self.publish_default(DataFlow::Capture, DeviceRole::Communications, variables::COMM_MIC);

        self.sink.set(
            variables::DEVICES,
            self.enumerator.active_names(DataFlow::Render).into(),
        );

        let tracked = self.tracker.tracked();
        if tracked.is_empty() {
            return;
        }

        let sessions: HashMap<String, SessionSnapshot> = self
            .resolver
            .snapshot_sessions()
            .into_iter()
            .map(|s| (s.process_name.to_lowercase(), s))
            .collect();

        for app in tracked {
            if let Some(session) = sessions.get(&app.to_lowercase()) {
                // The app may have been released while sessions were read
                let _vars = self.lock_app_vars();
                if self.tracker.ref_count(&app) == 0 {
                    continue;
                }
                self.sink.set(
                    &variables::app_volume_variable(&app),
                    session.volume_percent.into(),
                );
                self.sink
                    .set(&variables::app_muted_variable(&app), session.muted.into());
            }
        }
    }

    fn publish_default(&self, flow: DataFlow, role: DeviceRole, variable: &str) {
        // Unresolved defaults keep their last published name
        let Some(device) = self.enumerator.get_default(flow, role) else {
            return;
        };
        if variable == variables::DEFAULT_DEVICE {
            self.sink.set(variables::DEFAULT_DEVICE_ID, device.id.as_str().into());
        }
        self.sink.set(variable, device.name.into());
    }

    fn lock_app_vars(&self) -> MutexGuard<'_, ()> {
        self.app_vars.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remove_app_variables(&self, app: &str) {
        self.sink.delete(&variables::app_volume_variable(app));
        self.sink.delete(&variables::app_muted_variable(app));
        info!("Stopped tracking {}", app);
    }
}
