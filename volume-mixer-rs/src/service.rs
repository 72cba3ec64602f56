//! Engine service and lifecycle management.
//!
//! `MixerService` owns the backend, the published variables and the app
//! tracker. Actions get a shared handle to it. `enable` starts the refresh
//! timer and `shutdown` stops it and releases the backend.

use crate::audio::{
    self, AudioBackend, DataFlow, DefaultEndpointSwitcher, DeviceEnumerator, DeviceRole, Endpoint,
    SessionMutator, SessionResolver, SessionSnapshot, SwitchOutcome,
};
use crate::config::EngineConfig;
use crate::publisher::{RefreshOutcome, SnapshotPublisher};
use crate::variables::VariableStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Background thread that refreshes the publisher on a fixed period.
struct RefreshTimer {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl RefreshTimer {
    fn start(publisher: Arc<SnapshotPublisher>, interval: Duration) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name("volume-mixer-refresh".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if publisher.refresh() == RefreshOutcome::Skipped {
                            debug!("Timer refresh skipped");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Self { stop_tx, handle })
    }

    fn stop(self) {
        let _ = self.stop_tx.send(());
        if self.handle.join().is_err() {
            warn!("Refresh timer thread panicked");
        }
    }
}

/// The parts of the engine that hold the audio backend.
struct Components {
    enumerator: DeviceEnumerator,
    resolver: SessionResolver,
    mutator: SessionMutator,
    switcher: DefaultEndpointSwitcher,
    publisher: Arc<SnapshotPublisher>,
}

/// The volume mixer engine.
///
/// After `shutdown` the backend is released: refreshes are skipped, mutations
/// report failure and queries come back empty.
pub struct MixerService {
    config: EngineConfig,
    variables: Arc<VariableStore>,
    components: RwLock<Option<Components>>,
    timer: Mutex<Option<RefreshTimer>>,
    shut_down: AtomicBool,
}

impl MixerService {
    /// Create a service over the platform's audio backend.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_backend(config, audio::platform_backend())
    }

    pub fn with_backend(config: EngineConfig, backend: Arc<dyn AudioBackend>) -> Self {
        let variables = Arc::new(VariableStore::new());
        let publisher = Arc::new(SnapshotPublisher::new(backend.clone(), variables.clone()));

        Self {
            config,
            variables,
            components: RwLock::new(Some(Components {
                enumerator: DeviceEnumerator::new(backend.clone()),
                resolver: SessionResolver::new(backend.clone()),
                mutator: SessionMutator::new(backend.clone()),
                switcher: DefaultEndpointSwitcher::new(backend),
                publisher,
            })),
            timer: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Variables published so far.
    pub fn variables(&self) -> &Arc<VariableStore> {
        &self.variables
    }

    /// Publish once and start the refresh timer.
    ///
    /// Calling it again while the timer runs does nothing.
    pub fn enable(&self) {
        if self.shut_down.load(Ordering::Acquire) {
            warn!("Service already shut down, not enabling");
            return;
        }

        let mut timer = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        if timer.is_some() {
            return;
        }

        let Some(publisher) = self.with_components(None, |c| Some(c.publisher.clone())) else {
            return;
        };
        publisher.refresh();
        match RefreshTimer::start(publisher, self.config.refresh_interval()) {
            Ok(t) => {
                info!(
                    "Volume mixer enabled, refreshing every {} ms",
                    self.config.refresh_interval_ms
                );
                *timer = Some(t);
            }
            Err(e) => warn!("Failed to start refresh timer: {}", e),
        }
    }

    /// Stop the timer and release the backend.
    ///
    /// Safe to call more than once and from several threads.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let timer = self
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(timer) = timer {
            timer.stop();
        }

        // Waits for calls still running against the backend
        let components = self
            .components
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        drop(components);
        info!("Volume mixer shut down");
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .map(|t| t.is_some())
            .unwrap_or(false)
    }

    /// Run a refresh cycle now unless one is in progress.
    pub fn refresh(&self) -> RefreshOutcome {
        self.with_components(RefreshOutcome::Skipped, |c| c.publisher.refresh())
    }

    pub fn list_devices(&self, flow: DataFlow) -> Vec<Endpoint> {
        self.with_components(Vec::new(), |c| c.enumerator.list_active(flow))
    }

    pub fn default_device(&self, flow: DataFlow, role: DeviceRole) -> Option<Endpoint> {
        self.with_components(None, |c| c.enumerator.get_default(flow, role))
    }

    pub fn list_apps(&self) -> Vec<String> {
        self.with_components(Vec::new(), |c| c.resolver.list_active_app_names())
    }

    pub fn snapshot_sessions(&self) -> Vec<SessionSnapshot> {
        self.with_components(Vec::new(), |c| c.resolver.snapshot_sessions())
    }

    pub fn set_app_volume(&self, app: &str, percent: f32) -> bool {
        self.with_components(false, |c| c.mutator.set_volume(app, percent))
    }

    pub fn adjust_app_volume(&self, app: &str, delta: f32) -> bool {
        self.with_components(false, |c| c.mutator.adjust_volume(app, delta))
    }

    pub fn toggle_app_mute(&self, app: &str) -> bool {
        self.with_components(false, |c| c.mutator.toggle_mute(app))
    }

    pub fn set_default_device(&self, flow: DataFlow, device_id: &str, all_roles: bool) -> bool {
        self.with_components(false, |c| c.switcher.set_default(flow, device_id, all_roles))
    }

    pub fn switch_default_device(
        &self,
        flow: DataFlow,
        device_id: &str,
        device_name: &str,
        all_roles: bool,
    ) -> SwitchOutcome {
        self.with_components(SwitchOutcome::ShutDown, |c| {
            c.switcher.switch_to(flow, device_id, device_name, all_roles)
        })
    }

    pub fn toggle_default_device(
        &self,
        flow: DataFlow,
        first: (&str, &str),
        second: (&str, &str),
        all_roles: bool,
    ) -> SwitchOutcome {
        self.with_components(SwitchOutcome::ShutDown, |c| {
            c.switcher.toggle(flow, first, second, all_roles)
        })
    }

    /// Move a control's app reference from `previous` to `app`.
    pub fn track_app(&self, app: Option<&str>, previous: Option<&str>) {
        self.with_components((), |c| c.publisher.track_app(app, previous));
    }

    pub fn untrack_app(&self, app: Option<&str>) {
        self.with_components((), |c| c.publisher.untrack_app(app));
    }

    pub fn tracked_apps(&self) -> Vec<String> {
        self.with_components(Vec::new(), |c| c.publisher.tracker().tracked())
    }

    /// Run `f` against the live components, or return `stopped` after shutdown.
    fn with_components<T>(&self, stopped: T, f: impl FnOnce(&Components) -> T) -> T {
        let components = self.components.read().unwrap_or_else(|e| e.into_inner());
        match components.as_ref() {
            Some(c) => f(c),
            None => {
                debug!("Service shut down, ignoring call");
                stopped
            }
        }
    }
}

impl Drop for MixerService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
